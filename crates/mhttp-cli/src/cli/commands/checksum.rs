//! `mhttp checksum <path>...` – SHA-256 of fetched files, sha256sum style.

use anyhow::{bail, Result};
use mhttp_core::checksum;
use std::path::PathBuf;

/// Print one `digest  path` line per file. With `expect`, fail unless every
/// file matches it.
pub async fn run_checksum(paths: &[PathBuf], expect: Option<&str>) -> Result<()> {
    let mut mismatched = 0usize;
    for path in paths {
        let digest = checksum::sha256_path(path)?;
        println!("{}  {}", digest, path.display());
        if let Some(want) = expect {
            if !digest.eq_ignore_ascii_case(want.trim()) {
                eprintln!("{}: digest mismatch", path.display());
                mismatched += 1;
            }
        }
    }
    if mismatched > 0 {
        bail!("{mismatched} of {} file(s) did not match", paths.len());
    }
    Ok(())
}
