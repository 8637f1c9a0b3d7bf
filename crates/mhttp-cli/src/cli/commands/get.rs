//! `mhttp get <url>` – fetch a resource to a file or stdout.

use anyhow::{Context, Result};
use mhttp_core::checksum;
use mhttp_core::config::HttpConfig;
use mhttp_core::control::AbortToken;
use mhttp_core::{HttpClient, OpenOptions};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct GetArgs {
    pub url: String,
    pub offset: u64,
    pub length: Option<u64>,
    pub output: Option<String>,
    pub sha256: bool,
    pub headers: String,
    pub no_range: bool,
}

pub async fn run_get(cfg: HttpConfig, args: GetArgs, abort: AbortToken) -> Result<()> {
    tokio::task::spawn_blocking(move || fetch(cfg, &args, abort))
        .await
        .context("get task join")?
}

fn fetch(cfg: HttpConfig, args: &GetArgs, abort: AbortToken) -> Result<()> {
    let client = HttpClient::new(cfg);
    let opts = OpenOptions {
        headers: args.headers.clone(),
        offset: args.offset,
        no_range: args.no_range,
        abort: Some(abort),
        ..OpenOptions::default()
    };
    let session = client
        .open_with(&args.url, opts)
        .with_context(|| format!("open {}", args.url))?;
    let size = session.size();
    let mut body = session.take(args.length.unwrap_or(u64::MAX));

    let copied = match (&args.output, args.sha256) {
        (None, true) => {
            let (digest, n) = checksum::sha256_reader(&mut body).context("read body")?;
            println!("{}  {}", digest, args.url);
            n
        }
        (None, false) => {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            let n = io::copy(&mut body, &mut out).context("write body to stdout")?;
            out.flush()?;
            n
        }
        (Some(path), sha256) => {
            let mut file =
                File::create(path).with_context(|| format!("create output file {path}"))?;
            let n = io::copy(&mut body, &mut file).context("write body to file")?;
            file.sync_all()?;
            if sha256 {
                println!("{}  {}", checksum::sha256_path(Path::new(path))?, path);
            }
            n
        }
    };

    let session = body.into_inner();
    let bw = session.bandwidth();
    tracing::info!(
        url = %args.url,
        bytes = copied,
        size = ?size,
        final_offset = session.offset(),
        avg_bytes_per_sec = bw.average,
        "fetch complete"
    );
    eprintln!(
        "{} bytes from offset {} ({:.2} MiB/s avg)",
        copied,
        args.offset,
        bw.average / (1024.0 * 1024.0)
    );
    Ok(())
}
