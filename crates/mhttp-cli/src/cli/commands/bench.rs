//! `mhttp bench <url>` – read part of a resource and report throughput.

use anyhow::{Context, Result};
use mhttp_core::bandwidth::Bandwidth;
use mhttp_core::config::HttpConfig;
use mhttp_core::control::AbortToken;
use mhttp_core::{HttpClient, OpenOptions};
use std::time::Instant;

const MIB: f64 = 1024.0 * 1024.0;

fn print_bench_result(bytes: u64, secs: f64, bw: &Bandwidth) {
    println!(
        "  {:>10}  {:>8}  {:>10}  {:>10}  {:>10}",
        "Bytes", "Time(s)", "Inst MiB/s", "Ewma MiB/s", "Avg MiB/s"
    );
    println!(
        "  {}  {}  {}  {}  {}",
        "----------", "--------", "----------", "----------", "----------"
    );
    println!(
        "  {:>10}  {:>8.2}  {:>10.2}  {:>10.2}  {:>10.2}",
        bytes,
        secs,
        bw.instant / MIB,
        bw.smoothed / MIB,
        bw.average / MIB
    );
}

pub async fn run_bench(cfg: HttpConfig, url: &str, bytes: u64, abort: AbortToken) -> Result<()> {
    let (read, secs, bw) = tokio::task::spawn_blocking({
        let url = url.to_string();
        move || -> Result<(u64, f64, Bandwidth)> {
            let client = HttpClient::new(cfg);
            let opts = OpenOptions {
                abort: Some(abort),
                ..OpenOptions::default()
            };
            let mut session = client
                .open_with(&url, opts)
                .with_context(|| format!("open {url}"))?;
            let mut buf = vec![0u8; 64 * 1024];
            let mut read = 0u64;
            let start = Instant::now();
            while read < bytes {
                let want = buf.len().min(usize::try_from(bytes - read).unwrap_or(buf.len()));
                let n = session.read(&mut buf[..want])?;
                if n == 0 {
                    break;
                }
                read += n as u64;
            }
            Ok((read, start.elapsed().as_secs_f64(), session.bandwidth()))
        }
    })
    .await
    .context("bench task join")??;
    print_bench_result(read, secs, &bw);
    Ok(())
}
