//! `mhttp probe <url>` – open a resource and print what the server reported.

use anyhow::{Context, Result};
use mhttp_core::config::HttpConfig;
use mhttp_core::session::Session;
use mhttp_core::{HttpClient, OpenOptions};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ProbeReport {
    url: String,
    location: String,
    status: Option<u16>,
    size: Option<u64>,
    seekable: bool,
    capability: String,
    live: bool,
    broadcast: bool,
    auth_info: Option<String>,
}

impl ProbeReport {
    fn from_session(url: &str, s: &Session) -> Self {
        Self {
            url: url.to_string(),
            location: s.location().to_string(),
            status: s.last_status(),
            size: s.size(),
            seekable: s.is_seekable(),
            capability: format!("{:?}", s.capability()).to_lowercase(),
            live: s.is_live(),
            broadcast: s.is_broadcast(),
            auth_info: s.auth_info().map(str::to_string),
        }
    }
}

pub async fn run_probe(cfg: HttpConfig, url: &str, headers: String, json: bool) -> Result<()> {
    let report = tokio::task::spawn_blocking({
        let url = url.to_string();
        move || -> Result<ProbeReport> {
            let client = HttpClient::new(cfg);
            let opts = OpenOptions {
                headers,
                ..OpenOptions::default()
            };
            let session = client
                .open_with(&url, opts)
                .with_context(|| format!("open {url}"))?;
            Ok(ProbeReport::from_session(&url, &session))
        }
    })
    .await
    .context("probe task join")??;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }
    let size = report
        .size
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    let status = report
        .status
        .map(|s| s.to_string())
        .unwrap_or_else(|| "-".to_string());
    println!("{:<10} {}", "URL", report.url);
    if report.location != report.url {
        println!("{:<10} {}", "LOCATION", report.location);
    }
    println!("{:<10} {}", "STATUS", status);
    println!("{:<10} {}", "SIZE", size);
    println!("{:<10} {} ({})", "SEEKABLE", report.seekable, report.capability);
    if report.live {
        println!("{:<10} live", "MODE");
    }
    if report.broadcast {
        println!("{:<10} yes", "BROADCAST");
    }
    if let Some(info) = &report.auth_info {
        println!("{:<10} {}", "AUTH-INFO", info);
    }
    Ok(())
}
