//! CLI for the mhttp streaming client.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use mhttp_core::config::HttpConfig;
use mhttp_core::control::AbortToken;
use std::path::PathBuf;

use commands::{run_bench, run_checksum, run_get, run_probe, GetArgs};

/// Top-level CLI for the mhttp client.
#[derive(Debug, Parser)]
#[command(name = "mhttp")]
#[command(about = "mhttp: resumable HTTP/1.1 client for media streams", long_about = None)]
pub struct Cli {
    /// HTTP proxy (`http://host:port`). Overrides the config file.
    #[arg(long, global = true, env = "http_proxy")]
    pub proxy: Option<String>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Fetch a resource, optionally from an offset and for a fixed length.
    Get {
        /// http:// URL of the resource.
        url: String,
        /// Start reading at this byte offset.
        #[arg(long, default_value = "0")]
        offset: u64,
        /// Stop after this many bytes.
        #[arg(long)]
        length: Option<u64>,
        /// Write the body here instead of stdout.
        #[arg(short, long)]
        output: Option<String>,
        /// Print the SHA-256 of the fetched bytes. Without --output the body is
        /// hashed instead of printed.
        #[arg(long)]
        sha256: bool,
        /// Extra request header (`Name: value`); repeatable.
        #[arg(short = 'H', long = "header", value_name = "HEADER")]
        headers: Vec<String>,
        /// Never send a Range header.
        #[arg(long)]
        no_range: bool,
    },

    /// Open a resource and report what the server said about it.
    Probe {
        /// http:// URL of the resource.
        url: String,
        /// Emit the report as JSON.
        #[arg(long)]
        json: bool,
        /// Extra request header (`Name: value`); repeatable.
        #[arg(short = 'H', long = "header", value_name = "HEADER")]
        headers: Vec<String>,
    },

    /// Read part of a resource and report the bandwidth estimate.
    Bench {
        /// http:// URL of the resource.
        url: String,
        /// Bytes to read.
        #[arg(long, default_value = "8388608")]
        bytes: u64,
    },

    /// Compute SHA-256 of files (e.g. after a fetch).
    Checksum {
        /// Files to hash.
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Expected hex digest; exit non-zero if any file differs.
        #[arg(long, value_name = "HEX")]
        expect: Option<String>,
    },
}

/// Join `Name: value` lines into one CRLF-terminated header block.
fn header_block(headers: &[String]) -> String {
    headers.iter().map(|h| format!("{}\r\n", h.trim_end())).collect()
}

/// Token tripped by Ctrl-C so blocking session calls stop at their next check.
fn abort_on_ctrl_c() -> AbortToken {
    let token = AbortToken::new();
    let trip = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted; aborting");
            trip.abort();
        }
    });
    token
}

impl CliCommand {
    pub async fn run_from_args(mut cfg: HttpConfig) -> Result<()> {
        let cli = Cli::parse();
        if cli.proxy.is_some() {
            cfg.proxy = cli.proxy;
        }
        tracing::debug!("loaded config: {:?}", cfg);

        match cli.command {
            CliCommand::Get {
                url,
                offset,
                length,
                output,
                sha256,
                headers,
                no_range,
            } => {
                let args = GetArgs {
                    url,
                    offset,
                    length,
                    output,
                    sha256,
                    headers: header_block(&headers),
                    no_range,
                };
                run_get(cfg, args, abort_on_ctrl_c()).await?;
            }
            CliCommand::Probe { url, json, headers } => {
                run_probe(cfg, &url, header_block(&headers), json).await?;
            }
            CliCommand::Bench { url, bytes } => {
                run_bench(cfg, &url, bytes, abort_on_ctrl_c()).await?;
            }
            CliCommand::Checksum { paths, expect } => {
                run_checksum(&paths, expect.as_deref()).await?;
            }
        }

        Ok(())
    }
}
