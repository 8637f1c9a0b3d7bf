use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;

/// Retry ceilings (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts for a fresh open, including the first.
    pub open_attempts: u32,
    /// Transparent reopens a single read may perform after a broken link or stall.
    pub read_reopens: u32,
    /// Reconnect attempts for one seek, including the first.
    pub seek_attempts: u32,
    /// Base delay in seconds between open attempts (e.g. 0.1 = 100ms).
    pub base_delay_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_delay_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            open_attempts: 2,
            read_reopens: 2,
            seek_attempts: 4,
            base_delay_secs: 0.1,
            max_delay_secs: 2,
        }
    }
}

/// Connection pool tuning (optional section in config.toml).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// When false every link is destroyed after use.
    pub enabled: bool,
    /// Idle links kept per (host, port, flags).
    pub max_idle_per_key: usize,
    /// Idle links older than this are closed instead of reused.
    pub idle_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_idle_per_key: 4,
            idle_timeout_secs: 30,
        }
    }
}

/// Client configuration loaded from `~/.config/mhttp/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Ask servers to keep connections open and return links to the pool.
    pub keep_alive: bool,
    /// Shorter connect and header waits for low-latency networks.
    pub fast_network: bool,
    /// Longest a body read may go without a byte before the link is reopened.
    /// Doubled for sessions that cannot seek.
    pub read_wait_max_ms: u64,
    /// Longest wait for a response line or chunk-size line.
    pub header_wait_ms: u64,
    pub connect_timeout_ms: u64,
    pub max_redirects: u32,
    /// Optional `http://host:port` proxy.
    pub proxy: Option<String>,
    pub user_agent: String,
    /// Keep the old link as a fallback while a seek reconnects.
    pub reuse_link_on_seek: bool,
    /// Consecutive failed reconnects with a fallback link before the session
    /// drops to a single connection without pooling.
    pub downgrade_after_failures: u32,
    /// Raw block size fed to the inflater for compressed bodies.
    pub inflate_block_bytes: usize,
    /// `tracing` filter directive used when `RUST_LOG` is unset.
    pub log_filter: Option<String>,
    pub retry: Option<RetryConfig>,
    pub pool: Option<PoolConfig>,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            keep_alive: true,
            fast_network: true,
            read_wait_max_ms: 120_000,
            header_wait_ms: 10_000,
            connect_timeout_ms: 15_000,
            max_redirects: 8,
            proxy: None,
            user_agent: format!("mhttp/{}", env!("CARGO_PKG_VERSION")),
            reuse_link_on_seek: false,
            downgrade_after_failures: 2,
            inflate_block_bytes: 256 * 1024,
            log_filter: None,
            retry: None,
            pool: None,
        }
    }
}

impl HttpConfig {
    pub fn retry_config(&self) -> RetryConfig {
        self.retry.clone().unwrap_or_default()
    }

    pub fn pool_config(&self) -> PoolConfig {
        self.pool.clone().unwrap_or_default()
    }

    /// Policy for the bounded open loop at the caller boundary.
    pub fn open_policy(&self) -> RetryPolicy {
        RetryPolicy::from_config(&self.retry_config(), self.retry_config().open_attempts)
    }

    pub fn connect_timeout(&self) -> Duration {
        let base = Duration::from_millis(self.connect_timeout_ms);
        if self.fast_network {
            base / 3
        } else {
            base
        }
    }

    pub fn header_wait(&self) -> Duration {
        let base = Duration::from_millis(self.header_wait_ms);
        if self.fast_network {
            base
        } else {
            base * 3
        }
    }

    /// Stall limit for body reads; `relaxed` sessions (unseekable, or already
    /// retried) wait twice as long.
    pub fn read_wait(&self, relaxed: bool) -> Duration {
        let base = Duration::from_millis(self.read_wait_max_ms);
        if relaxed {
            base * 2
        } else {
            base
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mhttp")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<HttpConfig> {
    let path = config_path()?;
    if !path.exists() {
        let default_cfg = HttpConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&path, toml)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }
    load_from_path(&path)
}

pub fn load_from_path(path: &Path) -> Result<HttpConfig> {
    let data =
        fs::read_to_string(path).with_context(|| format!("read config {}", path.display()))?;
    let cfg: HttpConfig =
        toml::from_str(&data).with_context(|| format!("parse config {}", path.display()))?;
    Ok(cfg)
}
