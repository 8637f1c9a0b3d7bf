//! Logging init: append to a file under the XDG state dir, or fall back to stderr.
//!
//! Filter precedence: `RUST_LOG`, then `log_filter` from the config file, then
//! [`DEFAULT_FILTER`].

use anyhow::Result;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::EnvFilter;

pub const DEFAULT_FILTER: &str = "info,mhttp_core=debug";

/// Writer that is either the log file or stderr (used when the file handle
/// cannot be cloned for a new event).
enum LogSink {
    File(fs::File),
    Stderr,
}

impl io::Write for LogSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            LogSink::File(f) => f.write(buf),
            LogSink::Stderr => io::stderr().lock().write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            LogSink::File(f) => f.flush(),
            LogSink::Stderr => io::stderr().lock().flush(),
        }
    }
}

struct LogFile(fs::File);

impl<'a> MakeWriter<'a> for LogFile {
    type Writer = LogSink;

    fn make_writer(&'a self) -> Self::Writer {
        self.0
            .try_clone()
            .map(LogSink::File)
            .unwrap_or(LogSink::Stderr)
    }
}

/// Pick the filter directive. Blank values count as unset.
fn filter_directive(env: Option<String>, configured: Option<&str>) -> String {
    env.filter(|s| !s.trim().is_empty())
        .or_else(|| {
            configured
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| DEFAULT_FILTER.to_string())
}

fn env_filter(configured: Option<&str>) -> EnvFilter {
    let directive = filter_directive(std::env::var("RUST_LOG").ok(), configured);
    EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

pub fn log_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("mhttp")?;
    Ok(xdg_dirs.place_state_file("mhttp.log")?)
}

/// Initialize structured logging to `~/.local/state/mhttp/mhttp.log`.
/// On failure (e.g. log dir unwritable), returns Err so the caller can fall back to stderr.
pub fn init_logging(configured: Option<&str>) -> Result<()> {
    let path = log_path()?;
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }
    let file = fs::OpenOptions::new().create(true).append(true).open(&path)?;

    tracing_subscriber::fmt()
        .with_env_filter(env_filter(configured))
        .with_writer(BoxMakeWriter::new(LogFile(file)))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("install subscriber: {e}"))?;

    tracing::info!(path = %path.display(), "mhttp logging initialized");
    Ok(())
}

/// Initialize logging to stderr only. Use when [`init_logging`] fails so the CLI keeps working.
pub fn init_logging_stderr(configured: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(configured))
        .with_writer(io::stderr)
        .with_ansi(false)
        .try_init();
}
