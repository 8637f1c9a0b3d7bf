//! Shared client handle. Sessions opened from clones of one client share its
//! connection pool.

use std::sync::Arc;

use crate::config::HttpConfig;
use crate::control::AbortToken;
use crate::error::Result;
use crate::pool::ConnectionPool;
use crate::session::Session;
use crate::transport::{Connector, TcpConnector};

pub use crate::codec::PostFraming;

/// Read a resource, or upload to it with POST.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    #[default]
    Read,
    Write(PostFraming),
}

#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Extra request headers, each line CRLF-terminated.
    pub headers: String,
    /// Starting byte offset.
    pub offset: u64,
    /// Never send a Range header for this resource.
    pub no_range: bool,
    pub mode: OpenMode,
    pub abort: Option<AbortToken>,
}

#[derive(Clone)]
pub struct HttpClient {
    cfg: Arc<HttpConfig>,
    pool: Arc<ConnectionPool>,
    connector: Arc<dyn Connector>,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("cfg", &self.cfg)
            .finish_non_exhaustive()
    }
}

impl HttpClient {
    pub fn new(cfg: HttpConfig) -> Self {
        let connector = Arc::new(TcpConnector::from_config(&cfg));
        Self::with_connector(cfg, connector)
    }

    /// Client over a custom transport.
    pub fn with_connector(cfg: HttpConfig, connector: Arc<dyn Connector>) -> Self {
        let pool = Arc::new(ConnectionPool::new(&cfg.pool_config()));
        Self {
            cfg: Arc::new(cfg),
            pool,
            connector,
        }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.cfg
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    pub fn open(&self, uri: &str) -> Result<Session> {
        self.open_with(uri, OpenOptions::default())
    }

    /// Open a session. Retries transient failures up to the configured
    /// number of open attempts.
    pub fn open_with(&self, uri: &str, opts: OpenOptions) -> Result<Session> {
        let mut session = Session::new(
            Arc::clone(&self.cfg),
            Arc::clone(&self.pool),
            Arc::clone(&self.connector),
            uri,
            opts,
        )?;
        session.open()?;
        Ok(session)
    }
}
