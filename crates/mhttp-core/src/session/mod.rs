//! One logical client bound to a resource.
//!
//! A [`Session`] owns at most one link at a time. Opening walks the
//! connection lifecycle (connect, authenticate, follow redirects) through the
//! transition table in [`state`]; reads and seeks reopen the link at the
//! current offset when it breaks or stalls.

mod open;
mod read;
mod seek;
pub mod state;
mod target;
mod upload;
mod wire;

use std::io;
use std::sync::Arc;

use url::Url;

use crate::bandwidth::{Bandwidth, BandwidthEstimator};
use crate::client::{OpenMode, OpenOptions};
use crate::codec::AuthState;
use crate::config::HttpConfig;
use crate::control::AbortToken;
use crate::error::{HttpError, Result};
use crate::pool::{ConnectionPool, Disposition};
use crate::transport::Connector;

pub use state::{ConnState, Event};
pub use target::{parse_location, parse_proxy, Target};

use upload::Upload;
use wire::Conn;

/// Reference point for [`Session::seek`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Current,
    End,
    /// Report the total size without moving.
    Size,
}

/// How the server has treated ranged requests so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekCapability {
    /// Range honoured, or not yet tested.
    Ranged,
    /// Range ignored; seeks re-read from the start and drop the prefix.
    Discard,
    /// A ranged reopen was answered with an error status.
    Refused,
}

pub struct Session {
    cfg: Arc<HttpConfig>,
    pool: Arc<ConnectionPool>,
    connector: Arc<dyn Connector>,
    abort: AbortToken,
    proxy: Option<Url>,

    location: Url,
    headers: String,
    no_range: bool,
    live: bool,

    state: ConnState,
    conn: Option<Conn>,

    offset: u64,
    size: Option<u64>,
    /// Bytes still to drop before the next byte reaches the caller.
    pending_skip: u64,
    capability: SeekCapability,
    /// Send a Range header even at offset 0.
    range_hint: bool,
    compressed: bool,
    broadcast: bool,
    last_status: Option<u16>,
    auth: AuthState,
    bandwidth: BandwidthEstimator,

    /// Keep the previous link while a reconnect is in flight.
    dual_link: bool,
    pool_enabled: bool,
    failed_reopens: u32,
    /// Opens where the server ignored Range and the whole resource had to be
    /// skipped; bounds premature-EOF retries near the end.
    discard_runs: u32,

    upload: Option<Upload>,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("location", &self.location.as_str())
            .field("state", &self.state)
            .field("offset", &self.offset)
            .field("size", &self.size)
            .field("capability", &self.capability)
            .field("last_status", &self.last_status)
            .finish_non_exhaustive()
    }
}

impl Session {
    pub(crate) fn new(
        cfg: Arc<HttpConfig>,
        pool: Arc<ConnectionPool>,
        connector: Arc<dyn Connector>,
        uri: &str,
        opts: OpenOptions,
    ) -> Result<Self> {
        let location = parse_location(uri)?;
        let mut headers = opts.headers;
        if !headers.is_empty() && !headers.ends_with("\r\n") {
            tracing::warn!("no trailing CRLF found in custom headers; adding one");
            headers.push_str("\r\n");
        }
        let proxy = parse_proxy(cfg.proxy.as_deref());
        let upload = match opts.mode {
            OpenMode::Read => None,
            OpenMode::Write(framing) => Some(Upload::new(framing)),
        };
        Ok(Self {
            pool_enabled: cfg.pool_config().enabled,
            dual_link: cfg.reuse_link_on_seek,
            proxy,
            live: is_live(uri),
            location,
            headers,
            no_range: opts.no_range,
            abort: opts.abort.unwrap_or_default(),
            state: ConnState::Idle,
            conn: None,
            offset: opts.offset,
            size: None,
            pending_skip: 0,
            capability: SeekCapability::Ranged,
            range_hint: false,
            compressed: false,
            broadcast: false,
            last_status: None,
            auth: AuthState::default(),
            bandwidth: BandwidthEstimator::default(),
            failed_reopens: 0,
            discard_runs: 0,
            upload,
            cfg,
            pool,
            connector,
        })
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Total size, when the server told us.
    pub fn size(&self) -> Option<u64> {
        self.size
    }

    /// Last HTTP status seen on the wire, including error statuses.
    pub fn last_status(&self) -> Option<u16> {
        self.last_status
    }

    /// Current resource URL, after redirects.
    pub fn location(&self) -> &str {
        self.location.as_str()
    }

    pub fn state(&self) -> ConnState {
        self.state
    }

    pub fn capability(&self) -> SeekCapability {
        self.capability
    }

    pub fn is_broadcast(&self) -> bool {
        self.broadcast
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn auth_info(&self) -> Option<&str> {
        self.auth.info()
    }

    /// False once repeated reconnect failures have dropped the session to a
    /// single link with no pooling.
    pub fn is_pooling(&self) -> bool {
        self.pool_enabled
    }

    pub fn abort_token(&self) -> &AbortToken {
        &self.abort
    }

    pub fn bandwidth(&self) -> Bandwidth {
        self.bandwidth.estimate()
    }

    /// Seeks are possible only on a fixed-size, non-live, uncompressed
    /// resource whose server has not refused a ranged reopen.
    pub fn is_seekable(&self) -> bool {
        self.size.is_some()
            && !self.live
            && !self.compressed
            && self.capability != SeekCapability::Refused
    }

    /// Release the link (to the pool when the exchange ended cleanly) and
    /// drop per-session measurement state.
    pub fn close(&mut self) {
        self.abandon_upload();
        self.release_current();
        self.bandwidth.reset();
    }

    fn transition(&mut self, event: Event) -> Result<()> {
        match state::transition(self.state, event) {
            Some(next) => {
                tracing::trace!(from = ?self.state, to = ?next, ?event, "state");
                self.state = next;
                Ok(())
            }
            None => Err(HttpError::InvalidState {
                state: self.state,
                event,
            }),
        }
    }

    /// Move to `Idle` after a failed attempt or a close.
    fn settle_idle(&mut self) {
        if self.state == ConnState::Idle {
            return;
        }
        let res = self
            .transition(Event::Close)
            .and_then(|()| self.transition(Event::Released));
        if let Err(e) = res {
            tracing::debug!(error = %e, "state reset");
        }
    }

    fn keep_alive(&self) -> bool {
        self.cfg.keep_alive && self.pool_enabled
    }

    fn read_wait(&self) -> std::time::Duration {
        self.cfg.read_wait(!self.is_seekable())
    }

    /// Hand the current link back: to the pool when the body was fully read
    /// on a keep-alive link, otherwise closed.
    fn release_current(&mut self) {
        if let Some(conn) = self.conn.take() {
            let disposition = if self.keep_alive() && conn.reusable() {
                Disposition::Reuse
            } else {
                Disposition::Destroy
            };
            tracing::debug!(link = conn.wire.link.id(), ?disposition, "releasing link");
            self.pool.finish(conn.into_link(), disposition);
        }
        self.settle_idle();
    }

    fn discard_current(&mut self) {
        if let Some(conn) = self.conn.take() {
            self.pool.discard(conn.into_link());
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

fn is_live(uri: &str) -> bool {
    uri.contains("livemode=1")
}

impl io::Read for Session {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        Session::read(self, buf).map_err(io::Error::from)
    }
}

impl io::Seek for Session {
    fn seek(&mut self, pos: io::SeekFrom) -> io::Result<u64> {
        let (offset, whence) = match pos {
            io::SeekFrom::Start(n) => {
                let n = i64::try_from(n).map_err(|_| {
                    io::Error::new(io::ErrorKind::InvalidInput, "seek offset too large")
                })?;
                (n, Whence::Set)
            }
            io::SeekFrom::Current(d) => (d, Whence::Current),
            io::SeekFrom::End(d) => (d, Whence::End),
        };
        Session::seek(self, offset, whence).map_err(io::Error::from)
    }
}
