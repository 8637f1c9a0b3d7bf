//! Error type shared by every layer of the client.
//!
//! Variants follow the failure taxonomy the retry layer works with: broken
//! links and stalls are retried, protocol and server-status failures are
//! surfaced immediately, and an out-of-range seek has its own variant so
//! callers can tell it apart from a network failure.

use std::io;
use std::time::Duration;

use crate::session::state::{ConnState, Event};

pub type Result<T> = std::result::Result<T, HttpError>;

#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    /// The peer closed the link (or sent nothing usable) before the
    /// exchange could complete.
    #[error("link broken: {0}")]
    LinkBroken(String),

    /// Transport-level I/O failure (reset, broken pipe, refused connect).
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// No bytes arrived for longer than the allowed wait.
    #[error("no data received for {waited:?}")]
    Stalled { waited: Duration },

    /// The response could not be parsed as HTTP.
    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("redirect limit of {0} exceeded")]
    TooManyRedirects(u32),

    #[error("unsupported authentication scheme: {0}")]
    UnsupportedAuth(String),

    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// Terminal 4xx/5xx status.
    #[error("HTTP {code}")]
    Status { code: u16 },

    /// Seek destination lies outside the resource.
    #[error("seek to {offset} is out of range (size {size:?})")]
    OutOfRange { offset: i64, size: Option<u64> },

    #[error("resource is not seekable")]
    NotSeekable,

    /// The caller's cancellation token was tripped.
    #[error("operation aborted")]
    Aborted,

    #[error("content decoding failed: {0}")]
    Decode(#[source] io::Error),

    #[error("invalid connection transition {event:?} from {state:?}")]
    InvalidState { state: ConnState, event: Event },

    #[error("session not opened for {0}")]
    WrongMode(&'static str),

    /// Upload body did not match the declared `Content-Length`.
    #[error("upload length mismatch: declared {declared}, sent {sent}")]
    UploadLength { declared: u64, sent: u64 },
}

impl HttpError {
    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            HttpError::Status { code } => Some(*code),
            _ => None,
        }
    }

    /// True for the sentinel returned when seeking past the known end.
    pub fn is_out_of_range(&self) -> bool {
        matches!(self, HttpError::OutOfRange { .. })
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, HttpError::Aborted)
    }
}

impl From<HttpError> for io::Error {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Io(inner) => inner,
            HttpError::Aborted => io::Error::new(io::ErrorKind::Interrupted, e),
            HttpError::Stalled { .. } => io::Error::new(io::ErrorKind::TimedOut, e),
            HttpError::LinkBroken(_) => io::Error::new(io::ErrorKind::ConnectionAborted, e),
            HttpError::OutOfRange { .. }
            | HttpError::NotSeekable
            | HttpError::UploadLength { .. } => {
                io::Error::new(io::ErrorKind::InvalidInput, e)
            }
            HttpError::Decode(_) | HttpError::Malformed(_) => {
                io::Error::new(io::ErrorKind::InvalidData, e)
            }
            other => io::Error::new(io::ErrorKind::Other, other),
        }
    }
}
