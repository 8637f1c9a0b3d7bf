//! Raw byte transport underneath the HTTP layer.
//!
//! The client only needs open/read/write/close primitives. A read that has
//! nothing yet returns `io::ErrorKind::WouldBlock`; the session decides how
//! long it is willing to keep polling.

mod tcp;

use std::io;

pub use tcp::{TcpConnector, TcpTransport};

/// Capability flags that take part in connection-pool keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LinkFlags {
    /// Shorter connect and poll waits (fast network mode).
    pub less_wait: bool,
    /// Link goes to an HTTP proxy rather than the origin.
    pub via_proxy: bool,
}

/// One open byte stream.
pub trait Transport: Send {
    /// Read into `buf`. `Ok(0)` is end of stream; `WouldBlock` means no data yet.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Close both directions. Errors are ignored; the link is gone either way.
    fn shutdown(&mut self);
}

/// Opens new transports.
pub trait Connector: Send + Sync {
    fn connect(&self, host: &str, port: u16, flags: LinkFlags) -> io::Result<Box<dyn Transport>>;
}

/// True for the "no data yet" outcomes a poll loop should wait on.
pub fn is_would_block(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut | io::ErrorKind::Interrupted
    )
}
