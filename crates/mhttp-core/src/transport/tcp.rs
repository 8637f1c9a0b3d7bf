//! std TCP transport. Reads use a short socket timeout so a quiet link
//! surfaces as `WouldBlock` instead of blocking the session indefinitely.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::{Connector, LinkFlags, Transport};
use crate::config::HttpConfig;

const POLL_INTERVAL: Duration = Duration::from_millis(100);
const POLL_INTERVAL_LESS_WAIT: Duration = Duration::from_millis(20);

#[derive(Debug, Clone)]
pub struct TcpConnector {
    pub connect_timeout: Duration,
    /// A peer that stops draining its receive window fails writes after this.
    pub write_timeout: Duration,
}

impl TcpConnector {
    pub fn from_config(cfg: &HttpConfig) -> Self {
        Self {
            connect_timeout: cfg.connect_timeout(),
            write_timeout: cfg.header_wait(),
        }
    }
}

impl Connector for TcpConnector {
    fn connect(&self, host: &str, port: u16, flags: LinkFlags) -> io::Result<Box<dyn Transport>> {
        let mut last_err = None;
        for addr in (host, port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, self.connect_timeout) {
                Ok(stream) => {
                    let poll = if flags.less_wait {
                        POLL_INTERVAL_LESS_WAIT
                    } else {
                        POLL_INTERVAL
                    };
                    stream.set_read_timeout(Some(poll))?;
                    stream.set_write_timeout(Some(self.write_timeout))?;
                    stream.set_nodelay(true)?;
                    tracing::debug!(%addr, "tcp link opened");
                    return Ok(Box::new(TcpTransport { stream }));
                }
                Err(e) => {
                    tracing::debug!(%addr, error = %e, "tcp connect failed");
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("no addresses for {host}:{port}"),
            )
        }))
    }
}

pub struct TcpTransport {
    stream: TcpStream,
}

impl Transport for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.stream.read(buf) {
            // Socket read timeout: nothing arrived during the poll interval.
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                Err(io::Error::from(io::ErrorKind::WouldBlock))
            }
            other => other,
        }
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        self.stream.write_all(buf)?;
        self.stream.flush()
    }

    fn shutdown(&mut self) {
        let _ = self.stream.shutdown(Shutdown::Both);
    }
}
