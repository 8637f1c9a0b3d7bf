//! Buffered, abort-aware reading over a pooled link.
//!
//! [`Wire`] turns the transport's `WouldBlock` polling into blocking reads
//! bounded by a stall window. The window is measured from the last byte
//! received, so a slow transfer that keeps making progress never trips it.

use std::time::{Duration, Instant};

use crate::body::{BodyDecoder, ByteSource};
use crate::control::AbortToken;
use crate::error::{HttpError, Result};
use crate::pool::Link;
use crate::transport::is_would_block;

const BUFFER_SIZE: usize = 4096;
const MAX_LINE: usize = 8192;

pub struct Wire {
    pub(crate) link: Link,
    buf: Box<[u8]>,
    pos: usize,
    end: usize,
    abort: AbortToken,
    wait: Duration,
    idle_since: Option<Instant>,
}

impl Wire {
    pub fn new(link: Link, abort: AbortToken, wait: Duration) -> Self {
        Self {
            link,
            buf: vec![0u8; BUFFER_SIZE].into_boxed_slice(),
            pos: 0,
            end: 0,
            abort,
            wait,
            idle_since: None,
        }
    }

    /// Stall window for subsequent reads.
    pub fn set_wait(&mut self, wait: Duration) {
        self.wait = wait;
    }

    pub fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.abort.check()?;
        self.link.write_all(data)?;
        Ok(())
    }

    /// Discard any bytes read ahead from the previous exchange.
    pub fn clear(&mut self) {
        self.pos = 0;
        self.end = 0;
        self.idle_since = None;
    }

    pub fn buffered(&self) -> usize {
        self.end - self.pos
    }

    /// Refill the buffer. Returns the bytes now available; 0 is end of stream.
    fn fill(&mut self) -> Result<usize> {
        if self.pos < self.end {
            return Ok(self.end - self.pos);
        }
        self.pos = 0;
        self.end = 0;
        loop {
            self.abort.check()?;
            match self.link.read(&mut self.buf) {
                Ok(n) => {
                    self.idle_since = None;
                    self.end = n;
                    return Ok(n);
                }
                Err(e) if is_would_block(&e) => {
                    let since = *self.idle_since.get_or_insert_with(Instant::now);
                    let waited = since.elapsed();
                    if waited > self.wait {
                        tracing::warn!(link = self.link.id(), ?waited, "read stalled");
                        self.idle_since = None;
                        return Err(HttpError::Stalled { waited });
                    }
                }
                Err(e) => return Err(HttpError::Io(e)),
            }
        }
    }
}

impl ByteSource for Wire {
    fn read_line(&mut self) -> Result<String> {
        let mut line = Vec::new();
        loop {
            if self.fill()? == 0 {
                if line.is_empty() {
                    return Err(HttpError::LinkBroken("connection closed".into()));
                }
                break;
            }
            let avail = &self.buf[self.pos..self.end];
            match avail.iter().position(|&b| b == b'\n') {
                Some(i) => {
                    line.extend_from_slice(&avail[..i]);
                    self.pos += i + 1;
                    break;
                }
                None => {
                    line.extend_from_slice(avail);
                    self.pos = self.end;
                }
            }
            if line.len() > MAX_LINE {
                return Err(HttpError::Malformed(format!("line longer than {MAX_LINE} bytes")));
            }
        }
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        Ok(String::from_utf8_lossy(&line).into_owned())
    }

    fn read_raw(&mut self, out: &mut [u8]) -> Result<usize> {
        if out.is_empty() {
            return Ok(0);
        }
        let avail = self.fill()?;
        let n = avail.min(out.len());
        out[..n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
        self.pos += n;
        Ok(n)
    }
}

/// A live exchange: the link plus the decoder for the response on it.
pub struct Conn {
    pub wire: Wire,
    pub body: BodyDecoder,
    /// Server announced it will close after this response.
    pub will_close: bool,
}

impl Conn {
    pub fn new(wire: Wire) -> Self {
        Self {
            wire,
            body: BodyDecoder::empty(),
            will_close: true,
        }
    }

    pub fn read_body(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.body.read_logical(&mut self.wire, buf)
    }

    /// Safe to hand the link to another exchange.
    pub fn reusable(&self) -> bool {
        !self.will_close
            && self.body.framing().is_self_delimiting()
            && self.body.is_complete()
            && self.wire.buffered() == 0
    }

    pub fn into_link(self) -> Link {
        self.wire.link
    }
}
