//! Body transfer decoding: framing (fixed length, chunked, until close) and
//! optional content decompression on top of it.
//!
//! The decoder never touches the transport directly. It pulls from a
//! [`ByteSource`], which the session implements over its buffered link and
//! tests implement over memory.

mod chunked;
mod inflate;

use crate::codec::ContentEncoding;
use crate::error::{HttpError, Result};

pub use chunked::{parse_chunk_size, ChunkState};
pub use inflate::Inflater;

/// Buffered access to the bytes of one response.
pub trait ByteSource {
    /// Next CRLF- (or LF-) terminated line without its terminator.
    /// End of stream before any byte of the line is an error.
    fn read_line(&mut self) -> Result<String>;

    /// Raw bytes. `Ok(0)` is end of stream.
    fn read_raw(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// How the end of the body is found on the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Framing {
    /// `Content-Length` bytes remain.
    Length { remaining: u64 },
    Chunked(ChunkState),
    /// Neither length nor chunking: the body ends when the peer closes.
    UntilClose { closed: bool },
}

impl Framing {
    pub fn read<S: ByteSource + ?Sized>(&mut self, src: &mut S, buf: &mut [u8]) -> Result<usize> {
        match self {
            Framing::Length { remaining } => {
                if *remaining == 0 || buf.is_empty() {
                    return Ok(0);
                }
                let want = buf.len().min(usize::try_from(*remaining).unwrap_or(usize::MAX));
                let n = src.read_raw(&mut buf[..want])?;
                if n == 0 {
                    return Err(HttpError::LinkBroken(format!(
                        "connection closed with {remaining} body bytes outstanding"
                    )));
                }
                *remaining -= n as u64;
                Ok(n)
            }
            Framing::Chunked(state) => state.read(src, buf),
            Framing::UntilClose { closed } => {
                if *closed || buf.is_empty() {
                    return Ok(0);
                }
                let n = src.read_raw(buf)?;
                if n == 0 {
                    *closed = true;
                }
                Ok(n)
            }
        }
    }

    /// True once the whole body has been taken off the wire.
    pub fn is_complete(&self) -> bool {
        match self {
            Framing::Length { remaining } => *remaining == 0,
            Framing::Chunked(state) => state.is_finished(),
            Framing::UntilClose { closed } => *closed,
        }
    }

    /// Whether the link can carry another exchange after this body.
    pub fn is_self_delimiting(&self) -> bool {
        !matches!(self, Framing::UntilClose { .. })
    }
}

/// Turns raw response bytes into the logical body the caller sees.
#[derive(Debug)]
pub struct BodyDecoder {
    framing: Framing,
    inflater: Option<Inflater>,
}

impl BodyDecoder {
    pub fn new(framing: Framing, encoding: ContentEncoding, inflate_block: usize) -> Self {
        let inflater = match encoding {
            ContentEncoding::Identity => None,
            enc => Some(Inflater::new(enc, inflate_block)),
        };
        Self { framing, inflater }
    }

    /// A body with nothing in it, used before a response has been read.
    pub fn empty() -> Self {
        Self {
            framing: Framing::Length { remaining: 0 },
            inflater: None,
        }
    }

    pub fn framing(&self) -> &Framing {
        &self.framing
    }

    pub fn is_compressed(&self) -> bool {
        self.inflater.is_some()
    }

    pub fn read_logical<S: ByteSource + ?Sized>(
        &mut self,
        src: &mut S,
        buf: &mut [u8],
    ) -> Result<usize> {
        match self.inflater.as_mut() {
            Some(inflater) => {
                let framing = &mut self.framing;
                inflater.read(buf, |raw| framing.read(src, raw))
            }
            None => self.framing.read(src, buf),
        }
    }

    pub fn is_complete(&self) -> bool {
        self.framing.is_complete() && self.inflater.as_ref().map_or(true, Inflater::is_drained)
    }
}
