//! `Transfer-Encoding: chunked` framing.

use super::ByteSource;
use crate::error::{HttpError, Result};

/// Progress through a chunked body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChunkState {
    /// Bytes left in the current chunk. Zero means a size line comes next.
    remaining: u64,
    finished: bool,
}

impl ChunkState {
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Read chunk payload into `buf`, crossing chunk boundaries as needed.
    /// Returns 0 once the terminating zero-size chunk has been seen.
    pub fn read<S: ByteSource + ?Sized>(&mut self, src: &mut S, buf: &mut [u8]) -> Result<usize> {
        if self.finished || buf.is_empty() {
            return Ok(0);
        }
        if self.remaining == 0 {
            let size = next_chunk_size(src)?;
            if size == 0 {
                skip_trailers(src)?;
                self.finished = true;
                tracing::trace!("chunked body finished");
                return Ok(0);
            }
            self.remaining = size;
        }
        let want = buf
            .len()
            .min(usize::try_from(self.remaining).unwrap_or(usize::MAX));
        let n = src.read_raw(&mut buf[..want])?;
        if n == 0 {
            return Err(HttpError::LinkBroken(format!(
                "connection closed with {} bytes left in chunk",
                self.remaining
            )));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}

/// Skips the CRLF left over from the previous chunk, then parses the size line.
fn next_chunk_size<S: ByteSource + ?Sized>(src: &mut S) -> Result<u64> {
    loop {
        let line = src.read_line()?;
        if line.trim().is_empty() {
            continue;
        }
        return parse_chunk_size(&line);
    }
}

/// Trailer fields are read and dropped. A peer that closes or stalls right
/// after the last chunk has still delivered the whole body; an abort has not
/// been honoured yet and is passed on.
fn skip_trailers<S: ByteSource + ?Sized>(src: &mut S) -> Result<()> {
    loop {
        match src.read_line() {
            Ok(line) if line.is_empty() => return Ok(()),
            Ok(_) => continue,
            Err(HttpError::Aborted) => return Err(HttpError::Aborted),
            Err(_) => return Ok(()),
        }
    }
}

/// Parse a chunk-size line: hex digits, optionally followed by `;extensions`.
pub fn parse_chunk_size(line: &str) -> Result<u64> {
    let digits = line.split(';').next().unwrap_or("").trim();
    if digits.is_empty() {
        return Err(HttpError::Malformed(format!("empty chunk size line {line:?}")));
    }
    u64::from_str_radix(digits, 16)
        .map_err(|_| HttpError::Malformed(format!("bad chunk size {line:?}")))
}
