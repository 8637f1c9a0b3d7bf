//! Content decompression for `gzip` and `deflate` bodies.
//!
//! Raw bytes are pulled in fixed-size blocks and pushed through a write-side
//! flate2 decoder whose output vector is drained into the caller's buffer.
//! The container is sniffed from the first block (gzip magic, zlib header,
//! otherwise raw deflate) since servers label `deflate` inconsistently.

use std::io::{self, Write};

use flate2::write::{DeflateDecoder, GzDecoder, ZlibDecoder};

use crate::codec::ContentEncoding;
use crate::error::{HttpError, Result};

trait Sink: Write + Send {
    fn output(&mut self) -> &mut Vec<u8>;
    fn try_finish(&mut self) -> io::Result<()>;
}

macro_rules! impl_sink {
    ($($ty:ident),*) => {$(
        impl Sink for $ty<Vec<u8>> {
            fn output(&mut self) -> &mut Vec<u8> {
                self.get_mut()
            }
            fn try_finish(&mut self) -> io::Result<()> {
                $ty::try_finish(self)
            }
        }
    )*};
}

impl_sink!(GzDecoder, ZlibDecoder, DeflateDecoder);

enum Stream {
    Pending(ContentEncoding),
    Active(Box<dyn Sink>),
    Ended,
}

pub struct Inflater {
    stream: Stream,
    raw: Vec<u8>,
    out: Vec<u8>,
    out_pos: usize,
    input_done: bool,
}

impl std::fmt::Debug for Inflater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stream = match self.stream {
            Stream::Pending(_) => "pending",
            Stream::Active(_) => "active",
            Stream::Ended => "ended",
        };
        f.debug_struct("Inflater")
            .field("stream", &stream)
            .field("block", &self.raw.len())
            .field("buffered", &(self.out.len() - self.out_pos))
            .finish()
    }
}

impl Inflater {
    pub fn new(encoding: ContentEncoding, block: usize) -> Self {
        Self {
            stream: Stream::Pending(encoding),
            raw: vec![0u8; block.max(512)],
            out: Vec::new(),
            out_pos: 0,
            input_done: false,
        }
    }

    /// Fill `buf` with decompressed bytes, pulling raw blocks through `pull`
    /// as needed. Returns 0 once the raw side reports end of stream and
    /// everything decoded so far has been handed out.
    pub fn read<F>(&mut self, buf: &mut [u8], mut pull: F) -> Result<usize>
    where
        F: FnMut(&mut [u8]) -> Result<usize>,
    {
        if buf.is_empty() {
            return Ok(0);
        }
        loop {
            if self.out_pos < self.out.len() {
                let n = buf.len().min(self.out.len() - self.out_pos);
                buf[..n].copy_from_slice(&self.out[self.out_pos..self.out_pos + n]);
                self.out_pos += n;
                if self.out_pos == self.out.len() {
                    self.out.clear();
                    self.out_pos = 0;
                }
                return Ok(n);
            }
            if self.input_done {
                return Ok(0);
            }
            let n = pull(&mut self.raw)?;
            if n == 0 {
                finish(&mut self.stream, &mut self.out);
                self.input_done = true;
                continue;
            }
            feed(&mut self.stream, &self.raw[..n], &mut self.out)?;
        }
    }

    /// Nothing decoded is left waiting for the caller.
    pub fn is_drained(&self) -> bool {
        self.out_pos >= self.out.len()
    }
}

fn detect(encoding: ContentEncoding, first: &[u8]) -> Box<dyn Sink> {
    let zlib_header = first.len() >= 2
        && first[0] & 0x0f == 8
        && (u16::from(first[0]) << 8 | u16::from(first[1])) % 31 == 0;
    if first.starts_with(&[0x1f, 0x8b]) || (encoding == ContentEncoding::Gzip && !zlib_header) {
        Box::new(GzDecoder::new(Vec::new()))
    } else if zlib_header {
        Box::new(ZlibDecoder::new(Vec::new()))
    } else {
        Box::new(DeflateDecoder::new(Vec::new()))
    }
}

fn feed(stream: &mut Stream, mut input: &[u8], out: &mut Vec<u8>) -> Result<()> {
    if let Stream::Pending(enc) = *stream {
        *stream = Stream::Active(detect(enc, input));
    }
    let Stream::Active(sink) = &mut *stream else {
        tracing::trace!(bytes = input.len(), "dropping bytes after end of compressed stream");
        return Ok(());
    };
    while !input.is_empty() {
        let n = sink.write(input).map_err(HttpError::Decode)?;
        if n == 0 {
            tracing::trace!(bytes = input.len(), "compressed stream ended early");
            finish(stream, out);
            return Ok(());
        }
        input = &input[n..];
    }
    sink.flush().map_err(HttpError::Decode)?;
    out.append(sink.output());
    Ok(())
}

/// Flush whatever the decoder still holds. A truncated stream yields what
/// was decoded before the cut.
fn finish(stream: &mut Stream, out: &mut Vec<u8>) {
    if let Stream::Active(sink) = &mut *stream {
        if let Err(e) = sink.try_finish() {
            tracing::debug!(error = %e, "compressed body ended before stream trailer");
        }
        out.append(sink.output());
    }
    *stream = Stream::Ended;
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::Compression;

    fn body() -> Vec<u8> {
        (0..200_000u32).map(|i| (i % 97) as u8 ^ (i >> 9) as u8).collect()
    }

    fn inflate_all(inf: &mut Inflater, raw: &[u8], step: usize, out_size: usize) -> Vec<u8> {
        let mut pos = 0;
        let mut out = Vec::new();
        let mut buf = vec![0u8; out_size];
        loop {
            let n = inf
                .read(&mut buf, |dst| {
                    let n = dst.len().min(step).min(raw.len() - pos);
                    dst[..n].copy_from_slice(&raw[pos..pos + n]);
                    pos += n;
                    Ok(n)
                })
                .unwrap();
            if n == 0 {
                return out;
            }
            out.extend_from_slice(&buf[..n]);
        }
    }

    #[test]
    fn gzip_roundtrip_small_blocks() {
        let mut enc = flate2::write::GzEncoder::new(Vec::new(), Compression::fast());
        enc.write_all(&body()).unwrap();
        let gz = enc.finish().unwrap();
        let mut inf = Inflater::new(ContentEncoding::Gzip, 1024);
        assert_eq!(inflate_all(&mut inf, &gz, 100, 4096), body());
        assert!(inf.is_drained());
    }

    #[test]
    fn deflate_accepts_zlib_and_raw() {
        let mut z = flate2::write::ZlibEncoder::new(Vec::new(), Compression::default());
        z.write_all(&body()).unwrap();
        let zlib = z.finish().unwrap();
        let mut inf = Inflater::new(ContentEncoding::Deflate, 256 * 1024);
        assert_eq!(inflate_all(&mut inf, &zlib, usize::MAX, 777), body());

        let mut d = flate2::write::DeflateEncoder::new(Vec::new(), Compression::default());
        d.write_all(&body()).unwrap();
        let raw = d.finish().unwrap();
        let mut inf = Inflater::new(ContentEncoding::Deflate, 4096);
        assert_eq!(inflate_all(&mut inf, &raw, 1000, 777), body());
    }

    #[test]
    fn truncated_stream_returns_prefix_then_eof() {
        let mut enc = flate2::write::GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&body()).unwrap();
        let gz = enc.finish().unwrap();
        let cut = &gz[..gz.len() / 2];
        let mut inf = Inflater::new(ContentEncoding::Gzip, 4096);
        let got = inflate_all(&mut inf, cut, 512, 4096);
        assert!(!got.is_empty());
        assert!(got.len() < body().len());
        assert_eq!(&body()[..got.len()], &got[..]);
    }

    #[test]
    fn garbage_is_a_decode_error() {
        let mut inf = Inflater::new(ContentEncoding::Deflate, 1024);
        let garbage = [0xffu8; 32];
        let mut buf = [0u8; 64];
        let mut fed = false;
        let res = inf.read(&mut buf, |dst| {
            if fed {
                return Ok(0);
            }
            fed = true;
            dst[..garbage.len()].copy_from_slice(&garbage);
            Ok(garbage.len())
        });
        assert!(matches!(res, Err(HttpError::Decode(_))), "{res:?}");
    }
}
