//! Status line and header block parsing.

use super::{is_redirect_status, ContentEncoding};
use crate::body::ByteSource;
use crate::error::{HttpError, Result};

/// Longest header block we are willing to read.
const MAX_HEADER_LINES: usize = 256;

/// Parsed `Content-Range: bytes <start>-<end>/<total>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContentRange {
    pub start: u64,
    pub end: Option<u64>,
    /// `None` for `*`.
    pub total: Option<u64>,
}

impl ContentRange {
    pub fn parse(value: &str) -> Option<Self> {
        let v = value.trim();
        let rest = v
            .get(..5)
            .filter(|p| p.eq_ignore_ascii_case("bytes"))
            .map(|_| v[5..].trim_start())?;
        let (span, total) = rest.split_once('/')?;
        let total = match total.trim() {
            "*" => None,
            t => Some(t.parse().ok()?),
        };
        let (start, end) = span.trim().split_once('-')?;
        Some(Self {
            start: start.trim().parse().ok()?,
            end: end.trim().parse().ok(),
            total,
        })
    }
}

/// What the session should do after a header line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderOutcome {
    Continue,
    /// A `Location` header was seen.
    Redirect,
    EndOfHeaders,
}

/// Everything the session needs from one response head.
#[derive(Debug, Clone, Default)]
pub struct ResponseHead {
    pub status: u16,
    pub location: Option<String>,
    pub content_length: Option<u64>,
    pub content_range: Option<ContentRange>,
    pub encoding: ContentEncoding,
    pub chunked: bool,
    /// Server will close the link after this response.
    pub will_close: bool,
    /// `WWW-Authenticate` values in arrival order.
    pub challenges: Vec<String>,
    pub auth_info: Option<String>,
    /// `Pragma: features=broadcast`.
    pub broadcast: bool,
}

impl ResponseHead {
    pub fn new() -> Self {
        Self {
            will_close: true,
            ..Self::default()
        }
    }

    /// Feed one line of the head. Line 0 is the status line.
    ///
    /// 4xx/5xx statuses other than 401 fail right away; 401 is parsed to the
    /// end so the challenge headers are available.
    pub fn parse_header_line(&mut self, line: &str, line_index: usize) -> Result<HeaderOutcome> {
        if line_index == 0 {
            self.status = parse_status_line(line)?;
            if (400..600).contains(&self.status) && self.status != 401 {
                tracing::warn!(status = self.status, line, "HTTP error status");
                return Err(HttpError::Status { code: self.status });
            }
            return Ok(HeaderOutcome::Continue);
        }
        if line.is_empty() {
            return Ok(HeaderOutcome::EndOfHeaders);
        }
        let Some((name, value)) = line.split_once(':') else {
            tracing::debug!(line, "ignoring header line without colon");
            return Ok(HeaderOutcome::Continue);
        };
        let name = name.trim();
        let value = value.trim();
        if name.eq_ignore_ascii_case("location") {
            self.location = Some(value.to_string());
            return Ok(HeaderOutcome::Redirect);
        }
        if name.eq_ignore_ascii_case("content-length") {
            match value.parse::<u64>() {
                Ok(n) => self.content_length = Some(n),
                Err(_) => tracing::warn!(value, "ignoring unparsable Content-Length"),
            }
        } else if name.eq_ignore_ascii_case("content-range") {
            self.content_range = ContentRange::parse(value);
            if self.content_range.is_none() {
                tracing::warn!(value, "ignoring unparsable Content-Range");
            }
        } else if name.eq_ignore_ascii_case("content-encoding") {
            match ContentEncoding::parse(value) {
                Some(enc) => self.encoding = enc,
                None => tracing::warn!(value, "unsupported Content-Encoding, passing body through"),
            }
        } else if name.eq_ignore_ascii_case("transfer-encoding") {
            if value
                .get(..7)
                .is_some_and(|v| v.eq_ignore_ascii_case("chunked"))
            {
                self.chunked = true;
            }
        } else if name.eq_ignore_ascii_case("www-authenticate") {
            self.challenges.push(value.to_string());
        } else if name.eq_ignore_ascii_case("authentication-info") {
            self.auth_info = Some(value.to_string());
        } else if name.eq_ignore_ascii_case("connection") {
            self.will_close = !value.eq_ignore_ascii_case("keep-alive");
        } else if name.eq_ignore_ascii_case("pragma") {
            let v = value.to_ascii_lowercase();
            if v.contains("features") && v.contains("broadcast") {
                self.broadcast = true;
            }
        }
        Ok(HeaderOutcome::Continue)
    }

    pub fn is_redirect(&self) -> bool {
        is_redirect_status(self.status) && self.location.is_some()
    }

    /// Offset of the first body byte within the resource.
    pub fn server_offset(&self) -> u64 {
        self.content_range.map_or(0, |r| r.start)
    }

    /// Total resource size, if the head pins it down.
    ///
    /// `Content-Range` wins; otherwise `Content-Length` counts only when the
    /// body is neither chunked nor a partial response.
    pub fn total_size(&self) -> Option<u64> {
        match self.content_range {
            Some(range) => range.total,
            None if self.chunked => None,
            None => self.content_length,
        }
    }

    /// Bytes on the wire for this body when the head fixes them.
    pub fn body_length(&self) -> Option<u64> {
        if self.chunked {
            None
        } else {
            self.content_length
        }
    }
}

/// Parse `HTTP/1.x <code> <reason>` into the status code.
pub fn parse_status_line(line: &str) -> Result<u16> {
    let mut parts = line.split_whitespace();
    let proto = parts.next().unwrap_or("");
    if !proto.starts_with("HTTP/") {
        return Err(HttpError::Malformed(format!("not an HTTP status line: {line:?}")));
    }
    parts
        .next()
        .and_then(|c| c.parse::<u16>().ok())
        .filter(|c| (100..1000).contains(c))
        .ok_or_else(|| HttpError::Malformed(format!("bad status code in {line:?}")))
}

/// Read and parse a full response head from `src`.
///
/// A peer that closes or sends an empty first line produced no response at
/// all; that is a broken link, not a protocol error.
pub fn read_response_head<S: ByteSource + ?Sized>(src: &mut S) -> Result<ResponseHead> {
    let mut head = ResponseHead::new();
    for index in 0..MAX_HEADER_LINES {
        let line = src.read_line()?;
        if index == 0 && line.is_empty() {
            return Err(HttpError::LinkBroken("empty response".into()));
        }
        tracing::trace!(line, "header");
        if head.parse_header_line(&line, index)? == HeaderOutcome::EndOfHeaders {
            return Ok(head);
        }
    }
    Err(HttpError::Malformed(format!(
        "more than {MAX_HEADER_LINES} header lines"
    )))
}
