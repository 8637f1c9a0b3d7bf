//! Request head construction.

use std::fmt::Write as _;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
        }
    }
}

/// Body framing for uploads.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFraming {
    Chunked,
    Length(u64),
}

/// Everything that goes into one request head.
#[derive(Debug, Clone)]
pub struct RequestHead<'a> {
    pub method: Method,
    /// Origin path, or the absolute URI when talking to a proxy.
    pub path: &'a str,
    /// `Host` header value.
    pub host: &'a str,
    pub user_agent: &'a str,
    /// Caller headers, each line already CRLF-terminated.
    pub custom: &'a str,
    pub range_offset: Option<u64>,
    pub keep_alive: bool,
    pub post: Option<PostFraming>,
    /// Complete `Authorization: ...\r\n` line.
    pub authorization: Option<&'a str>,
}

/// True if `headers` (CRLF-separated lines) already carries `name`.
pub fn has_header(headers: &str, name: &str) -> bool {
    headers.split("\r\n").any(|line| {
        line.split_once(':')
            .is_some_and(|(n, _)| n.trim().eq_ignore_ascii_case(name))
    })
}

/// Serialize a request head. Default headers are only added when the caller
/// did not supply their own.
pub fn build_request(head: &RequestHead<'_>) -> Vec<u8> {
    let custom = head.custom;
    let mut out = String::with_capacity(256 + custom.len());
    let _ = write!(out, "{} {} HTTP/1.1\r\n", head.method.as_str(), head.path);
    match head.post {
        Some(PostFraming::Chunked) if head.method == Method::Post => {
            out.push_str("Transfer-Encoding: chunked\r\n");
        }
        Some(PostFraming::Length(n)) if head.method == Method::Post => {
            let _ = write!(out, "Content-Length: {n}\r\n");
        }
        _ => {}
    }
    if !has_header(custom, "User-Agent") {
        let _ = write!(out, "User-Agent: {}\r\n", head.user_agent);
    }
    if !has_header(custom, "Accept") {
        out.push_str("Accept: */*\r\n");
    }
    if let Some(offset) = head.range_offset {
        if !has_header(custom, "Range") {
            let _ = write!(out, "Range: bytes={offset}-\r\n");
        }
    }
    if !has_header(custom, "Connection") {
        out.push_str(if head.keep_alive {
            "Connection: keep-alive\r\n"
        } else {
            "Connection: close\r\n"
        });
    }
    if !has_header(custom, "Host") {
        let _ = write!(out, "Host: {}\r\n", head.host);
    }
    out.push_str(custom);
    if let Some(auth) = head.authorization {
        out.push_str(auth);
    }
    out.push_str("\r\n");
    out.into_bytes()
}
