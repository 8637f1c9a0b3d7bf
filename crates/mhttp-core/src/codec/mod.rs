//! HTTP/1.1 request/response codec.
//!
//! Builds request heads, parses status and header lines, and extracts the
//! redirect, auth, length and encoding metadata the session acts on.

pub mod auth;
mod request;
mod response;

pub use auth::{AuthAction, AuthState, Challenge, Credentials};
pub use request::{build_request, has_header, Method, PostFraming, RequestHead};
pub use response::{
    parse_status_line, read_response_head, ContentRange, HeaderOutcome, ResponseHead,
};

/// `Content-Encoding` values the body decoder understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContentEncoding {
    #[default]
    Identity,
    Gzip,
    Deflate,
}

impl ContentEncoding {
    /// `None` for codings we cannot decode.
    pub fn parse(value: &str) -> Option<Self> {
        let v = value.trim();
        if v.eq_ignore_ascii_case("identity") || v.is_empty() {
            Some(ContentEncoding::Identity)
        } else if v.eq_ignore_ascii_case("gzip") || v.eq_ignore_ascii_case("x-gzip") {
            Some(ContentEncoding::Gzip)
        } else if v.eq_ignore_ascii_case("deflate") {
            Some(ContentEncoding::Deflate)
        } else {
            None
        }
    }
}

/// Status codes that carry a `Location` worth following.
pub fn is_redirect_status(code: u16) -> bool {
    matches!(code, 301 | 302 | 303 | 307)
}
