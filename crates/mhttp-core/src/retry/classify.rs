//! Classify HTTP status and client errors into retry policy error kinds.

use crate::error::HttpError;
use crate::retry::policy::ErrorKind;

/// Classify an HTTP status code. Only 4xx/5xx reach this point as errors;
/// none of them are retried automatically.
pub fn classify_http_status(code: u16) -> ErrorKind {
    match code {
        400..=599 => ErrorKind::ServerStatus(code),
        _ => ErrorKind::Other,
    }
}

/// Classify a client error into an ErrorKind.
pub fn classify(e: &HttpError) -> ErrorKind {
    match e {
        HttpError::LinkBroken(_) | HttpError::Io(_) => ErrorKind::Link,
        HttpError::Stalled { .. } => ErrorKind::Timeout,
        HttpError::Malformed(_)
        | HttpError::TooManyRedirects(_)
        | HttpError::UnsupportedAuth(_)
        | HttpError::UnsupportedScheme(_)
        | HttpError::InvalidUrl { .. }
        | HttpError::Decode(_) => ErrorKind::Protocol,
        HttpError::Status { code } => classify_http_status(*code),
        HttpError::Aborted => ErrorKind::Aborted,
        HttpError::OutOfRange { .. }
        | HttpError::NotSeekable
        | HttpError::InvalidState { .. }
        | HttpError::WrongMode(_)
        | HttpError::UploadLength { .. } => ErrorKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::time::Duration;

    #[test]
    fn link_failures_are_link() {
        let reset = HttpError::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert_eq!(classify(&reset), ErrorKind::Link);
        assert_eq!(classify(&HttpError::LinkBroken("eof".into())), ErrorKind::Link);
    }

    #[test]
    fn stall_is_timeout() {
        let e = HttpError::Stalled {
            waited: Duration::from_secs(120),
        };
        assert_eq!(classify(&e), ErrorKind::Timeout);
    }

    #[test]
    fn protocol_errors_are_protocol() {
        assert_eq!(
            classify(&HttpError::Malformed("ICY 200 OK".into())),
            ErrorKind::Protocol
        );
        assert_eq!(classify(&HttpError::TooManyRedirects(8)), ErrorKind::Protocol);
        assert_eq!(
            classify(&HttpError::UnsupportedAuth("Digest".into())),
            ErrorKind::Protocol
        );
    }

    #[test]
    fn statuses_carry_code() {
        assert_eq!(classify_http_status(404), ErrorKind::ServerStatus(404));
        assert_eq!(classify_http_status(503), ErrorKind::ServerStatus(503));
        assert_eq!(
            classify(&HttpError::Status { code: 500 }),
            ErrorKind::ServerStatus(500)
        );
    }

    #[test]
    fn seek_sentinels_are_other() {
        let e = HttpError::OutOfRange {
            offset: 10,
            size: Some(5),
        };
        assert_eq!(classify(&e), ErrorKind::Other);
        assert_eq!(classify(&HttpError::Aborted), ErrorKind::Aborted);
    }
}
