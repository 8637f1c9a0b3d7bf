//! POST uploads: request head on open, body through `write`, response on
//! `finish_upload`.

use super::{Event, Session};
use crate::codec::{build_request, read_response_head, Method, PostFraming, RequestHead};
use crate::error::{HttpError, Result};

const CHUNKED_FOOTER: &[u8] = b"0\r\n\r\n";

#[derive(Debug, Clone, Copy)]
pub(super) struct Upload {
    framing: PostFraming,
    sent: u64,
    finished: bool,
}

impl Upload {
    pub(super) fn new(framing: PostFraming) -> Self {
        Self {
            framing,
            sent: 0,
            finished: false,
        }
    }

    pub(super) fn is_finished(&self) -> bool {
        self.finished
    }
}

impl Session {
    /// Connect and send the POST head. Uploads always use a fresh link: a
    /// dead pooled link would only show up after the body was sent.
    pub(super) fn start_upload(&mut self) -> Result<()> {
        let framing = match &self.upload {
            Some(up) => up.framing,
            None => return Err(HttpError::WrongMode("writing")),
        };
        self.transition(Event::Open)?;
        let target = self.target()?;
        let mut conn = self.connect(&target)?;
        let authorization = self.auth.authorization(target.credentials.as_ref());
        let request = build_request(&RequestHead {
            method: Method::Post,
            path: &target.path,
            host: &target.host_header,
            user_agent: &self.cfg.user_agent,
            custom: &self.headers,
            range_offset: None,
            keep_alive: self.keep_alive(),
            post: Some(framing),
            authorization: authorization.as_deref(),
        });
        if let Err(e) = conn.wire.write_all(&request) {
            self.pool.discard(conn.into_link());
            return Err(e);
        }
        tracing::debug!(path = %target.path, ?framing, "upload started");
        self.conn = Some(conn);
        self.transition(Event::Established)
    }

    /// Send body bytes. Returns `data.len()` on success.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.abort.check()?;
        let upload = match self.upload.as_mut() {
            Some(up) if !up.finished => up,
            _ => return Err(HttpError::WrongMode("writing")),
        };
        let conn = self
            .conn
            .as_mut()
            .ok_or_else(|| HttpError::LinkBroken("no open link".into()))?;
        if data.is_empty() {
            return Ok(0);
        }
        match upload.framing {
            PostFraming::Chunked => {
                conn.wire.write_all(format!("{:x}\r\n", data.len()).as_bytes())?;
                conn.wire.write_all(data)?;
                conn.wire.write_all(b"\r\n")?;
            }
            PostFraming::Length(declared) => {
                let sent = upload.sent + data.len() as u64;
                if sent > declared {
                    return Err(HttpError::UploadLength { declared, sent });
                }
                conn.wire.write_all(data)?;
            }
        }
        upload.sent += data.len() as u64;
        Ok(data.len())
    }

    /// Terminate the body and read the response head. The session then reads
    /// the response body like any other.
    pub fn finish_upload(&mut self) -> Result<u16> {
        self.abort.check()?;
        let upload = match self.upload.as_mut() {
            Some(up) if !up.finished => up,
            _ => return Err(HttpError::WrongMode("finishing an upload")),
        };
        let Some(mut conn) = self.conn.take() else {
            return Err(HttpError::LinkBroken("no open link".into()));
        };
        match upload.framing {
            PostFraming::Chunked => {
                if let Err(e) = conn.wire.write_all(CHUNKED_FOOTER) {
                    self.pool.discard(conn.into_link());
                    return Err(e);
                }
            }
            PostFraming::Length(declared) if upload.sent != declared => {
                let sent = upload.sent;
                self.pool.discard(conn.into_link());
                return Err(HttpError::UploadLength { declared, sent });
            }
            PostFraming::Length(_) => {}
        }
        upload.finished = true;
        conn.wire.set_wait(self.cfg.header_wait());
        let head = match read_response_head(&mut conn.wire) {
            Ok(head) => head,
            Err(e) => {
                if let Some(code) = e.status() {
                    self.last_status = Some(code);
                }
                self.pool.discard(conn.into_link());
                return Err(e);
            }
        };
        let status = head.status;
        self.last_status = Some(status);
        tracing::info!(status, sent = upload.sent, "upload finished");
        self.offset = 0;
        self.apply_response(conn, head)?;
        Ok(status)
    }

    /// Close out an unfinished chunked upload so the server is not left
    /// waiting for more body.
    pub(super) fn abandon_upload(&mut self) {
        let Some(up) = self.upload.as_mut().filter(|up| !up.finished) else {
            return;
        };
        up.finished = true;
        if up.framing == PostFraming::Chunked {
            if let Some(conn) = self.conn.as_mut() {
                if let Err(e) = conn.wire.write_all(CHUNKED_FOOTER) {
                    tracing::debug!(error = %e, "could not terminate chunked upload");
                }
            }
        }
        self.discard_current();
    }
}
