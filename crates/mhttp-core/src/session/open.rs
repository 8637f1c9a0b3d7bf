//! Open path: connect, send the request, answer auth challenges, follow
//! redirects, and bind the session to the response body.

use super::target::{parse_location, Target};
use super::wire::{Conn, Wire};
use super::{is_live, Event, SeekCapability, Session};
use crate::body::{BodyDecoder, ChunkState, Framing};
use crate::codec::{
    build_request, read_response_head, AuthAction, ContentEncoding, Method, RequestHead,
    ResponseHead,
};
use crate::error::{HttpError, Result};
use crate::pool::{Disposition, Link};
use crate::retry::run_with_retry;

/// A discard run that covers nearly the whole resource counts toward the
/// premature-EOF retry cap.
const NEAR_END: u64 = 1024;

impl Session {
    /// Open with the bounded retry loop. Attempts after the first stop
    /// forcing a Range header at offset 0.
    pub(crate) fn open(&mut self) -> Result<()> {
        let policy = self.cfg.open_policy();
        let abort = self.abort.clone();
        run_with_retry(&policy, &abort, |attempt| {
            if attempt > 1 {
                self.range_hint = false;
            }
            self.open_cnx()
        })
    }

    /// Rebind this session to another resource on the same client, reusing
    /// a pooled link when one is available.
    pub fn request(&mut self, uri: &str) -> Result<()> {
        self.abort.check()?;
        let location = parse_location(uri)?;
        self.release_current();
        tracing::info!(from = %self.location, to = %location, "new request on session");
        self.location = location;
        self.live = is_live(uri);
        self.offset = 0;
        self.size = None;
        self.pending_skip = 0;
        self.capability = SeekCapability::Ranged;
        self.range_hint = false;
        self.compressed = false;
        self.broadcast = false;
        self.discard_runs = 0;
        self.last_status = None;
        self.upload = None;
        self.open()
    }

    /// One open attempt. On failure the session is left `Idle` with no link.
    pub(super) fn open_cnx(&mut self) -> Result<()> {
        let res = if self.upload.is_some() {
            self.start_upload()
        } else {
            self.open_for_read()
        };
        if let Err(e) = &res {
            if let Some(code) = e.status() {
                self.last_status = Some(code);
            }
            tracing::debug!(error = %e, location = %self.location, "open attempt failed");
            self.settle_idle();
        }
        res
    }

    fn open_for_read(&mut self) -> Result<()> {
        self.transition(Event::Open)?;
        let mut redirects = 0u32;
        loop {
            self.abort.check()?;
            let target = self.target()?;
            let (conn, head) = self.connect_and_exchange(&target)?;
            self.last_status = Some(head.status);
            if let Some(info) = head.auth_info.as_deref() {
                self.auth.record_info(info);
            }

            if head.status == 401 {
                let action = self
                    .auth
                    .on_unauthorized(&head.challenges, target.credentials.as_ref());
                self.finish_interim(conn, &head);
                match action? {
                    AuthAction::Retry => {
                        self.transition(Event::Challenged)?;
                        self.transition(Event::Open)?;
                        continue;
                    }
                    AuthAction::GiveUp => return Err(HttpError::Status { code: 401 }),
                }
            }

            if head.is_redirect() {
                let location = head.location.clone().unwrap_or_default();
                self.finish_interim(conn, &head);
                if redirects >= self.cfg.max_redirects {
                    tracing::warn!(redirects, "redirect limit reached");
                    return Err(HttpError::TooManyRedirects(self.cfg.max_redirects));
                }
                let next = self
                    .location
                    .join(&location)
                    .map_err(|e| HttpError::InvalidUrl {
                        url: location.clone(),
                        reason: e.to_string(),
                    })?;
                if next.scheme() != "http" {
                    return Err(HttpError::UnsupportedScheme(next.scheme().to_string()));
                }
                redirects += 1;
                tracing::info!(status = head.status, from = %self.location, to = %next, redirects, "following redirect");
                self.location = next;
                self.transition(Event::Redirected)?;
                self.transition(Event::Open)?;
                continue;
            }

            self.apply_response(conn, head)?;
            return self.transition(Event::Established);
        }
    }

    pub(super) fn target(&self) -> Result<Target> {
        Target::resolve(&self.location, self.proxy.as_ref(), self.cfg.fast_network)
    }

    pub(super) fn wrap(&self, link: Link) -> Conn {
        Conn::new(Wire::new(link, self.abort.clone(), self.cfg.header_wait()))
    }

    /// Fresh transport through the connector, registered with the pool.
    pub(super) fn connect(&self, target: &Target) -> Result<Conn> {
        tracing::debug!(host = %target.connect_host, port = target.connect_port, "connecting");
        let transport =
            self.connector
                .connect(&target.connect_host, target.connect_port, target.key.flags)?;
        Ok(self.wrap(self.pool.adopt(target.key.clone(), transport)))
    }

    /// Send the request on a pooled link if one is idle, falling back to a
    /// fresh link once when the pooled one turns out to be dead.
    fn connect_and_exchange(&mut self, target: &Target) -> Result<(Conn, ResponseHead)> {
        if self.pool_enabled {
            if let Some(link) = self.pool.acquire(&target.key) {
                let mut conn = self.wrap(link);
                match self.exchange(&mut conn, target) {
                    Ok(head) => return Ok((conn, head)),
                    Err(e @ (HttpError::LinkBroken(_) | HttpError::Io(_))) => {
                        tracing::debug!(link = conn.wire.link.id(), error = %e, "pooled link is dead");
                        self.pool.discard(conn.into_link());
                        self.transition(Event::LinkDropped)?;
                    }
                    Err(e) => {
                        self.pool.discard(conn.into_link());
                        return Err(e);
                    }
                }
            }
        }
        let mut conn = self.connect(target)?;
        match self.exchange(&mut conn, target) {
            Ok(head) => Ok((conn, head)),
            Err(e) => {
                self.pool.discard(conn.into_link());
                Err(e)
            }
        }
    }

    fn exchange(&self, conn: &mut Conn, target: &Target) -> Result<ResponseHead> {
        // Offsets into a compressed body count decoded bytes, which a server
        // cannot resume from; those reopens start over and skip forward.
        let range = (!self.no_range && !self.compressed && (self.offset > 0 || self.range_hint))
            .then_some(self.offset);
        let authorization = self.auth.authorization(target.credentials.as_ref());
        let request = build_request(&RequestHead {
            method: Method::Get,
            path: &target.path,
            host: &target.host_header,
            user_agent: &self.cfg.user_agent,
            custom: &self.headers,
            range_offset: range,
            keep_alive: self.keep_alive(),
            post: None,
            authorization: authorization.as_deref(),
        });
        tracing::debug!(
            link = conn.wire.link.id(),
            reused = conn.wire.link.was_reused(),
            path = %target.path,
            ?range,
            "sending request"
        );
        conn.wire.clear();
        conn.wire.set_wait(self.cfg.header_wait());
        conn.wire.write_all(&request)?;
        read_response_head(&mut conn.wire)
    }

    /// Dispose of the link after a 3xx/401. Only an empty body on a
    /// keep-alive link leaves the link clean enough to reuse.
    fn finish_interim(&self, conn: Conn, head: &ResponseHead) {
        let disposition = if self.keep_alive()
            && !head.will_close
            && head.body_length() == Some(0)
            && conn.wire.buffered() == 0
        {
            Disposition::Reuse
        } else {
            Disposition::Destroy
        };
        self.pool.finish(conn.into_link(), disposition);
    }

    /// Bind the session to a successful response: reconcile offsets, record
    /// the size once, and set up body decoding.
    pub(super) fn apply_response(&mut self, mut conn: Conn, head: ResponseHead) -> Result<()> {
        let requested = self.offset;
        let server_offset = head.server_offset();
        if server_offset > requested {
            self.pool.discard(conn.into_link());
            return Err(HttpError::Malformed(format!(
                "server resumed at {server_offset}, requested {requested}"
            )));
        }
        let compressed = head.encoding != ContentEncoding::Identity;
        if compressed && server_offset > 0 {
            self.pool.discard(conn.into_link());
            self.compressed = true;
            return Err(HttpError::LinkBroken(format!(
                "compressed body resumed at raw offset {server_offset}; restarting from the beginning"
            )));
        }
        self.pending_skip = requested - server_offset;
        if self.pending_skip > 0 && compressed {
            tracing::debug!(skip = self.pending_skip, "compressed body restarted; discarding decoded prefix");
        } else if self.pending_skip > 0 {
            self.capability = SeekCapability::Discard;
            if let Some(total) = head.total_size() {
                if self.pending_skip >= total.saturating_sub(NEAR_END) {
                    self.discard_runs += 1;
                }
            }
            tracing::warn!(
                requested,
                server_offset,
                skip = self.pending_skip,
                "server ignored range; discarding prefix"
            );
        }

        let total = if compressed { None } else { head.total_size() };
        match (self.size, total) {
            (None, t) => self.size = t,
            (Some(known), Some(reported)) if known != reported => {
                tracing::warn!(known, reported, "server reported a different size; keeping the first");
            }
            _ => {}
        }
        self.compressed = compressed;
        self.broadcast = head.broadcast;

        let framing = if head.chunked {
            Framing::Chunked(ChunkState::default())
        } else if let Some(len) = head.body_length() {
            Framing::Length { remaining: len }
        } else {
            Framing::UntilClose { closed: false }
        };
        tracing::info!(
            status = head.status,
            offset = self.offset,
            size = ?self.size,
            chunked = head.chunked,
            compressed,
            will_close = head.will_close,
            "response ready"
        );
        conn.body = BodyDecoder::new(framing, head.encoding, self.cfg.inflate_block_bytes);
        conn.will_close = head.will_close;
        conn.wire.set_wait(self.read_wait());
        self.conn = Some(conn);
        Ok(())
    }
}
