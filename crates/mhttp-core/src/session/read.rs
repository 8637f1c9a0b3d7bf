//! Read path with transparent reopen on broken or stalled links.

use super::{Event, Session};
use crate::error::{HttpError, Result};
use crate::retry::classify;

/// Scratch size used while dropping a read-and-discard prefix.
const SKIP_CHUNK: usize = 64 * 1024;

/// Premature-EOF reopens stop once this many near-complete discard runs
/// have happened; the server evidently cannot deliver the tail.
const MAX_DISCARD_RUNS: u32 = 10;

impl Session {
    /// Read up to `buf.len()` bytes at the current offset.
    ///
    /// Returns 0 at end of resource. The offset advances by exactly the
    /// number of bytes returned. A broken or stalled link is reopened at the
    /// current offset up to the configured ceiling before the error surfaces.
    pub fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.abort.check()?;
        self.ensure_readable()?;
        if buf.is_empty() || self.at_end() {
            return Ok(0);
        }
        self.bandwidth.start_read();
        let res = self.read_with_recovery(buf);
        self.bandwidth.finish_read(*res.as_ref().unwrap_or(&0));
        res
    }

    fn at_end(&self) -> bool {
        self.size.is_some_and(|size| self.offset >= size)
    }

    pub(super) fn ensure_readable(&self) -> Result<()> {
        match &self.upload {
            Some(up) if !up.is_finished() => Err(HttpError::WrongMode("reading")),
            _ => Ok(()),
        }
    }

    fn read_with_recovery(&mut self, buf: &mut [u8]) -> Result<usize> {
        let max = self.cfg.retry_config().read_reopens;
        let mut reopens = 0u32;
        loop {
            let err = match self.read_once(buf) {
                Ok(n) => return Ok(n),
                Err(e) => e,
            };
            if !classify(&err).is_transient() || reopens >= max {
                return Err(err);
            }
            if self.at_end() {
                return Ok(0);
            }
            reopens += 1;
            tracing::warn!(offset = self.offset, attempt = reopens, error = %err, "read failed; reopening");
            self.abort.check()?;
            // The failed link is no use as a fallback.
            self.discard_current();
            if let Err(e) = self.reopen(None) {
                if !classify(&e).is_transient() || reopens >= max {
                    return Err(e);
                }
                tracing::debug!(error = %e, "reopen failed");
            }
        }
    }

    fn read_once(&mut self, buf: &mut [u8]) -> Result<usize> {
        let cut_is_end = self.live || self.discard_runs >= MAX_DISCARD_RUNS;
        let Some(conn) = self.conn.as_mut() else {
            return Err(HttpError::LinkBroken("no open link".into()));
        };
        if self.pending_skip > 0 {
            tracing::debug!(skip = self.pending_skip, offset = self.offset, "discarding prefix");
            let mut scratch = vec![0u8; SKIP_CHUNK];
            while self.pending_skip > 0 {
                let want = usize::try_from(self.pending_skip)
                    .unwrap_or(usize::MAX)
                    .min(SKIP_CHUNK);
                let raw_pos = self.offset - self.pending_skip;
                let want = capped(self.size, self.compressed, raw_pos, want);
                let n = if want == 0 {
                    0
                } else {
                    tolerate_cut(conn.read_body(&mut scratch[..want]), cut_is_end)?
                };
                if n == 0 {
                    return end_of_body(self.offset, self.size, self.live, self.discard_runs);
                }
                self.pending_skip -= n as u64;
            }
        }
        let want = capped(self.size, self.compressed, self.offset, buf.len());
        if want == 0 {
            return Ok(0);
        }
        let n = tolerate_cut(conn.read_body(&mut buf[..want]), cut_is_end)?;
        if n == 0 {
            return end_of_body(self.offset, self.size, self.live, self.discard_runs);
        }
        self.offset += n as u64;
        Ok(n)
    }

    /// Reconnect at `target` (or the current offset).
    ///
    /// With dual-link enabled the old link is kept until the new one answers,
    /// and restored if it does not. Repeated failures in that mode drop the
    /// session to a single link with pooling off.
    pub(super) fn reopen(&mut self, target: Option<u64>) -> Result<()> {
        let old_offset = self.offset;
        let old_skip = self.pending_skip;
        let fallback = match self.conn.take() {
            Some(conn) if self.dual_link => Some(conn),
            Some(conn) => {
                self.pool.discard(conn.into_link());
                None
            }
            None => None,
        };
        if fallback.is_none() {
            self.settle_idle();
        }
        if let Some(t) = target {
            self.offset = t;
        }
        self.pending_skip = 0;
        tracing::debug!(
            from = old_offset,
            to = self.offset,
            fallback = fallback.is_some(),
            "reopening"
        );
        match self.open_cnx() {
            Ok(()) => {
                if let Some(old) = fallback {
                    self.pool.discard(old.into_link());
                }
                self.failed_reopens = 0;
                Ok(())
            }
            Err(e) => {
                self.offset = old_offset;
                self.pending_skip = old_skip;
                if let Some(old) = fallback {
                    self.failed_reopens += 1;
                    if self.failed_reopens >= self.cfg.downgrade_after_failures.max(1) {
                        tracing::warn!(
                            failures = self.failed_reopens,
                            "reconnects keep failing; using a single link without pooling"
                        );
                        self.dual_link = false;
                        self.pool_enabled = false;
                    }
                    self.conn = Some(old);
                    self.transition(Event::Restored)?;
                }
                Err(e)
            }
        }
    }
}

/// Clamp a raw read so it never runs past the known size.
fn capped(size: Option<u64>, compressed: bool, raw_pos: u64, want: usize) -> usize {
    match size {
        Some(size) if !compressed => {
            let left = size.saturating_sub(raw_pos);
            want.min(usize::try_from(left).unwrap_or(usize::MAX))
        }
        _ => want,
    }
}

/// A body cut off by the peer is the normal end of a live stream, and of a
/// resource whose tail the server has repeatedly failed to deliver.
fn tolerate_cut(res: Result<usize>, cut_is_end: bool) -> Result<usize> {
    match res {
        Err(HttpError::LinkBroken(reason)) if cut_is_end => {
            tracing::debug!(%reason, "body cut short; treating as end of stream");
            Ok(0)
        }
        other => other,
    }
}

/// The body ended. Short of the known size (and not a live stream) the link
/// was cut, which the caller retries as a broken link.
fn end_of_body(offset: u64, size: Option<u64>, live: bool, discard_runs: u32) -> Result<usize> {
    match size {
        Some(size) if offset < size && !live && discard_runs < MAX_DISCARD_RUNS => {
            Err(HttpError::LinkBroken(format!(
                "connection closed at {offset} of {size} bytes"
            )))
        }
        _ => Ok(0),
    }
}
