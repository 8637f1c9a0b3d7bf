//! Seek by reconnect, with read-and-discard when ranges are ignored.

use super::{SeekCapability, Session, Whence};
use crate::error::{HttpError, Result};
use crate::retry::classify;

fn to_i64(v: u64) -> i64 {
    i64::try_from(v).unwrap_or(i64::MAX)
}

impl Session {
    /// Move the read position. Returns the new absolute offset.
    ///
    /// `Whence::Size` reports the total size without I/O. `Current` with 0
    /// reports the offset even on unseekable resources. Anything outside
    /// `[0, size)` is [`HttpError::OutOfRange`].
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Result<u64> {
        self.abort.check()?;
        self.ensure_readable()?;
        let target = match whence {
            Whence::Size => return self.size.ok_or(HttpError::NotSeekable),
            Whence::Current if offset == 0 => return Ok(self.offset),
            Whence::Set => Some(offset),
            Whence::Current => to_i64(self.offset).checked_add(offset),
            Whence::End => self.size.and_then(|s| to_i64(s).checked_add(offset)),
        };
        if !self.is_seekable() {
            return Err(HttpError::NotSeekable);
        }
        let size = self.size.ok_or(HttpError::NotSeekable)?;
        let target = match target {
            Some(t) if t >= 0 && (t as u64) < size => t as u64,
            other => {
                return Err(HttpError::OutOfRange {
                    offset: other.unwrap_or(i64::MAX),
                    size: Some(size),
                })
            }
        };
        if target == self.offset && self.conn.is_some() && self.pending_skip == 0 {
            return Ok(target);
        }

        self.range_hint = true;
        let attempts = self.cfg.retry_config().seek_attempts.max(1);
        let mut attempt = 1;
        loop {
            self.abort.check()?;
            match self.reopen(Some(target)) {
                Ok(()) => {
                    tracing::debug!(target, capability = ?self.capability, "seek done");
                    return Ok(self.offset);
                }
                Err(e) if e.status().is_some() => {
                    tracing::warn!(error = %e, "ranged reopen refused; resource no longer seekable");
                    self.capability = SeekCapability::Refused;
                    return Err(e);
                }
                Err(e) if self.conn.is_some() => {
                    // The previous link was restored; keep reading from it.
                    tracing::warn!(error = %e, offset = self.offset, "seek failed; staying on the previous link");
                    return Err(e);
                }
                Err(e) if !classify(&e).is_transient() || attempt >= attempts => return Err(e),
                Err(e) => {
                    tracing::debug!(attempt, error = %e, "seek reconnect failed");
                    attempt += 1;
                }
            }
        }
    }
}
