//! Cooperative cancellation for blocking session calls.
//!
//! A session checks its token at the top of every blocking call and on every
//! iteration of a would-block wait loop. Tripping the token never interrupts
//! the transport itself; the next check returns [`HttpError::Aborted`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::{HttpError, Result};

/// Granularity of abort-aware sleeps.
const SLEEP_SLICE: Duration = Duration::from_millis(20);

/// Shared abort flag. Clones observe the same flag.
#[derive(Debug, Clone, Default)]
pub struct AbortToken {
    flag: Arc<AtomicBool>,
}

impl AbortToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request abort. Every session holding a clone of this token stops at
    /// its next check.
    pub fn abort(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }

    /// Returns `Err(HttpError::Aborted)` once the token has been tripped.
    pub fn check(&self) -> Result<()> {
        if self.is_aborted() {
            Err(HttpError::Aborted)
        } else {
            Ok(())
        }
    }

    /// Sleep for `d`, waking early with `Aborted` if the token trips.
    pub fn sleep(&self, d: Duration) -> Result<()> {
        let deadline = Instant::now() + d;
        loop {
            self.check()?;
            let now = Instant::now();
            if now >= deadline {
                return Ok(());
            }
            std::thread::sleep((deadline - now).min(SLEEP_SLICE));
        }
    }
}
