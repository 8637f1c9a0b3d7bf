//! Retry loop: run a closure until success or policy says stop.

use super::classify;
use super::policy::{RetryDecision, RetryPolicy};
use crate::control::AbortToken;
use crate::error::{HttpError, Result};

/// Runs `f` until it succeeds or the retry policy says to stop.
///
/// `f` receives the 1-based attempt number so it can drop optimisations once
/// a retry has happened. Backoff sleeps wake early when `abort` trips.
pub fn run_with_retry<T, F>(policy: &RetryPolicy, abort: &AbortToken, mut f: F) -> Result<T>
where
    F: FnMut(u32) -> Result<T>,
{
    let mut attempt = 1u32;
    loop {
        abort.check()?;
        match f(attempt) {
            Ok(v) => return Ok(v),
            Err(e) => {
                let kind = classify::classify(&e);
                match policy.decide(attempt, kind) {
                    RetryDecision::NoRetry => return Err(e),
                    RetryDecision::RetryAfter(d) => {
                        tracing::debug!(attempt, ?kind, delay = ?d, error = %e, "retrying");
                        abort.sleep(d)?;
                        attempt += 1;
                    }
                }
            }
        }
    }
}
