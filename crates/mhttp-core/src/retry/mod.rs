//! Retry and backoff policy.
//!
//! This module maps [`HttpError`](crate::error::HttpError) values onto the
//! retry taxonomy (broken link, timeout, protocol, server status) and runs
//! the bounded retry loop used when opening a session, so the lifecycle
//! manager and the seek controller share one policy.

mod classify;
mod policy;
mod run;

pub use classify::{classify, classify_http_status};
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
pub use run::run_with_retry;
