//! Retry and backoff policy.
//!
//! This module encapsulates failure classification (timeouts, throttling,
//! session expiry, permanent client errors) and the per-task retry decision so
//! the scheduler and fetcher share one consistent policy.

mod classify;
mod error;
mod policy;

pub use classify::{classify_curl_error, classify_http_status};
pub use error::FetchError;
pub use policy::{ErrorKind, RetryDecision, RetryPolicy};
