use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::BatchConfig;

/// High-level classification of a task failure, persisted as `last_error`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Operation timed out (connect/read).
    Timeout,
    /// Server asked us to slow down (429).
    RateLimited,
    /// 5xx-equivalent response.
    ServerError,
    /// Network-level failure (connection reset, DNS, etc.).
    Connection,
    /// Session was rejected or redirected to login.
    SessionExpired,
    InvalidUrl,
    /// 404/410-equivalent.
    NotFound,
    /// Any other 4xx.
    ClientError,
    /// Body is not a supported document (HTML page, unknown binary).
    UnsupportedContent,
    /// Empty body.
    MissingDocument,
    /// Writing the document to the output directory failed.
    Storage,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Timeout => "timeout",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::ServerError => "server_error",
            ErrorKind::Connection => "connection",
            ErrorKind::SessionExpired => "session_expired",
            ErrorKind::InvalidUrl => "invalid_url",
            ErrorKind::NotFound => "not_found",
            ErrorKind::ClientError => "client_error",
            ErrorKind::UnsupportedContent => "unsupported_content",
            ErrorKind::MissingDocument => "missing_document",
            ErrorKind::Storage => "storage",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        Some(match s {
            "timeout" => ErrorKind::Timeout,
            "rate_limited" => ErrorKind::RateLimited,
            "server_error" => ErrorKind::ServerError,
            "connection" => ErrorKind::Connection,
            "session_expired" => ErrorKind::SessionExpired,
            "invalid_url" => ErrorKind::InvalidUrl,
            "not_found" => ErrorKind::NotFound,
            "client_error" => ErrorKind::ClientError,
            "unsupported_content" => ErrorKind::UnsupportedContent,
            "missing_document" => ErrorKind::MissingDocument,
            "storage" => ErrorKind::Storage,
            _ => return None,
        })
    }

    /// Failures a retry can plausibly fix. `SessionExpired` only reaches the
    /// policy after a successful refresh, so it is retryable here.
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::Timeout
                | ErrorKind::RateLimited
                | ErrorKind::ServerError
                | ErrorKind::Connection
                | ErrorKind::SessionExpired
        )
    }
}

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Put the task back on the queue after the given delay.
    Requeue(Duration),
    /// Stop for this run; a later run may retry.
    MarkFailed,
    /// Never retry.
    MarkPermanentlyFailed,
}

/// Exponential backoff with an attempt ceiling, built from `BatchConfig`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub enabled: bool,
    /// Attempt ceiling (including the first attempt).
    pub max_retries: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&BatchConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(cfg: &BatchConfig) -> Self {
        Self {
            enabled: cfg.retry_enabled,
            max_retries: cfg.max_retries.max(1),
            base_backoff: cfg.base_backoff(),
            max_backoff: cfg.max_backoff(),
        }
    }

    /// Decide what to do after a failed attempt.
    ///
    /// `attempts` is the number of attempts made so far, including the one that
    /// just failed (1 = first attempt).
    pub fn decide(&self, attempts: u32, kind: ErrorKind) -> RetryDecision {
        if !self.enabled {
            return RetryDecision::MarkFailed;
        }
        if kind == ErrorKind::Storage {
            return RetryDecision::MarkFailed;
        }
        if !kind.is_transient() {
            return RetryDecision::MarkPermanentlyFailed;
        }
        if attempts >= self.max_retries {
            return RetryDecision::MarkPermanentlyFailed;
        }
        RetryDecision::Requeue(self.backoff(attempts))
    }

    /// `base * 2^(attempts-1)`, capped at `max_backoff`.
    pub fn backoff(&self, attempts: u32) -> Duration {
        let exp = 1u32 << attempts.saturating_sub(1).min(16);
        self.base_backoff.saturating_mul(exp).min(self.max_backoff)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delay(d: RetryDecision) -> Duration {
        match d {
            RetryDecision::Requeue(d) => d,
            other => panic!("expected requeue, got {:?}", other),
        }
    }

    #[test]
    fn permanent_kinds_short_circuit() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(1, ErrorKind::NotFound), RetryDecision::MarkPermanentlyFailed);
        assert_eq!(p.decide(1, ErrorKind::InvalidUrl), RetryDecision::MarkPermanentlyFailed);
        assert_eq!(
            p.decide(1, ErrorKind::UnsupportedContent),
            RetryDecision::MarkPermanentlyFailed
        );
    }

    #[test]
    fn backoff_doubles_from_base_under_default_config() {
        let p = RetryPolicy::default();
        let d1 = delay(p.decide(1, ErrorKind::Timeout));
        let d2 = delay(p.decide(2, ErrorKind::Timeout));
        assert_eq!(d1, Duration::from_secs(2));
        assert_eq!(d2, Duration::from_secs(4));
        assert!(d2 >= d1);
        assert!(d1 >= p.base_backoff);
    }

    #[test]
    fn backoff_is_capped() {
        let mut p = RetryPolicy::default();
        p.max_retries = 50;
        let d = delay(p.decide(30, ErrorKind::ServerError));
        assert_eq!(d, p.max_backoff);
    }

    #[test]
    fn ceiling_turns_transient_into_permanent() {
        let p = RetryPolicy::default();
        assert!(matches!(p.decide(1, ErrorKind::RateLimited), RetryDecision::Requeue(_)));
        assert!(matches!(p.decide(2, ErrorKind::RateLimited), RetryDecision::Requeue(_)));
        assert_eq!(
            p.decide(3, ErrorKind::RateLimited),
            RetryDecision::MarkPermanentlyFailed
        );
    }

    #[test]
    fn disabled_policy_marks_failed() {
        let cfg = BatchConfig {
            retry_enabled: false,
            ..BatchConfig::default()
        };
        let p = RetryPolicy::from_config(&cfg);
        assert_eq!(p.decide(1, ErrorKind::Timeout), RetryDecision::MarkFailed);
        assert_eq!(p.decide(1, ErrorKind::NotFound), RetryDecision::MarkFailed);
    }

    #[test]
    fn storage_failure_is_failed_not_permanent() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(1, ErrorKind::Storage), RetryDecision::MarkFailed);
    }

    #[test]
    fn error_kind_string_roundtrip() {
        for k in [
            ErrorKind::Timeout,
            ErrorKind::SessionExpired,
            ErrorKind::NotFound,
            ErrorKind::Storage,
        ] {
            assert_eq!(ErrorKind::from_str(k.as_str()), Some(k));
        }
        assert_eq!(ErrorKind::from_str("bogus"), None);
    }
}
