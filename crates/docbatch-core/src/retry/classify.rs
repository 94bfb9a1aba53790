//! Classify HTTP status and curl errors into fetch errors.

use super::error::FetchError;

/// Classify a non-2xx HTTP status. 401 and 419/440 (login-timeout codes used
/// by some portals) mean the session is no longer accepted.
pub fn classify_http_status(code: u32) -> FetchError {
    match code {
        401 | 419 | 440 => FetchError::SessionExpired,
        404 | 410 => FetchError::NotFound(code),
        408 => FetchError::Timeout,
        429 => FetchError::RateLimited(code),
        500..=599 => FetchError::Server(code),
        _ => FetchError::Client(code),
    }
}

/// Classify a curl error. Anything not recognisably transient is treated as a
/// connection failure so the retry ceiling still bounds it.
pub fn classify_curl_error(e: &curl::Error) -> FetchError {
    if e.is_operation_timedout() {
        return FetchError::Timeout;
    }
    if e.is_url_malformed() || e.is_unsupported_protocol() {
        return FetchError::InvalidUrl(e.to_string());
    }
    FetchError::Connection(e.to_string())
}
