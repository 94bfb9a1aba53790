//! Fetch failure type, classified before the retry decision.

use super::policy::ErrorKind;

/// Error returned by one fetch attempt (transport, HTTP status, session or
/// content problem). Each variant maps to exactly one `ErrorKind`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out")]
    Timeout,
    #[error("rate limited (HTTP {0})")]
    RateLimited(u32),
    #[error("server error (HTTP {0})")]
    Server(u32),
    #[error("connection failed: {0}")]
    Connection(String),
    #[error("session expired")]
    SessionExpired,
    #[error("malformed URL: {0}")]
    InvalidUrl(String),
    #[error("document not found (HTTP {0})")]
    NotFound(u32),
    #[error("client error (HTTP {0})")]
    Client(u32),
    #[error("unsupported content: {0}")]
    UnsupportedContent(String),
    #[error("response contained no document")]
    MissingDocument,
}

impl FetchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchError::Timeout => ErrorKind::Timeout,
            FetchError::RateLimited(_) => ErrorKind::RateLimited,
            FetchError::Server(_) => ErrorKind::ServerError,
            FetchError::Connection(_) => ErrorKind::Connection,
            FetchError::SessionExpired => ErrorKind::SessionExpired,
            FetchError::InvalidUrl(_) => ErrorKind::InvalidUrl,
            FetchError::NotFound(_) => ErrorKind::NotFound,
            FetchError::Client(_) => ErrorKind::ClientError,
            FetchError::UnsupportedContent(_) => ErrorKind::UnsupportedContent,
            FetchError::MissingDocument => ErrorKind::MissingDocument,
        }
    }
}
