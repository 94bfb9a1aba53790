use async_trait::async_trait;

use crate::retry::FetchError;

/// Response body plus what the transport learned about it.
#[derive(Debug, Clone, Default)]
pub struct RawDocument {
    pub bytes: Vec<u8>,
    /// `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// URL after redirects.
    pub final_url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("no credentials configured; log in first")]
    NoCredentials,
    #[error("cookie store {path} unusable: {reason}")]
    CookieStore { path: String, reason: String },
    #[error("session refresh failed: {0}")]
    RefreshFailed(String),
}

/// An authenticated session able to fetch document bytes.
///
/// Implementations must be safe to call from many workers at once. `fetch`
/// reports an expired session as `FetchError::SessionExpired`.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<RawDocument, FetchError>;

    async fn refresh(&self) -> Result<(), SessionError>;
}
