//! Document fetcher: validates the URL, fetches through the session, detects
//! the document format and handles session expiry.

mod format;

pub use format::{detect_format, DocumentFormat};

use std::sync::Arc;

use crate::retry::{ErrorKind, FetchError};
use crate::session::{RefreshGate, SessionError, SessionProvider};
use crate::task::Task;

/// Successfully fetched document.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub bytes: Vec<u8>,
    pub format: DocumentFormat,
}

/// Why a fetch attempt failed.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum FetchFailure {
    /// Classified transport, HTTP or content failure. A `SessionExpired` here
    /// means the session was refreshed and the task may be retried.
    #[error(transparent)]
    Fetch(#[from] FetchError),
    /// The session expired and the refresh did not succeed.
    #[error("session expired and refresh failed: {0}")]
    RefreshFailed(SessionError),
}

impl FetchFailure {
    pub fn kind(&self) -> ErrorKind {
        match self {
            FetchFailure::Fetch(e) => e.kind(),
            FetchFailure::RefreshFailed(_) => ErrorKind::SessionExpired,
        }
    }
}

/// Fetches task documents through a shared session.
#[derive(Clone)]
pub struct Fetcher {
    session: Arc<dyn SessionProvider>,
    gate: Arc<RefreshGate>,
}

impl Fetcher {
    pub fn new(session: Arc<dyn SessionProvider>) -> Self {
        Self {
            session,
            gate: Arc::new(RefreshGate::new()),
        }
    }

    /// One fetch attempt for `task`.
    ///
    /// An expired session triggers exactly one refresh (shared with any other
    /// worker that saw the same expiration) before the failure is returned.
    pub async fn fetch(&self, task: &Task) -> Result<FetchedDocument, FetchFailure> {
        let url = validate_url(&task.url)?;
        let observed = self.gate.generation();

        let raw = match self.session.fetch(url.as_str()).await {
            Ok(raw) => raw,
            Err(FetchError::SessionExpired) => {
                tracing::warn!(task_id = %task.id, url = %task.url, "session expired");
                return match self.gate.refresh(self.session.as_ref(), observed).await {
                    Ok(()) => Err(FetchError::SessionExpired.into()),
                    Err(e) => Err(FetchFailure::RefreshFailed(e)),
                };
            }
            Err(e) => return Err(e.into()),
        };

        if raw.bytes.is_empty() {
            return Err(FetchError::MissingDocument.into());
        }
        let format = detect_format(&raw.bytes, raw.content_type.as_deref(), &raw.final_url)?;
        tracing::debug!(
            task_id = %task.id,
            format = format.extension(),
            size = raw.bytes.len(),
            "fetched document"
        );
        Ok(FetchedDocument {
            bytes: raw.bytes,
            format,
        })
    }
}

/// Reject anything that is not an absolute http(s) URL with a host, before
/// any network traffic.
pub fn validate_url(raw: &str) -> Result<url::Url, FetchError> {
    let url = url::Url::parse(raw.trim()).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(FetchError::InvalidUrl(format!(
                "{}: unsupported scheme {}",
                raw, other
            )))
        }
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(FetchError::InvalidUrl(format!("{}: missing host", raw)));
    }
    Ok(url)
}
