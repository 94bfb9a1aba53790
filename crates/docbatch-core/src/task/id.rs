//! URL normalization and stable task identifiers.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Stable task identifier: first 16 hex chars of SHA-256 over the normalized URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn from_url(url: &str) -> Self {
        TaskId(url_digest(url)[..16].to_string())
    }

    /// Wrap an id read back from the progress store.
    pub fn from_stored(s: impl Into<String>) -> Self {
        TaskId(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Canonical form of a URL for hashing: scheme and host lowercased, default
/// port dropped, fragment removed, query kept. Unparseable input is only trimmed
/// so malformed URLs still get a stable id (the fetcher rejects them later).
pub fn normalize_url(url: &str) -> String {
    let trimmed = url.trim();
    match url::Url::parse(trimmed) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.to_string()
        }
        Err(_) => trimmed.to_string(),
    }
}

/// Lowercase hex SHA-256 of the normalized URL.
pub fn url_digest(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_url(url).as_bytes());
    hex::encode(hasher.finalize())
}
