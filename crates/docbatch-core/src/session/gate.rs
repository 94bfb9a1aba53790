//! Single-flight session refresh.

use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::Mutex;

use super::provider::{SessionError, SessionProvider};

/// Collapses concurrent refresh requests for the same expiration into one
/// `refresh()` call.
///
/// Callers read `generation()` before fetching. When the fetch reports an
/// expired session they call `refresh(provider, observed)`: the first caller
/// for that generation performs the refresh, later callers that saw the same
/// generation get the outcome of that refresh without refreshing again, even
/// if further refreshes have happened since.
#[derive(Debug, Default)]
pub struct RefreshGate {
    generation: AtomicU64,
    /// `outcomes[g]` is the result of the refresh that moved generation `g` to `g + 1`.
    outcomes: Mutex<Vec<Result<(), SessionError>>>,
}

impl RefreshGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub async fn refresh(
        &self,
        provider: &dyn SessionProvider,
        observed: u64,
    ) -> Result<(), SessionError> {
        let mut outcomes = self.outcomes.lock().await;
        let current = outcomes.len() as u64;
        if observed < current {
            return usize::try_from(observed)
                .ok()
                .and_then(|g| outcomes.get(g))
                .cloned()
                .unwrap_or(Ok(()));
        }
        let outcome = provider.refresh().await;
        match &outcome {
            Ok(()) => tracing::info!(generation = current + 1, "session refreshed"),
            Err(e) => tracing::error!(error = %e, "session refresh failed"),
        }
        outcomes.push(outcome.clone());
        self.generation.store(current + 1, Ordering::Release);
        outcome
    }
}
