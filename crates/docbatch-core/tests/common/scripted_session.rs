//! In-process `SessionProvider` with per-URL scripted responses.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use docbatch_core::retry::FetchError;
use docbatch_core::session::{RawDocument, SessionError, SessionProvider};

pub type Response = Result<RawDocument, FetchError>;

/// PDF response whose body is unique to `url`.
pub fn pdf_for(url: &str) -> RawDocument {
    pdf_bytes(format!("%PDF-1.4 {}", url).into_bytes())
}

pub fn pdf_bytes(bytes: Vec<u8>) -> RawDocument {
    RawDocument {
        bytes,
        content_type: Some("application/pdf".to_string()),
        final_url: String::new(),
    }
}

/// Replays scripted responses per URL; once a URL's script is exhausted (or
/// it has none) the URL succeeds with a unique PDF body.
#[derive(Default)]
pub struct ScriptedSession {
    scripts: Mutex<HashMap<String, VecDeque<Response>>>,
    fetches: Mutex<HashMap<String, usize>>,
    refreshes: AtomicUsize,
    refresh_fails: AtomicBool,
    delay: Option<Duration>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch sleeps for `delay` (to overlap fetches).
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn script(&self, url: &str, responses: Vec<Response>) {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), responses.into());
    }

    pub fn fail_refresh(&self) {
        self.refresh_fails.store(true, Ordering::SeqCst);
    }

    pub fn fetch_count(&self, url: &str) -> usize {
        self.fetches.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap().values().sum()
    }

    pub fn refresh_count(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }

    /// Highest number of fetches observed in flight at once.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SessionProvider for ScriptedSession {
    async fn fetch(&self, url: &str) -> Result<RawDocument, FetchError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        *self
            .fetches
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default() += 1;

        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        let next = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(|q| q.pop_front());
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        next.unwrap_or_else(|| Ok(pdf_for(url)))
    }

    async fn refresh(&self) -> Result<(), SessionError> {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        if self.refresh_fails.load(Ordering::SeqCst) {
            Err(SessionError::RefreshFailed("login rejected".to_string()))
        } else {
            Ok(())
        }
    }
}
