//! Session slots: bound on concurrent fetches through the shared session.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};

/// Counting limit on fetches in flight through the session, independent of
/// the worker count. Tracks the high-water mark for reporting.
#[derive(Debug)]
pub struct SessionSlots {
    limit: usize,
    sem: Arc<Semaphore>,
    in_use: AtomicUsize,
    peak: AtomicUsize,
}

impl SessionSlots {
    pub fn new(limit: usize) -> Arc<Self> {
        let limit = limit.max(1);
        Arc::new(Self {
            limit,
            sem: Arc::new(Semaphore::new(limit)),
            in_use: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn in_use(&self) -> usize {
        self.in_use.load(Ordering::Relaxed)
    }

    /// Highest number of slots held at once.
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::Relaxed)
    }

    /// Wait for a free slot. The slot is released when the guard drops.
    pub async fn acquire(self: &Arc<Self>) -> Result<SlotGuard, AcquireError> {
        let permit = Arc::clone(&self.sem).acquire_owned().await?;
        let now = self.in_use.fetch_add(1, Ordering::AcqRel) + 1;
        self.peak.fetch_max(now, Ordering::AcqRel);
        Ok(SlotGuard {
            slots: Arc::clone(self),
            _permit: permit,
        })
    }
}

/// Releases a session slot when dropped.
pub struct SlotGuard {
    slots: Arc<SessionSlots>,
    _permit: OwnedSemaphorePermit,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.slots.in_use.fetch_sub(1, Ordering::AcqRel);
    }
}
