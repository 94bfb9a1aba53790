//! Batch scheduler / worker pool.
//!
//! Loads a batch's progress, queues every task that still needs work and runs
//! up to `max_workers` attempts at once. Each attempt is one fetch plus one
//! progress write; failed attempts go through the retry policy and may come
//! back after a backoff delay. Session concurrency is bounded separately by
//! `SessionSlots`.

mod attempt;
mod queue;
mod run;
mod slots;
mod summary;

pub use run::{RunMode, Scheduler};
pub use slots::{SessionSlots, SlotGuard};
pub use summary::{write_summary, BatchResult, FailedTask};
