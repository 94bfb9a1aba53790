//! Durable per-batch progress store (SQLite via sqlx).
//!
//! One record per `(batch_id, task_id)` holding the task's status, attempt
//! count, last error kind and, once succeeded, the stored file and its hash. Every write is a single upsert so a crash never
//! leaves a half-written record, and replaying a write is harmless.

pub(crate) mod db;
mod records;
mod types;

#[cfg(test)]
mod tests;

pub use db::ProgressStore;
pub use types::{ProgressRecord, ProgressStoreError, StatusCounts};
