//! Types stored in and returned by the progress store.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::PathBuf;

use crate::retry::ErrorKind;
use crate::storage::DownloadedFile;
use crate::task::{BatchId, Task, TaskId, TaskStatus};

/// Persisted outcome of one task within one batch.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressRecord {
    pub batch_id: BatchId,
    pub task_id: TaskId,
    pub url: String,
    pub status: TaskStatus,
    pub attempts: u32,
    pub last_error: Option<ErrorKind>,
    /// Set when the task reaches `Succeeded` or `PermanentlyFailed`.
    pub completed_at: Option<DateTime<Utc>>,
    /// Where a `Succeeded` task's document was written.
    pub output_path: Option<PathBuf>,
    /// SHA-256 of that document, so a copy kept by dedup still counts.
    pub content_hash: Option<String>,
}

impl ProgressRecord {
    /// Record reflecting the task's current in-memory state.
    pub fn for_task(batch_id: &str, task: &Task) -> Self {
        let completed_at = task.status.is_terminal().then(Utc::now);
        Self {
            batch_id: batch_id.to_string(),
            task_id: task.id.clone(),
            url: task.url.clone(),
            status: task.status,
            attempts: task.attempts,
            last_error: task.last_error,
            completed_at,
            output_path: None,
            content_hash: None,
        }
    }

    /// Attach the stored document of a successful attempt.
    pub fn with_output(mut self, file: &DownloadedFile) -> Self {
        self.output_path = Some(file.path.clone());
        self.content_hash = Some(file.content_hash.clone());
        self
    }
}

/// Task counts per status. `InProgress` rows count as pending.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub permanently_failed: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: TaskStatus) {
        self.add_n(status, 1);
    }

    pub fn add_n(&mut self, status: TaskStatus, n: usize) {
        let field = match status {
            TaskStatus::Pending | TaskStatus::InProgress => &mut self.pending,
            TaskStatus::Succeeded => &mut self.succeeded,
            TaskStatus::Failed => &mut self.failed,
            TaskStatus::PermanentlyFailed => &mut self.permanently_failed,
        };
        *field += n;
    }

    pub fn total(&self) -> usize {
        self.pending + self.succeeded + self.failed + self.permanently_failed
    }
}

/// The progress store could not be read or written. Fatal to the run.
#[derive(Debug, thiserror::Error)]
#[error("progress store failure ({context}): {message}")]
pub struct ProgressStoreError {
    /// What was being persisted, e.g. `task 0123abcd` or `seeding batch laws`.
    pub context: String,
    pub message: String,
}

impl ProgressStoreError {
    pub fn new(context: impl Into<String>, err: &anyhow::Error) -> Self {
        Self {
            context: context.into(),
            message: format!("{:#}", err),
        }
    }
}
