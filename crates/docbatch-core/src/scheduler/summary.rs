//! Per-batch run summary.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use crate::progress::StatusCounts;
use crate::retry::ErrorKind;
use crate::task::TaskId;

/// A task that will not be retried, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FailedTask {
    pub task_id: TaskId,
    pub url: String,
    pub attempts: u32,
    pub last_error: Option<ErrorKind>,
}

/// Result of one scheduler run over a batch.
///
/// Status counts cover the whole batch as recorded in the progress store, so
/// a resumed run reports tasks finished by earlier runs too.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub batch_id: String,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub permanently_failed: usize,
    /// Tasks left pending (only non-zero after cancellation).
    pub pending: usize,
    /// Documents stored by this run.
    pub fetched: usize,
    /// Tasks not queued by this run because of their recorded status.
    pub skipped: usize,
    /// Fetch attempts made by this run.
    pub attempts: usize,
    pub cancelled: bool,
    pub duplicates_removed: usize,
    pub permanent_failures: Vec<FailedTask>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchResult {
    pub(super) fn apply_counts(&mut self, counts: StatusCounts) {
        self.total = counts.total();
        self.succeeded = counts.succeeded;
        self.failed = counts.failed;
        self.permanently_failed = counts.permanently_failed;
        self.pending = counts.pending;
    }

    /// True when every task of the batch succeeded.
    pub fn is_complete(&self) -> bool {
        self.succeeded == self.total
    }
}

/// Write `result` as pretty JSON to `path` (temp file + rename).
pub fn write_summary(result: &BatchResult, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(result).context("serialize batch summary")?;
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = std::path::PathBuf::from(tmp);
    std::fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
    if let Err(e) = std::fs::rename(&tmp, path) {
        let _ = std::fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("replace {}", path.display()));
    }
    Ok(())
}
