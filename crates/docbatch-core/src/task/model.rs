use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::id::TaskId;
use crate::retry::ErrorKind;

/// Batch identifier (the input file's stem).
pub type BatchId = String;

/// Lifecycle state of a task, stored as a string in the progress store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Succeeded,
    Failed,
    PermanentlyFailed,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Pending => "pending",
            TaskStatus::InProgress => "in_progress",
            TaskStatus::Succeeded => "succeeded",
            TaskStatus::Failed => "failed",
            TaskStatus::PermanentlyFailed => "permanently_failed",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "pending" => TaskStatus::Pending,
            "in_progress" => TaskStatus::InProgress,
            "succeeded" => TaskStatus::Succeeded,
            "failed" => TaskStatus::Failed,
            "permanently_failed" => TaskStatus::PermanentlyFailed,
            _ => TaskStatus::Pending,
        }
    }

    /// Succeeded and PermanentlyFailed are never re-attempted by a resumed run.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::PermanentlyFailed)
    }
}

/// One URL-to-file download unit within a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub url: String,
    pub category: String,
    pub issue_date: NaiveDate,
    pub status: TaskStatus,
    pub attempts: u32,
    pub last_error: Option<ErrorKind>,
}

impl Task {
    pub fn new(url: impl Into<String>, category: impl Into<String>, issue_date: NaiveDate) -> Self {
        let url = url.into();
        Self {
            id: TaskId::from_url(&url),
            url,
            category: category.into(),
            issue_date,
            status: TaskStatus::Pending,
            attempts: 0,
            last_error: None,
        }
    }
}

/// An ordered collection of tasks loaded from one input file. The task set is
/// fixed once loaded.
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: BatchId,
    pub file_path: PathBuf,
    pub tasks: Vec<Task>,
    pub created_at: DateTime<Utc>,
}

impl Batch {
    /// Build a batch, dropping later duplicates of the same task id.
    pub fn new(id: impl Into<BatchId>, file_path: impl Into<PathBuf>, tasks: Vec<Task>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let tasks = tasks
            .into_iter()
            .filter(|t| seen.insert(t.id.clone()))
            .collect();
        Self {
            id: id.into(),
            file_path: file_path.into(),
            tasks,
            created_at: Utc::now(),
        }
    }

    /// Progress store location for this batch: `<file>.progress.db`.
    pub fn progress_path(&self) -> PathBuf {
        let mut p = self.file_path.as_os_str().to_owned();
        p.push(".progress.db");
        PathBuf::from(p)
    }

    /// JSON summary location for this batch: `<file>.summary.json`.
    pub fn summary_path(&self) -> PathBuf {
        let mut p = self.file_path.as_os_str().to_owned();
        p.push(".summary.json");
        PathBuf::from(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 5, 17).unwrap()
    }

    #[test]
    fn status_string_roundtrip() {
        for s in [
            TaskStatus::Pending,
            TaskStatus::InProgress,
            TaskStatus::Succeeded,
            TaskStatus::Failed,
            TaskStatus::PermanentlyFailed,
        ] {
            assert_eq!(TaskStatus::from_str(s.as_str()), s);
        }
    }

    #[test]
    fn batch_drops_duplicate_urls() {
        let tasks = vec![
            Task::new("https://example.com/a.pdf", "tax", date()),
            Task::new("https://example.com/b.pdf", "tax", date()),
            Task::new("https://example.com/a.pdf#frag", "land", date()),
        ];
        let batch = Batch::new("b1", "/tmp/b1.csv", tasks);
        assert_eq!(batch.tasks.len(), 2);
        assert_eq!(batch.tasks[0].category, "tax");
    }

    #[test]
    fn progress_path_sits_next_to_input() {
        let batch = Batch::new("laws", "/data/batches/laws.csv", vec![]);
        assert_eq!(
            batch.progress_path(),
            PathBuf::from("/data/batches/laws.csv.progress.db")
        );
    }
}
