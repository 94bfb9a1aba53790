//! Record read operations.

use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::collections::HashMap;
use std::path::PathBuf;

use super::super::db::ProgressStore;
use super::super::types::{ProgressRecord, StatusCounts};
use crate::retry::ErrorKind;
use crate::task::{TaskId, TaskStatus};

fn record_from_row(row: &SqliteRow) -> ProgressRecord {
    let status: String = row.get("status");
    let attempts: i64 = row.get("attempts");
    let last_error: Option<String> = row.get("last_error");
    let completed_at: Option<i64> = row.get("completed_at");
    let output_path: Option<String> = row.get("output_path");
    ProgressRecord {
        batch_id: row.get("batch_id"),
        task_id: TaskId::from_stored(row.get::<String, _>("task_id")),
        url: row.get("url"),
        status: TaskStatus::from_str(&status),
        attempts: u32::try_from(attempts).unwrap_or(0),
        last_error: last_error.as_deref().and_then(ErrorKind::from_str),
        completed_at: completed_at.and_then(|s| DateTime::<Utc>::from_timestamp(s, 0)),
        output_path: output_path.map(PathBuf::from),
        content_hash: row.get("content_hash"),
    }
}

impl ProgressStore {
    /// All records of a batch keyed by task id.
    pub async fn load_batch(&self, batch_id: &str) -> Result<HashMap<TaskId, ProgressRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT batch_id, task_id, url, status, attempts, last_error, completed_at,
                   output_path, content_hash
            FROM progress
            WHERE batch_id = ?1
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(record_from_row)
            .map(|r| (r.task_id.clone(), r))
            .collect())
    }

    /// One record, if present.
    pub async fn get(&self, batch_id: &str, task_id: &TaskId) -> Result<Option<ProgressRecord>> {
        let row = sqlx::query(
            r#"
            SELECT batch_id, task_id, url, status, attempts, last_error, completed_at,
                   output_path, content_hash
            FROM progress
            WHERE batch_id = ?1 AND task_id = ?2
            "#,
        )
        .bind(batch_id)
        .bind(task_id.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(record_from_row))
    }

    /// Records of a batch with the given status, most recently updated first.
    pub async fn list_with_status(
        &self,
        batch_id: &str,
        status: TaskStatus,
    ) -> Result<Vec<ProgressRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT batch_id, task_id, url, status, attempts, last_error, completed_at,
                   output_path, content_hash
            FROM progress
            WHERE batch_id = ?1 AND status = ?2
            ORDER BY updated_at DESC, task_id ASC
            "#,
        )
        .bind(batch_id)
        .bind(status.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.iter().map(record_from_row).collect())
    }

    /// Per-status counts for a whole batch.
    pub async fn counts(&self, batch_id: &str) -> Result<StatusCounts> {
        let rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) AS n
            FROM progress
            WHERE batch_id = ?1
            GROUP BY status
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.pool)
        .await?;

        let mut counts = StatusCounts::default();
        for row in rows {
            let status: String = row.get("status");
            let n: i64 = row.get("n");
            counts.add_n(TaskStatus::from_str(&status), usize::try_from(n).unwrap_or(0));
        }
        Ok(counts)
    }

    /// Distinct batch ids present in this store.
    pub async fn batch_ids(&self) -> Result<Vec<String>> {
        let rows = sqlx::query(r#"SELECT DISTINCT batch_id FROM progress ORDER BY batch_id"#)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(|r| r.get("batch_id")).collect())
    }
}
