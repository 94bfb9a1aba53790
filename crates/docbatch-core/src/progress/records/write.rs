//! Record write operations: seed, upsert, clear.

use anyhow::Result;

use super::super::db::{unix_timestamp, ProgressStore};
use super::super::types::ProgressRecord;
use crate::task::{Task, TaskStatus};

impl ProgressStore {
    /// Create a `Pending` record for every task that has none yet. Existing
    /// records are left untouched. Returns the number of rows inserted.
    pub async fn seed_pending(&self, batch_id: &str, tasks: &[Task]) -> Result<u64> {
        let now = unix_timestamp();
        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for task in tasks {
            let r = sqlx::query(
                r#"
                INSERT OR IGNORE INTO progress (
                    batch_id, task_id, url, status, attempts, last_error, completed_at, updated_at
                ) VALUES (?1, ?2, ?3, ?4, 0, NULL, NULL, ?5)
                "#,
            )
            .bind(batch_id)
            .bind(task.id.as_str())
            .bind(&task.url)
            .bind(TaskStatus::Pending.as_str())
            .bind(now)
            .execute(&mut *tx)
            .await?;
            inserted += r.rows_affected();
        }
        tx.commit().await?;
        Ok(inserted)
    }

    /// Write a record, superseding any prior record for the same key. The
    /// upsert is one statement, so it either lands whole or not at all.
    pub async fn put(&self, record: &ProgressRecord) -> Result<()> {
        let now = unix_timestamp();
        sqlx::query(
            r#"
            INSERT INTO progress (
                batch_id, task_id, url, status, attempts, last_error, completed_at, updated_at,
                output_path, content_hash
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            ON CONFLICT(batch_id, task_id) DO UPDATE SET
                url = excluded.url,
                status = excluded.status,
                attempts = excluded.attempts,
                last_error = excluded.last_error,
                completed_at = excluded.completed_at,
                updated_at = excluded.updated_at,
                output_path = excluded.output_path,
                content_hash = excluded.content_hash
            "#,
        )
        .bind(&record.batch_id)
        .bind(record.task_id.as_str())
        .bind(&record.url)
        .bind(record.status.as_str())
        .bind(i64::from(record.attempts))
        .bind(record.last_error.map(|k| k.as_str()))
        .bind(record.completed_at.map(|t| t.timestamp()))
        .bind(now)
        .bind(
            record
                .output_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
        )
        .bind(record.content_hash.as_deref())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Delete every record of a batch (fresh start). Returns rows removed.
    pub async fn clear_batch(&self, batch_id: &str) -> Result<u64> {
        let r = sqlx::query(r#"DELETE FROM progress WHERE batch_id = ?1"#)
            .bind(batch_id)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected())
    }
}
