//! Connection setup and schema for the progress store.

use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::path::Path;

/// Handle to one batch's progress database (`<batch file>.progress.db`).
#[derive(Clone)]
pub struct ProgressStore {
    pub(crate) pool: Pool<Sqlite>,
}

impl ProgressStore {
    /// Open (or create) the store at `path`, creating parent dirs if needed.
    pub async fn open_at(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Full);
        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(opts)
            .await
            .with_context(|| format!("opening progress store {}", path.display()))?;
        let store = ProgressStore { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS progress (
                batch_id TEXT NOT NULL,
                task_id TEXT NOT NULL,
                url TEXT NOT NULL,
                status TEXT NOT NULL,
                attempts INTEGER NOT NULL DEFAULT 0,
                last_error TEXT,
                completed_at INTEGER,
                updated_at INTEGER NOT NULL,
                output_path TEXT,
                content_hash TEXT,
                PRIMARY KEY (batch_id, task_id)
            );
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Stores created before output tracking lack these columns.
        for column in ["output_path", "content_hash"] {
            let (present,): (i64,) =
                sqlx::query_as("SELECT COUNT(*) FROM pragma_table_info('progress') WHERE name = ?1")
                    .bind(column)
                    .fetch_one(&self.pool)
                    .await?;
            if present == 0 {
                sqlx::query(&format!("ALTER TABLE progress ADD COLUMN {} TEXT", column))
                    .execute(&self.pool)
                    .await
                    .with_context(|| format!("adding column {}", column))?;
            }
        }
        Ok(())
    }

    /// Close the pool. Later operations fail.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

pub(crate) fn unix_timestamp() -> i64 {
    chrono::Utc::now().timestamp()
}

#[cfg(test)]
/// In-memory store for tests (no disk I/O).
pub(crate) async fn open_memory() -> Result<ProgressStore> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    let store = ProgressStore { pool };
    store.migrate().await?;
    Ok(store)
}
