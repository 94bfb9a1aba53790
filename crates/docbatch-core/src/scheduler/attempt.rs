//! One task attempt: fetch under a session slot, store, decide, persist.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::slots::SessionSlots;
use crate::fetcher::{FetchFailure, Fetcher};
use crate::progress::{ProgressRecord, ProgressStore, ProgressStoreError};
use crate::retry::{ErrorKind, FetchError, RetryDecision, RetryPolicy};
use crate::storage::{self, DownloadedFile, StorageError};
use crate::task::{BatchId, Task, TaskStatus};

/// Shared, read-only state every attempt needs.
pub(super) struct AttemptCtx {
    pub(super) batch_id: BatchId,
    pub(super) fetcher: Fetcher,
    pub(super) store: ProgressStore,
    pub(super) slots: Arc<SessionSlots>,
    pub(super) policy: RetryPolicy,
    pub(super) output_dir: PathBuf,
}

pub(super) enum Outcome {
    Stored(DownloadedFile),
    Requeue(Duration),
    Failed,
    PermanentlyFailed,
}

/// The task as persisted after the attempt, and what happened.
pub(super) struct AttemptReport {
    pub(super) task: Task,
    pub(super) outcome: Outcome,
}

#[derive(Debug, thiserror::Error)]
enum AttemptError {
    #[error(transparent)]
    Fetch(#[from] FetchFailure),
    #[error("storage: {0}")]
    Storage(#[from] StorageError),
}

impl AttemptError {
    fn kind(&self) -> ErrorKind {
        match self {
            AttemptError::Fetch(f) => f.kind(),
            AttemptError::Storage(_) => ErrorKind::Storage,
        }
    }
}

async fn fetch_and_store(ctx: &AttemptCtx, task: &Task) -> Result<DownloadedFile, AttemptError> {
    let doc = {
        let _slot = ctx
            .slots
            .acquire()
            .await
            .map_err(|_| FetchFailure::from(FetchError::Connection("session slots closed".into())))?;
        ctx.fetcher.fetch(task).await?
    };
    Ok(storage::store(&ctx.output_dir, task, &doc).await?)
}

/// Run one attempt and write exactly one progress record for it. A store
/// write failure is returned as fatal.
pub(super) async fn run_attempt(
    ctx: Arc<AttemptCtx>,
    mut task: Task,
) -> Result<AttemptReport, ProgressStoreError> {
    task.attempts += 1;
    let attempt = task.attempts;

    let outcome = match fetch_and_store(&ctx, &task).await {
        Ok(file) => {
            task.status = TaskStatus::Succeeded;
            task.last_error = None;
            Outcome::Stored(file)
        }
        Err(failure) => {
            let kind = failure.kind();
            task.last_error = Some(kind);
            let decision = match &failure {
                AttemptError::Fetch(FetchFailure::RefreshFailed(_)) => RetryDecision::MarkFailed,
                _ => ctx.policy.decide(attempt, kind),
            };
            match decision {
                RetryDecision::Requeue(delay) => {
                    task.status = TaskStatus::Pending;
                    tracing::warn!(
                        task_id = %task.id,
                        url = %task.url,
                        attempt,
                        kind = kind.as_str(),
                        delay_ms = delay.as_millis() as u64,
                        "attempt failed ({}); requeued",
                        failure
                    );
                    Outcome::Requeue(delay)
                }
                RetryDecision::MarkFailed => {
                    task.status = TaskStatus::Failed;
                    tracing::warn!(
                        task_id = %task.id,
                        url = %task.url,
                        attempt,
                        kind = kind.as_str(),
                        "task failed: {}",
                        failure
                    );
                    Outcome::Failed
                }
                RetryDecision::MarkPermanentlyFailed => {
                    task.status = TaskStatus::PermanentlyFailed;
                    tracing::error!(
                        task_id = %task.id,
                        url = %task.url,
                        attempt,
                        kind = kind.as_str(),
                        "task permanently failed: {}",
                        failure
                    );
                    Outcome::PermanentlyFailed
                }
            }
        }
    };

    let record = match &outcome {
        Outcome::Stored(file) => ProgressRecord::for_task(&ctx.batch_id, &task).with_output(file),
        _ => ProgressRecord::for_task(&ctx.batch_id, &task),
    };
    if let Err(e) = ctx.store.put(&record).await {
        tracing::error!(task_id = %task.id, "progress write failed: {:#}", e);
        return Err(ProgressStoreError::new(format!("task {}", task.id), &e));
    }

    if let Outcome::Stored(file) = &outcome {
        tracing::info!(
            task_id = %task.id,
            attempt,
            path = %file.path.display(),
            size = file.size_bytes,
            "downloaded"
        );
    }
    Ok(AttemptReport { task, outcome })
}
