//! The scheduler run loop.

use anyhow::{Context, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::attempt::{run_attempt, AttemptCtx, AttemptReport, Outcome};
use super::queue::{Pacer, WorkQueue};
use super::slots::SessionSlots;
use super::summary::{write_summary, BatchResult, FailedTask};
use crate::config::BatchConfig;
use crate::dedup;
use crate::fetcher::Fetcher;
use crate::progress::{ProgressRecord, ProgressStore, ProgressStoreError, StatusCounts};
use crate::retry::RetryPolicy;
use crate::session::SessionProvider;
use crate::task::{Batch, Task, TaskId, TaskStatus};
use crate::verify;

/// Which recorded tasks a run picks up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RunMode {
    /// Re-attempt pending and failed tasks; skip succeeded and permanently failed.
    #[default]
    Resume,
    /// Attempt only failed and permanently failed tasks, with a fresh attempt budget.
    RetryFailed,
    /// Clear the batch's records and start over.
    Fresh,
    /// Re-fetch only succeeded tasks whose stored document is gone and has no
    /// identical copy left on disk.
    Missing,
}

/// Runs batches against one progress store and one session.
pub struct Scheduler {
    config: BatchConfig,
    store: ProgressStore,
    fetcher: Fetcher,
    slots: Arc<SessionSlots>,
    output_dir: PathBuf,
    write_summary: bool,
}

impl Scheduler {
    /// Build a scheduler. Fails when the configuration has zero workers,
    /// sessions or retries.
    pub fn new(
        config: &BatchConfig,
        store: ProgressStore,
        session: Arc<dyn SessionProvider>,
    ) -> Result<Self> {
        let config = config.validated()?;
        Ok(Self {
            slots: SessionSlots::new(config.max_concurrent_sessions),
            output_dir: config.output_dir.clone(),
            fetcher: Fetcher::new(session),
            store,
            config,
            write_summary: true,
        })
    }

    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Skip writing `<batch>.summary.json`.
    pub fn without_summary_file(mut self) -> Self {
        self.write_summary = false;
        self
    }

    pub fn slots(&self) -> &Arc<SessionSlots> {
        &self.slots
    }

    pub fn output_dir(&self) -> &std::path::Path {
        &self.output_dir
    }

    /// Select the tasks this run works on, in batch order, with their recorded
    /// attempts and last error.
    async fn plan(&self, batch: &Batch, mode: RunMode) -> Result<Vec<Task>> {
        let ctx = format!("loading batch {}", batch.id);
        if mode == RunMode::Fresh {
            let cleared = self
                .store
                .clear_batch(&batch.id)
                .await
                .map_err(|e| ProgressStoreError::new(ctx.clone(), &e))?;
            tracing::info!(batch = %batch.id, cleared, "fresh start: cleared progress");
        }
        self.store
            .seed_pending(&batch.id, &batch.tasks)
            .await
            .map_err(|e| ProgressStoreError::new(ctx.clone(), &e))?;
        let records = self
            .store
            .load_batch(&batch.id)
            .await
            .map_err(|e| ProgressStoreError::new(ctx, &e))?;

        let missing: HashSet<TaskId> = if mode == RunMode::Missing {
            verify::find_missing(records.values().cloned().collect())
                .await
                .with_context(|| format!("checking stored documents of batch {}", batch.id))?
                .into_iter()
                .map(|r| r.task_id)
                .collect()
        } else {
            HashSet::new()
        };
        if mode == RunMode::Missing {
            tracing::info!(batch = %batch.id, missing = missing.len(), "stored documents missing");
        }

        let max_retries = self.config.max_retries;
        let mut work = Vec::new();
        for task in &batch.tasks {
            let mut task = task.clone();
            if let Some(rec) = records.get(&task.id) {
                task.status = rec.status;
                task.attempts = rec.attempts;
                task.last_error = rec.last_error;
            }
            let queued = match (mode, task.status) {
                (RunMode::Missing, TaskStatus::Succeeded) if missing.contains(&task.id) => {
                    task.attempts = 0;
                    task.last_error = None;
                    true
                }
                (RunMode::Missing, _) => false,
                (_, TaskStatus::Succeeded) => false,
                (RunMode::RetryFailed, TaskStatus::Failed | TaskStatus::PermanentlyFailed) => {
                    task.attempts = 0;
                    true
                }
                (RunMode::RetryFailed, _) => false,
                (_, TaskStatus::PermanentlyFailed) => false,
                (_, TaskStatus::Failed) => {
                    task.attempts = 0;
                    true
                }
                (_, TaskStatus::Pending | TaskStatus::InProgress) => true,
            };
            if !queued {
                continue;
            }
            if task.attempts >= max_retries {
                task.attempts = 0;
            }
            task.status = TaskStatus::Pending;
            work.push(task);
        }
        Ok(work)
    }

    /// Run `batch` until every queued task is resolved or `cancel` fires.
    ///
    /// On cancellation in-flight attempts finish and record their outcome;
    /// queued tasks stay `Pending` for the next run. A progress store failure
    /// stops dispatch, drains in-flight attempts and returns a
    /// `ProgressStoreError`.
    pub async fn run(
        &self,
        batch: &Batch,
        mode: RunMode,
        cancel: CancellationToken,
    ) -> Result<BatchResult> {
        if batch.tasks.is_empty() {
            anyhow::bail!("batch {} has no tasks", batch.id);
        }
        let started_at = Utc::now();
        let work = self.plan(batch, mode).await?;
        let skipped = batch.tasks.len() - work.len();
        tracing::info!(
            batch = %batch.id,
            tasks = batch.tasks.len(),
            queued = work.len(),
            skipped,
            ?mode,
            workers = self.config.max_workers,
            sessions = self.slots.limit(),
            "starting batch"
        );

        let ctx = Arc::new(AttemptCtx {
            batch_id: batch.id.clone(),
            fetcher: self.fetcher.clone(),
            store: self.store.clone(),
            slots: Arc::clone(&self.slots),
            policy: RetryPolicy::from_config(&self.config),
            output_dir: self.output_dir.clone(),
        });
        let max_workers = self.config.max_workers;
        let mut queue = WorkQueue::new(work, self.config.chunk_size);
        let mut pacer = Pacer::new(self.config.batch_size, self.config.batch_pause());
        let mut join_set: JoinSet<Result<AttemptReport, ProgressStoreError>> = JoinSet::new();

        let mut cancelled = false;
        let mut fatal: Option<ProgressStoreError> = None;
        let mut fetched = 0usize;
        let mut attempts = 0usize;

        loop {
            let stopping = cancelled || fatal.is_some();
            if !stopping {
                queue.admit(join_set.len());
                let now = Instant::now();
                while join_set.len() < max_workers && !pacer.blocked(now) {
                    let Some(task) = queue.next_ready(now) else {
                        break;
                    };
                    tracing::debug!(task_id = %task.id, attempt = task.attempts + 1, "dispatch");
                    pacer.dispatched(now);
                    attempts += 1;
                    join_set.spawn(run_attempt(Arc::clone(&ctx), task));
                }
            }

            if join_set.is_empty() && (stopping || queue.is_empty()) {
                break;
            }

            let wake = if stopping || join_set.len() >= max_workers {
                None
            } else {
                let now = Instant::now();
                let next_work = if queue.has_ready(now) {
                    Some(now)
                } else {
                    queue.earliest_delayed()
                };
                next_work.map(|t| pacer.until().map_or(t, |p| t.max(p)))
            };

            tokio::select! {
                joined = join_set.join_next(), if !join_set.is_empty() => {
                    let Some(joined) = joined else { continue };
                    match joined.context("attempt task panicked")? {
                        Ok(report) => match report.outcome {
                            Outcome::Stored(_) => fetched += 1,
                            Outcome::Requeue(delay) if !stopping => queue.requeue(report.task, delay),
                            _ => {}
                        },
                        Err(e) => {
                            if fatal.is_none() {
                                tracing::error!("halting batch {}: {}", batch.id, e);
                                fatal = Some(e);
                            }
                        }
                    }
                }
                _ = sleep_until_opt(wake), if wake.is_some() => {}
                _ = cancel.cancelled(), if !cancelled => {
                    tracing::info!(batch = %batch.id, in_flight = join_set.len(), "stop requested; finishing in-flight tasks");
                    cancelled = true;
                }
                else => break,
            }
        }

        if let Some(e) = fatal {
            return Err(anyhow::Error::new(e));
        }

        let mut result = self
            .summarize(batch, started_at, fetched, skipped, attempts, cancelled)
            .await?;

        if self.config.dedup_after_batch && !cancelled && self.output_dir.is_dir() {
            match dedup::dedup(self.output_dir.clone()).await {
                Ok(report) => {
                    result.duplicates_removed = report.removed_count();
                    if report.removed_count() > 0 {
                        tracing::info!(
                            removed = report.removed_count(),
                            bytes = report.bytes_reclaimed,
                            "deduplicated output"
                        );
                    }
                }
                Err(e) => tracing::warn!("dedup after batch failed: {:#}", e),
            }
        }
        result.finished_at = Utc::now();

        if self.write_summary {
            write_summary(&result, &batch.summary_path())?;
        }
        tracing::info!(
            batch = %batch.id,
            succeeded = result.succeeded,
            failed = result.failed,
            permanently_failed = result.permanently_failed,
            pending = result.pending,
            cancelled,
            "batch finished"
        );
        Ok(result)
    }

    /// Counts over the whole batch from the store, plus this run's tallies.
    async fn summarize(
        &self,
        batch: &Batch,
        started_at: chrono::DateTime<Utc>,
        fetched: usize,
        skipped: usize,
        attempts: usize,
        cancelled: bool,
    ) -> Result<BatchResult> {
        let records = self
            .store
            .load_batch(&batch.id)
            .await
            .map_err(|e| ProgressStoreError::new(format!("summarizing batch {}", batch.id), &e))?;

        let mut counts = StatusCounts::default();
        let mut permanent_failures = Vec::new();
        for task in &batch.tasks {
            let rec = records.get(&task.id);
            let status = rec.map_or(TaskStatus::Pending, |r| r.status);
            counts.add(status);
            if let Some(rec) = rec.filter(|r| r.status == TaskStatus::PermanentlyFailed) {
                permanent_failures.push(failed_task(&task.id, rec));
            }
        }

        let mut result = BatchResult {
            batch_id: batch.id.clone(),
            total: 0,
            succeeded: 0,
            failed: 0,
            permanently_failed: 0,
            pending: 0,
            fetched,
            skipped,
            attempts,
            cancelled,
            duplicates_removed: 0,
            permanent_failures,
            started_at,
            finished_at: Utc::now(),
        };
        result.apply_counts(counts);
        Ok(result)
    }
}

fn failed_task(id: &TaskId, rec: &ProgressRecord) -> FailedTask {
    FailedTask {
        task_id: id.clone(),
        url: rec.url.clone(),
        attempts: rec.attempts,
        last_error: rec.last_error,
    }
}

async fn sleep_until_opt(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
