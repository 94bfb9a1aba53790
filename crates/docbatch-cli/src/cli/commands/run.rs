//! `docbatch run` – download one or more batches with resume.

use anyhow::{Context, Result};
use docbatch_core::batch_source::{BatchSource, CsvBatchSource};
use docbatch_core::config::BatchConfig;
use docbatch_core::progress::ProgressStore;
use docbatch_core::scheduler::{BatchResult, RunMode, Scheduler};
use docbatch_core::session::CurlSession;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Flags of `docbatch run` that override the persisted config.
#[derive(Debug, Default)]
pub struct RunOptions {
    pub no_resume: bool,
    pub retry_failed: bool,
    pub missing: bool,
    pub output: Option<PathBuf>,
    pub workers: Option<usize>,
    pub no_dedup: bool,
}

impl RunOptions {
    fn mode(&self) -> RunMode {
        if self.no_resume {
            RunMode::Fresh
        } else if self.retry_failed {
            RunMode::RetryFailed
        } else if self.missing {
            RunMode::Missing
        } else {
            RunMode::Resume
        }
    }

    fn apply(&self, cfg: &BatchConfig) -> BatchConfig {
        let mut cfg = cfg.clone();
        if let Some(dir) = &self.output {
            cfg.output_dir = dir.clone();
        }
        if let Some(n) = self.workers {
            cfg.max_workers = n;
        }
        if self.no_dedup {
            cfg.dedup_after_batch = false;
        }
        cfg
    }
}

pub async fn run_batches(cfg: &BatchConfig, batches: &[PathBuf], opts: RunOptions) -> Result<()> {
    let cfg = opts.apply(cfg);
    let mode = opts.mode();

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("Interrupted; letting in-flight downloads finish...");
                cancel.cancel();
            }
        });
    }

    for path in batches {
        let result = run_one(&cfg, path, mode, cancel.clone()).await?;
        print_result(&result);
        if result.cancelled {
            println!("Stopped. Run the same command again to resume.");
            break;
        }
    }
    Ok(())
}

async fn run_one(
    cfg: &BatchConfig,
    path: &Path,
    mode: RunMode,
    cancel: CancellationToken,
) -> Result<BatchResult> {
    let load = CsvBatchSource::new(path).load()?;
    for row in &load.rejected {
        eprintln!("{}:{}: skipped row: {}", path.display(), row.line, row.reason);
    }
    let batch = load.batch;
    println!(
        "Batch {}: {} task(s) -> {}",
        batch.id,
        batch.tasks.len(),
        cfg.output_dir.display()
    );

    let store = ProgressStore::open_at(batch.progress_path())
        .await
        .with_context(|| format!("open progress store for {}", path.display()))?;
    let session = Arc::new(CurlSession::from_config(cfg));
    let scheduler = Scheduler::new(cfg, store.clone(), session)?;
    let result = scheduler.run(&batch, mode, cancel).await;
    store.close().await;
    result
}

fn print_result(r: &BatchResult) {
    println!(
        "{}: {} succeeded, {} failed, {} permanently failed, {} pending ({} skipped, {} attempts)",
        r.batch_id, r.succeeded, r.failed, r.permanently_failed, r.pending, r.skipped, r.attempts
    );
    if r.duplicates_removed > 0 {
        println!("  removed {} duplicate file(s)", r.duplicates_removed);
    }
    for f in &r.permanent_failures {
        let kind = f.last_error.map(|k| k.as_str()).unwrap_or("-");
        println!("  FAILED {:<20} {}", kind, f.url);
    }
}
