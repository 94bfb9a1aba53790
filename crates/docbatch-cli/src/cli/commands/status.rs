//! `docbatch status` – show recorded progress for batch files.

use anyhow::Result;
use docbatch_core::batch_source::batch_id_for;
use docbatch_core::progress::ProgressStore;
use docbatch_core::task::{Batch, TaskStatus};
use docbatch_core::verify;
use std::path::{Path, PathBuf};

pub async fn run_status(batches: &[PathBuf]) -> Result<()> {
    for path in batches {
        print_status(path).await?;
    }
    Ok(())
}

async fn print_status(path: &Path) -> Result<()> {
    let batch_id = batch_id_for(path);
    // Only the file location matters here; the batch file itself is not read.
    let db = Batch::new(batch_id.clone(), path, Vec::new()).progress_path();
    if !db.exists() {
        println!("{}: no progress recorded", batch_id);
        return Ok(());
    }

    let store = ProgressStore::open_at(&db).await?;
    let counts = store.counts(&batch_id).await?;
    println!(
        "{}: {} total, {} succeeded, {} failed, {} permanently failed, {} pending",
        batch_id,
        counts.total(),
        counts.succeeded,
        counts.failed,
        counts.permanently_failed,
        counts.pending
    );

    for status in [TaskStatus::Failed, TaskStatus::PermanentlyFailed] {
        let records = store.list_with_status(&batch_id, status).await?;
        for r in records {
            println!(
                "  {:<18} {:<20} {:>2} {}",
                status.as_str(),
                r.last_error.map(|k| k.as_str()).unwrap_or("-"),
                r.attempts,
                r.url
            );
        }
    }

    let missing = verify::missing_outputs(&store, &batch_id).await?;
    for r in &missing {
        let file = r
            .output_path
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_default();
        println!("  {:<18} {} {}", "missing", file, r.url);
    }
    if !missing.is_empty() {
        println!(
            "  {} downloaded file(s) missing; `docbatch run --missing {}` fetches them again",
            missing.len(),
            path.display()
        );
    }
    store.close().await;
    Ok(())
}
