//! `docbatch fetch` – download a single document outside any batch.

use anyhow::Result;
use chrono::Utc;
use docbatch_core::config::BatchConfig;
use docbatch_core::fetcher::Fetcher;
use docbatch_core::session::CurlSession;
use docbatch_core::storage;
use docbatch_core::task::Task;
use std::path::PathBuf;
use std::sync::Arc;

pub async fn run_fetch(
    cfg: &BatchConfig,
    url: &str,
    category: &str,
    output: Option<PathBuf>,
) -> Result<()> {
    let dir = output.unwrap_or_else(|| cfg.output_dir.clone());
    let task = Task::new(url, category, Utc::now().date_naive());
    let fetcher = Fetcher::new(Arc::new(CurlSession::from_config(cfg)));

    let doc = fetcher.fetch(&task).await?;
    let file = storage::store(&dir, &task, &doc).await?;
    println!(
        "Saved {} ({} bytes, {})",
        file.path.display(),
        file.size_bytes,
        file.format.extension()
    );
    Ok(())
}
