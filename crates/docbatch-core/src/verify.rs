//! Find succeeded downloads whose document is no longer on disk.
//!
//! A record only counts as missing when no surviving file has its content
//! hash: dedup may have removed it in favour of an identical copy, either one
//! owned by another task or any other file next to where it was written.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::checksum::sha256_path;
use crate::dedup::collect_files;
use crate::progress::{ProgressRecord, ProgressStore};
use crate::task::TaskStatus;

/// Blocking check over `records`; returns the `Succeeded` ones whose output is gone.
/// Records without a stored output path (written before paths were tracked) are
/// never reported.
pub fn missing_among(records: Vec<ProgressRecord>) -> Result<Vec<ProgressRecord>> {
    let (present, mut gone): (Vec<_>, Vec<_>) = records
        .into_iter()
        .filter(|r| r.status == TaskStatus::Succeeded && r.output_path.is_some())
        .partition(|r| r.output_path.as_deref().is_some_and(Path::is_file));
    if gone.is_empty() {
        return Ok(gone);
    }

    let mut surviving: HashSet<String> =
        present.iter().filter_map(|r| r.content_hash.clone()).collect();
    gone.retain(|r| !hash_in(r, &surviving));

    if gone.iter().any(|r| r.content_hash.is_some()) {
        let known: HashSet<PathBuf> = present.iter().filter_map(|r| r.output_path.clone()).collect();
        let dirs: HashSet<PathBuf> = gone
            .iter()
            .filter_map(|r| r.output_path.as_deref()?.parent().map(Path::to_path_buf))
            .filter(|d| d.is_dir())
            .collect();
        for dir in dirs {
            let mut files = Vec::new();
            collect_files(&dir, &mut files)?;
            for (path, _) in files.into_iter().filter(|(p, _)| !known.contains(p)) {
                let hash = sha256_path(&path)
                    .with_context(|| format!("hashing {}", path.display()))?;
                surviving.insert(hash);
            }
        }
        gone.retain(|r| !hash_in(r, &surviving));
    }

    gone.sort_by(|a, b| a.url.cmp(&b.url));
    Ok(gone)
}

fn hash_in(record: &ProgressRecord, hashes: &HashSet<String>) -> bool {
    record
        .content_hash
        .as_ref()
        .is_some_and(|h| hashes.contains(h))
}

/// `missing_among` on the blocking pool.
pub async fn find_missing(records: Vec<ProgressRecord>) -> Result<Vec<ProgressRecord>> {
    tokio::task::spawn_blocking(move || missing_among(records))
        .await
        .context("output check task failed")?
}

/// Succeeded tasks of `batch_id` whose document has to be fetched again.
pub async fn missing_outputs(store: &ProgressStore, batch_id: &str) -> Result<Vec<ProgressRecord>> {
    let records = store.list_with_status(batch_id, TaskStatus::Succeeded).await?;
    find_missing(records).await
}
