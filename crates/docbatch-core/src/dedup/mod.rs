//! Content-based deduplication of the output directory.
//!
//! Files are grouped by size, then by SHA-256; each group of identical files
//! keeps one canonical copy. Names play no part in deciding what is a
//! duplicate, only in choosing which copy to keep.

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::checksum::sha256_path;
use crate::fetcher::DocumentFormat;
use crate::storage::STAGING_SUFFIX;


/// Outcome of one dedup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DedupReport {
    /// Files examined.
    pub scanned: usize,
    pub removed: Vec<PathBuf>,
    pub bytes_reclaimed: u64,
}

impl DedupReport {
    pub fn removed_count(&self) -> usize {
        self.removed.len()
    }
}

/// Lower rank = preferred canonical copy. Editable originals beat renderings.
fn format_rank(path: &Path) -> u8 {
    let format = path
        .extension()
        .and_then(|e| e.to_str())
        .and_then(DocumentFormat::from_extension);
    match format {
        Some(DocumentFormat::Docx) => 0,
        Some(DocumentFormat::Doc) => 1,
        Some(DocumentFormat::Rtf) => 2,
        Some(DocumentFormat::Pdf) => 3,
        Some(DocumentFormat::Zip) => 4,
        None => 5,
    }
}

fn is_ignored(name: &str) -> bool {
    name.starts_with('.') || name.ends_with(STAGING_SUFFIX)
}

pub(crate) fn collect_files(dir: &Path, out: &mut Vec<(PathBuf, u64)>) -> Result<()> {
    let entries = std::fs::read_dir(dir).with_context(|| format!("read dir {}", dir.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("read dir {}", dir.display()))?;
        let name = entry.file_name();
        if is_ignored(&name.to_string_lossy()) {
            continue;
        }
        let path = entry.path();
        let file_type = entry
            .file_type()
            .with_context(|| format!("stat {}", path.display()))?;
        if file_type.is_dir() {
            collect_files(&path, out)?;
        } else if file_type.is_file() {
            let len = entry
                .metadata()
                .with_context(|| format!("stat {}", path.display()))?
                .len();
            out.push((path, len));
        }
    }
    Ok(())
}

/// Remove byte-identical duplicates under `dir`, keeping one canonical copy
/// per group (DOCX > DOC > RTF > PDF > ZIP > other, then smallest path).
/// Files that cannot be hashed or deleted are logged and skipped.
pub fn dedup_dir(dir: &Path) -> Result<DedupReport> {
    let mut files = Vec::new();
    collect_files(dir, &mut files)?;
    let mut report = DedupReport {
        scanned: files.len(),
        ..DedupReport::default()
    };

    let mut by_size: HashMap<u64, Vec<PathBuf>> = HashMap::new();
    for (path, len) in files {
        by_size.entry(len).or_default().push(path);
    }

    for (len, paths) in by_size {
        if paths.len() < 2 {
            continue;
        }
        let mut by_hash: HashMap<String, Vec<PathBuf>> = HashMap::new();
        for path in paths {
            match sha256_path(&path) {
                Ok(hash) => by_hash.entry(hash).or_default().push(path),
                Err(e) => tracing::warn!(path = %path.display(), "skipping unhashable file: {:#}", e),
            }
        }

        for (hash, mut group) in by_hash {
            if group.len() < 2 {
                continue;
            }
            group.sort_by(|a, b| format_rank(a).cmp(&format_rank(b)).then_with(|| a.cmp(b)));
            let keep = &group[0];
            for dup in &group[1..] {
                match std::fs::remove_file(dup) {
                    Ok(()) => {
                        tracing::info!(
                            removed = %dup.display(),
                            kept = %keep.display(),
                            hash = %hash,
                            "removed duplicate"
                        );
                        report.removed.push(dup.clone());
                        report.bytes_reclaimed += len;
                    }
                    Err(e) => {
                        tracing::warn!(path = %dup.display(), error = %e, "could not remove duplicate")
                    }
                }
            }
        }
    }

    report.removed.sort();
    Ok(report)
}

/// `dedup_dir` on the blocking pool.
pub async fn dedup(dir: PathBuf) -> Result<DedupReport> {
    tokio::task::spawn_blocking(move || dedup_dir(&dir))
        .await
        .context("dedup task failed")?
}
