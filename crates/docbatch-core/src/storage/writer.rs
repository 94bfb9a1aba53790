//! Staged, fsynced, renamed document writes.

use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use super::naming::file_name_for;
use super::STAGING_SUFFIX;
use crate::checksum::sha256_bytes;
use crate::fetcher::{DocumentFormat, FetchedDocument};
use crate::task::{Task, TaskId};

/// A document that landed at its final path.
#[derive(Debug, Clone, PartialEq)]
pub struct DownloadedFile {
    pub task_id: TaskId,
    pub path: PathBuf,
    pub size_bytes: u64,
    /// Lowercase hex SHA-256 of the file contents.
    pub content_hash: String,
    pub format: DocumentFormat,
}

/// Writing a document to the output directory failed. Fatal to the task only.
#[derive(Debug, thiserror::Error)]
#[error("{op} {}: {source}", .path.display())]
pub struct StorageError {
    pub op: &'static str,
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl StorageError {
    fn new(op: &'static str, path: &Path, source: std::io::Error) -> Self {
        Self {
            op,
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Hidden staging path for a task inside `dir`.
pub fn staging_path(dir: &Path, task_id: &TaskId) -> PathBuf {
    dir.join(format!(".{}{}", task_id, STAGING_SUFFIX))
}

/// Write `doc` for `task` into `dir` under its final name. An existing file at
/// the final path is replaced.
pub async fn store(
    dir: &Path,
    task: &Task,
    doc: &FetchedDocument,
) -> Result<DownloadedFile, StorageError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| StorageError::new("create dir", dir, e))?;

    let final_path = dir.join(file_name_for(task, doc.format));
    let staging = staging_path(dir, &task.id);

    if let Err(e) = write_staged(&staging, &final_path, &doc.bytes).await {
        let _ = tokio::fs::remove_file(&staging).await;
        return Err(e);
    }

    Ok(DownloadedFile {
        task_id: task.id.clone(),
        path: final_path,
        size_bytes: doc.bytes.len() as u64,
        content_hash: sha256_bytes(&doc.bytes),
        format: doc.format,
    })
}

async fn write_staged(staging: &Path, final_path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let mut file = tokio::fs::File::create(staging)
        .await
        .map_err(|e| StorageError::new("create", staging, e))?;
    file.write_all(bytes)
        .await
        .map_err(|e| StorageError::new("write", staging, e))?;
    file.sync_all()
        .await
        .map_err(|e| StorageError::new("sync", staging, e))?;
    drop(file);
    tokio::fs::rename(staging, final_path)
        .await
        .map_err(|e| StorageError::new("rename", final_path, e))
}
