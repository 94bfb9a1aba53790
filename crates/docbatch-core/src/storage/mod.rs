//! Naming and atomic storage of downloaded documents.
//!
//! Documents are written to a hidden staging file in the output directory,
//! fsynced, then renamed over the final path, so a crash never leaves a
//! truncated file under a final name.

mod naming;
mod writer;

pub use naming::{file_name_for, sanitize_component, NAME_MAX};
pub use writer::{staging_path, store, DownloadedFile, StorageError};

/// Suffix of in-flight staging files (`.{task_id}.part`).
pub const STAGING_SUFFIX: &str = ".part";
