//! Batch sources: turn an input file into an ordered `Batch`.
//!
//! The engine only needs `{url, category, issue_date}` rows. The bundled
//! source reads CSV exported from the spreadsheets the portal hands out.

mod csv_source;

pub use csv_source::{read_csv, CsvBatchSource};

use anyhow::Result;
use std::path::Path;

use crate::task::{Batch, BatchId};

/// A row that could not become a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedRow {
    /// 1-based line number in the input file.
    pub line: u64,
    pub reason: String,
}

/// A loaded batch plus the rows that were rejected on the way.
#[derive(Debug, Clone)]
pub struct BatchLoad {
    pub batch: Batch,
    pub rejected: Vec<RejectedRow>,
}

/// Something that produces a batch.
pub trait BatchSource {
    fn load(&self) -> Result<BatchLoad>;
}

/// Batch id for an input file: its stem (`laws-2024.csv` → `laws-2024`).
pub fn batch_id_for(path: &Path) -> BatchId {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "batch".to_string())
}
