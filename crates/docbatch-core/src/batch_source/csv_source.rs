//! CSV batch source.

use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::io;
use std::path::{Path, PathBuf};

use super::{batch_id_for, BatchLoad, BatchSource, RejectedRow};
use crate::task::{Batch, Task};

const UNKNOWN_CATEGORY: &str = "unknown";
const DATE_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y", "%Y-%m-%d", "%d.%m.%Y"];

#[derive(Debug, Deserialize)]
struct Row {
    #[serde(rename = "Url", alias = "URL", alias = "url", default)]
    url: Option<String>,
    #[serde(rename = "Category", alias = "Lĩnh vực", alias = "category", default)]
    category: Option<String>,
    #[serde(rename = "IssueDate", alias = "Ban hành", alias = "issue_date", default)]
    issue_date: Option<String>,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    DATE_FORMATS
        .iter()
        .find_map(|f| NaiveDate::parse_from_str(s, f).ok())
}

/// Read a CSV batch from `reader`. Rows without a URL are rejected; a missing
/// category becomes `unknown`; a missing or unparseable date becomes
/// `load_date`.
pub fn read_csv<R: io::Read>(
    reader: R,
    file_path: &Path,
    load_date: NaiveDate,
) -> Result<BatchLoad> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    // Spreadsheet exports often start with a UTF-8 BOM.
    let headers: csv::StringRecord = rdr
        .headers()
        .context("read CSV header")?
        .iter()
        .map(|h| h.trim_start_matches('\u{feff}').trim())
        .collect();

    let mut tasks = Vec::new();
    let mut rejected = Vec::new();
    for record in rdr.records() {
        let record = match record {
            Ok(r) => r,
            Err(e) => {
                let line = e.position().map_or(0, |p| p.line());
                rejected.push(RejectedRow {
                    line,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let line = record.position().map_or(0, |p| p.line());
        let row: Row = match record.deserialize(Some(&headers)) {
            Ok(row) => row,
            Err(e) => {
                rejected.push(RejectedRow {
                    line,
                    reason: e.to_string(),
                });
                continue;
            }
        };
        let Some(url) = non_empty(row.url) else {
            rejected.push(RejectedRow {
                line,
                reason: "missing URL".to_string(),
            });
            continue;
        };
        let category = non_empty(row.category).unwrap_or_else(|| UNKNOWN_CATEGORY.to_string());
        let issue_date = match non_empty(row.issue_date) {
            Some(raw) => parse_date(&raw).unwrap_or_else(|| {
                tracing::debug!(line, date = %raw, "unparseable issue date; using load date");
                load_date
            }),
            None => load_date,
        };
        tasks.push(Task::new(url, category, issue_date));
    }

    let rows = tasks.len();
    let batch = Batch::new(batch_id_for(file_path), file_path, tasks);
    if batch.tasks.len() < rows {
        tracing::info!(
            batch = %batch.id,
            duplicates = rows - batch.tasks.len(),
            "collapsed duplicate URLs"
        );
    }
    for r in &rejected {
        tracing::warn!(batch = %batch.id, line = r.line, "rejected row: {}", r.reason);
    }
    Ok(BatchLoad { batch, rejected })
}

/// CSV file on disk.
#[derive(Debug, Clone)]
pub struct CsvBatchSource {
    path: PathBuf,
}

impl CsvBatchSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl BatchSource for CsvBatchSource {
    fn load(&self) -> Result<BatchLoad> {
        let file = std::fs::File::open(&self.path)
            .with_context(|| format!("open batch file {}", self.path.display()))?;
        read_csv(file, &self.path, Utc::now().date_naive())
            .with_context(|| format!("read batch file {}", self.path.display()))
    }
}
