//! Task and batch model.
//!
//! A task is one URL-to-file download unit; its id is derived from the
//! normalized URL so the same URL maps to the same task across runs.

mod id;
mod model;

pub use id::{normalize_url, url_digest, TaskId};
pub use model::{Batch, BatchId, Task, TaskStatus};
