//! CLI command handlers, one file per command.

mod config;
mod dedup;
mod fetch;
mod run;
mod status;

pub use config::run_config;
pub use dedup::run_dedup;
pub use fetch::run_fetch;
pub use run::{run_batches, RunOptions};
pub use status::run_status;
