pub mod config;
pub mod logging;

pub mod batch_source;
pub mod checksum;
pub mod dedup;
pub mod fetcher;
pub mod progress;
pub mod retry;
pub mod scheduler;
pub mod session;
pub mod storage;
pub mod task;
pub mod verify;
