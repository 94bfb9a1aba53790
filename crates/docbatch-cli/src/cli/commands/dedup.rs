//! `docbatch dedup` – remove duplicate documents from an output directory.

use anyhow::{bail, Result};
use docbatch_core::dedup;
use std::path::PathBuf;

pub async fn run_dedup(dir: PathBuf) -> Result<()> {
    if !dir.is_dir() {
        bail!("{} is not a directory", dir.display());
    }
    let report = dedup::dedup(dir.clone()).await?;
    for path in &report.removed {
        println!("removed {}", path.display());
    }
    println!(
        "Scanned {} file(s) in {}, removed {} duplicate(s), reclaimed {} bytes",
        report.scanned,
        dir.display(),
        report.removed_count(),
        report.bytes_reclaimed
    );
    Ok(())
}
