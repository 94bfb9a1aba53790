//! CLI for the docbatch batch document downloader.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use docbatch_core::config;
use std::path::PathBuf;

use commands::{run_batches, run_config, run_dedup, run_fetch, run_status, RunOptions};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "docbatch")]
#[command(about = "docbatch: resumable batch downloader for document portals", long_about = None)]
pub struct Cli {
    /// Debug-level logging.
    #[arg(long, global = true)]
    pub debug: bool,

    /// Config file to use instead of ~/.config/docbatch/config.toml.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download every document listed in one or more batch files (CSV).
    Run {
        /// Batch files, processed in order.
        #[arg(required = true, value_name = "BATCH")]
        batches: Vec<PathBuf>,
        /// Clear recorded progress and start each batch over.
        #[arg(long, conflicts_with = "retry_failed")]
        no_resume: bool,
        /// Only re-attempt failed and permanently failed tasks.
        #[arg(long)]
        retry_failed: bool,
        /// Only re-download succeeded tasks whose file was deleted.
        #[arg(long, conflicts_with_all = ["no_resume", "retry_failed"])]
        missing: bool,
        /// Output directory (default: `output_dir` from config).
        #[arg(long, short, value_name = "DIR")]
        output: Option<PathBuf>,
        /// Override `max_workers` for this run.
        #[arg(long, value_name = "N")]
        workers: Option<usize>,
        /// Skip the duplicate removal pass after each batch.
        #[arg(long)]
        no_dedup: bool,
    },

    /// Download a single document URL.
    Fetch {
        url: String,
        /// Category used in the file name.
        #[arg(long, default_value = "unknown")]
        category: String,
        #[arg(long, short, value_name = "DIR")]
        output: Option<PathBuf>,
    },

    /// Show recorded progress for batch files.
    Status {
        #[arg(required = true, value_name = "BATCH")]
        batches: Vec<PathBuf>,
    },

    /// Remove byte-identical duplicates from an output directory.
    Dedup {
        /// Directory to scan (default: `output_dir` from config).
        dir: Option<PathBuf>,
    },

    /// Show or change persisted settings.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the current settings.
    Show,
    /// Set one setting (values are clamped to their allowed range).
    Set { key: String, value: String },
    /// Restore default settings.
    Reset,
    /// Derive worker and session counts from the CPU count.
    Auto,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        let config_path = match &self.config {
            Some(p) => p.clone(),
            None => config::config_path()?,
        };
        let cfg = config::load_or_init_at(&config_path)?;
        tracing::debug!("loaded config: {:?}", cfg);

        match self.command {
            CliCommand::Run {
                batches,
                no_resume,
                retry_failed,
                missing,
                output,
                workers,
                no_dedup,
            } => {
                let opts = RunOptions {
                    no_resume,
                    retry_failed,
                    missing,
                    output,
                    workers,
                    no_dedup,
                };
                run_batches(&cfg, &batches, opts).await?;
            }
            CliCommand::Fetch {
                url,
                category,
                output,
            } => run_fetch(&cfg, &url, &category, output).await?,
            CliCommand::Status { batches } => run_status(&batches).await?,
            CliCommand::Dedup { dir } => {
                run_dedup(dir.unwrap_or_else(|| cfg.output_dir.clone())).await?
            }
            CliCommand::Config { action } => run_config(cfg, &config_path, action)?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
