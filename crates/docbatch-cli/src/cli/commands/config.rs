//! `docbatch config` – show or change persisted settings.

use anyhow::Result;
use docbatch_core::config::{self, BatchConfig};
use std::path::Path;

use crate::cli::ConfigAction;

pub fn run_config(mut cfg: BatchConfig, path: &Path, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            println!("# {}", path.display());
            print!("{}", toml::to_string_pretty(&cfg)?);
            return Ok(());
        }
        ConfigAction::Set { key, value } => cfg.set_key(&key, &value)?,
        ConfigAction::Reset => cfg.reset_to_default(),
        ConfigAction::Auto => cfg.auto_configure(),
    }
    config::save_to(&cfg, path)?;
    println!(
        "Saved {} (workers {}, sessions {}, batch size {}, chunk size {})",
        path.display(),
        cfg.max_workers,
        cfg.max_concurrent_sessions,
        cfg.batch_size,
        cfg.chunk_size
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_persists_clamped_value() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let action = ConfigAction::Set {
            key: "max_workers".into(),
            value: "40".into(),
        };
        run_config(BatchConfig::default(), &path, action).unwrap();
        let saved = config::load_or_init_at(&path).unwrap();
        assert_eq!(saved.max_workers, 16);
    }

    #[test]
    fn unknown_key_is_an_error_and_nothing_is_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let action = ConfigAction::Set {
            key: "colour".into(),
            value: "blue".into(),
        };
        assert!(run_config(BatchConfig::default(), &path, action).is_err());
        assert!(!path.exists());
    }
}
