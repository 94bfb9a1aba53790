//! Batch configuration: one value object threaded through the scheduler and
//! retry policy, persisted as TOML under the XDG config dir.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Authenticated-session settings for the bundled cookie-file session
/// (optional section in config.toml).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Netscape-format cookie file written by the external login flow.
    /// `None` = `$XDG_STATE_HOME/docbatch/cookies.txt`.
    #[serde(default)]
    pub cookie_file: Option<PathBuf>,
    /// Substrings of a redirect target that mean "sent back to the login page".
    pub login_markers: Vec<String>,
    pub user_agent: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            cookie_file: None,
            login_markers: vec!["dang-nhap".to_string(), "/login".to_string()],
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0 Safari/537.36"
                .to_string(),
        }
    }
}

/// Errors from `BatchConfig::validated` and `BatchConfig::set_key`.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be at least 1")]
    Zero(&'static str),
    #[error("unknown setting: {0}")]
    UnknownKey(String),
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },
}

/// Global configuration loaded from `~/.config/docbatch/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of batch tasks admitted to the ready queue at a time.
    pub chunk_size: usize,
    /// Maximum number of concurrent task workers.
    pub max_workers: usize,
    /// Dispatches between pacing pauses (see `batch_pause_ms`).
    pub batch_size: usize,
    /// Maximum concurrent fetches through the session (clamped to `max_workers`).
    pub max_concurrent_sessions: usize,
    /// When false, every failure is recorded as Failed with no requeue.
    pub retry_enabled: bool,
    /// Attempt ceiling per task (including the first attempt).
    pub max_retries: u32,
    /// Base delay in seconds for exponential backoff.
    pub base_backoff_secs: f64,
    /// Maximum backoff delay in seconds.
    pub max_backoff_secs: u64,
    pub fetch_timeout_secs: u64,
    pub connect_timeout_secs: u64,
    /// Pause between dispatch groups of `batch_size` tasks (0 disables).
    pub batch_pause_ms: u64,
    /// Run the deduplicator after a batch completes.
    pub dedup_after_batch: bool,
    pub output_dir: PathBuf,
    #[serde(default)]
    pub session: Option<SessionConfig>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 50,
            max_workers: 4,
            batch_size: 5,
            max_concurrent_sessions: 3,
            retry_enabled: true,
            max_retries: 3,
            base_backoff_secs: 2.0,
            max_backoff_secs: 60,
            fetch_timeout_secs: 30,
            connect_timeout_secs: 5,
            batch_pause_ms: 200,
            dedup_after_batch: true,
            output_dir: PathBuf::from("downloads"),
            session: None,
        }
    }
}

impl BatchConfig {
    /// Never exceeds `max_backoff`, even for values `validated()` would reject.
    pub fn base_backoff(&self) -> Duration {
        Duration::try_from_secs_f64(self.base_backoff_secs.max(0.0))
            .map_or(self.max_backoff(), |d| d.min(self.max_backoff()))
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }

    /// Session settings, falling back to defaults when the section is absent.
    pub fn session_or_default(&self) -> SessionConfig {
        self.session.clone().unwrap_or_default()
    }

    /// Effective configuration for a run: rejects zero counts and clamps
    /// `max_concurrent_sessions` to `max_workers`.
    pub fn validated(&self) -> Result<Self, ConfigError> {
        if self.max_workers == 0 {
            return Err(ConfigError::Zero("max_workers"));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Zero("max_retries"));
        }
        if self.max_concurrent_sessions == 0 {
            return Err(ConfigError::Zero("max_concurrent_sessions"));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Zero("chunk_size"));
        }
        if self.batch_size == 0 {
            return Err(ConfigError::Zero("batch_size"));
        }
        if !valid_base_backoff(self.base_backoff_secs, self.max_backoff_secs) {
            return Err(ConfigError::InvalidValue {
                key: "base_backoff_secs".to_string(),
                value: self.base_backoff_secs.to_string(),
            });
        }
        let mut cfg = self.clone();
        cfg.max_concurrent_sessions = cfg.max_concurrent_sessions.min(cfg.max_workers);
        Ok(cfg)
    }

    /// Derive worker and session counts from the available CPU cores:
    /// 75% of cores clamped to [2, 8] workers, at most 3 sessions.
    pub fn auto_configure(&mut self) {
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(2);
        self.max_workers = optimal_workers(cores);
        self.max_concurrent_sessions = self.max_workers.min(3);
        tracing::info!(
            cores,
            max_workers = self.max_workers,
            max_concurrent_sessions = self.max_concurrent_sessions,
            "auto-configured worker counts"
        );
    }

    pub fn reset_to_default(&mut self) {
        *self = BatchConfig::default();
    }

    /// Update one setting by its TOML key. Numeric ranges follow the interactive
    /// settings menu: workers 1..=16, batch size 1..=100, chunk size 10..=500.
    pub fn set_key(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        match key {
            "chunk_size" => self.chunk_size = parse_usize(value).ok_or_else(invalid)?.clamp(10, 500),
            "max_workers" => self.max_workers = parse_usize(value).ok_or_else(invalid)?.clamp(1, 16),
            "batch_size" => self.batch_size = parse_usize(value).ok_or_else(invalid)?.clamp(1, 100),
            "max_concurrent_sessions" => {
                self.max_concurrent_sessions = parse_usize(value).ok_or_else(invalid)?.max(1)
            }
            "retry_enabled" => self.retry_enabled = parse_bool(value).ok_or_else(invalid)?,
            "max_retries" => {
                self.max_retries = value.trim().parse::<u32>().map_err(|_| invalid())?.max(1)
            }
            "base_backoff_secs" => {
                let v: f64 = value.trim().parse().map_err(|_| invalid())?;
                if !valid_base_backoff(v, self.max_backoff_secs) {
                    return Err(invalid());
                }
                self.base_backoff_secs = v;
            }
            "max_backoff_secs" => self.max_backoff_secs = value.trim().parse().map_err(|_| invalid())?,
            "fetch_timeout_secs" => {
                self.fetch_timeout_secs = value.trim().parse().map_err(|_| invalid())?
            }
            "connect_timeout_secs" => {
                self.connect_timeout_secs = value.trim().parse().map_err(|_| invalid())?
            }
            "batch_pause_ms" => self.batch_pause_ms = value.trim().parse().map_err(|_| invalid())?,
            "dedup_after_batch" => self.dedup_after_batch = parse_bool(value).ok_or_else(invalid)?,
            "output_dir" => {
                if value.trim().is_empty() {
                    return Err(invalid());
                }
                self.output_dir = PathBuf::from(value.trim());
            }
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }
}

/// Finite, non-negative and no larger than the backoff cap.
fn valid_base_backoff(secs: f64, max_backoff_secs: u64) -> bool {
    secs.is_finite() && secs >= 0.0 && secs <= max_backoff_secs as f64
}

fn optimal_workers(cores: usize) -> usize {
    (cores * 3 / 4).clamp(2, 8)
}

fn parse_usize(value: &str) -> Option<usize> {
    value.trim().parse().ok()
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "on" => Some(true),
        "false" | "no" | "n" | "0" | "off" => Some(false),
        _ => None,
    }
}

pub fn config_path() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("docbatch")?;
    Ok(xdg_dirs.place_config_file("config.toml")?)
}

/// Default cookie file location used when `[session] cookie_file` is unset.
pub fn default_cookie_file() -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("docbatch")?;
    Ok(xdg_dirs.get_state_home().join("docbatch").join("cookies.txt"))
}

/// Load configuration from disk, creating a default file if none exists.
pub fn load_or_init() -> Result<BatchConfig> {
    let path = config_path()?;
    load_or_init_at(&path)
}

/// Like `load_or_init` but at an explicit path (tests, `--config`).
pub fn load_or_init_at(path: &Path) -> Result<BatchConfig> {
    if !path.exists() {
        let default_cfg = BatchConfig::default();
        save_to(&default_cfg, path)?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: BatchConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

/// Write the configuration atomically: temp file in the same dir, then rename.
pub fn save_to(cfg: &BatchConfig, path: &Path) -> Result<()> {
    let toml = toml::to_string_pretty(cfg).context("serialize config")?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create dir: {}", parent.display()))?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, toml).with_context(|| format!("write {}", tmp.display()))?;
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(e).with_context(|| format!("replace {}", path.display()));
    }
    tracing::debug!("settings saved to {}", path.display());
    Ok(())
}
