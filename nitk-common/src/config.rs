//! Bootstrap configuration for NITK services
//!
//! Configuration is bootstrap-only: values are read once at startup and the
//! service must restart to pick up changes.
//!
//! # Sources Priority
//!
//! 1. Command-line arguments (applied by the binary on top of the loaded file)
//! 2. Environment variable `NITK_CONFIG` pointing at a TOML file
//! 3. TOML file in the platform config directory (`~/.config/nitk/nitk-ingest.toml`)
//! 4. Built-in defaults (code constants)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "NITK_CONFIG";

/// Bootstrap configuration loaded from TOML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Directory watched for new recordings
    #[serde(default = "default_watch_directory")]
    pub watch_directory: PathBuf,

    /// SQLite database file
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// HTTP bind address
    #[serde(default = "default_host")]
    pub host: String,

    /// HTTP server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Sample rate used when a TDMS channel carries no rate property
    #[serde(default = "default_sample_rate")]
    pub default_sample_rate: u32,

    /// Fixed delay between detecting a file and first reading it
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,

    /// Upper bound on size-stability checks after the settle delay
    #[serde(default = "default_settle_max_checks")]
    pub settle_max_checks: u32,

    /// Directory polling period
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Capacity of the watcher → worker channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Results older than this many days are swept (0 disables the sweep)
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,

    /// Period of the retention sweep
    #[serde(default = "default_retention_sweep_interval_secs")]
    pub retention_sweep_interval_secs: u64,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log file path (optional, logs to stderr only if not specified)
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: None,
        }
    }
}

fn default_watch_directory() -> PathBuf {
    PathBuf::from("./audio_files")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("./Database/noise_info.db")
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_sample_rate() -> u32 {
    44_100
}

fn default_settle_delay_ms() -> u64 {
    100
}

fn default_settle_max_checks() -> u32 {
    10
}

fn default_poll_interval_ms() -> u64 {
    250
}

fn default_event_channel_capacity() -> usize {
    64
}

fn default_retention_days() -> u32 {
    30
}

fn default_retention_sweep_interval_secs() -> u64 {
    24 * 60 * 60
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TomlConfig {
    fn default() -> Self {
        Self {
            watch_directory: default_watch_directory(),
            database_path: default_database_path(),
            host: default_host(),
            port: default_port(),
            default_sample_rate: default_sample_rate(),
            settle_delay_ms: default_settle_delay_ms(),
            settle_max_checks: default_settle_max_checks(),
            poll_interval_ms: default_poll_interval_ms(),
            event_channel_capacity: default_event_channel_capacity(),
            retention_days: default_retention_days(),
            retention_sweep_interval_secs: default_retention_sweep_interval_secs(),
            logging: LoggingConfig::default(),
        }
    }
}

impl TomlConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str, origin: &Path) -> Result<Self> {
        let config: TomlConfig = toml::from_str(content).map_err(|source| Error::Toml {
            path: origin.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read config {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content, path)
    }

    /// Resolve and load configuration
    ///
    /// An explicitly requested file must exist. Without one, the
    /// environment and platform locations are tried before falling back to
    /// built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            info!("Loading configuration from {}", path.display());
            return Self::from_file(path);
        }

        match resolve_config_file() {
            Some(path) => {
                info!("Loading configuration from {}", path.display());
                Self::from_file(&path)
            }
            None => {
                debug!("No configuration file found, using built-in defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.default_sample_rate == 0 {
            return Err(Error::Config(
                "default_sample_rate must be greater than zero".to_string(),
            ));
        }
        if self.poll_interval_ms == 0 {
            return Err(Error::Config(
                "poll_interval_ms must be greater than zero".to_string(),
            ));
        }
        if self.event_channel_capacity == 0 {
            return Err(Error::Config(
                "event_channel_capacity must be greater than zero".to_string(),
            ));
        }
        if self.retention_sweep_interval_secs == 0 {
            return Err(Error::Config(
                "retention_sweep_interval_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn retention_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.retention_sweep_interval_secs)
    }
}

/// Locate a config file: `NITK_CONFIG` first, then the platform config dir
fn resolve_config_file() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let path = PathBuf::from(path);
        if path.exists() {
            return Some(path);
        }
    }

    dirs::config_dir()
        .map(|d| d.join("nitk").join("nitk-ingest.toml"))
        .filter(|p| p.exists())
}
