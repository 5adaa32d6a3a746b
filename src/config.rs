use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use directories::ProjectDirs;
use log::LevelFilter;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::sampler::SamplerOptions;

pub const CONFIG_FILE: &str = "config.json";
const LOG_FILE: &str = "dockwatch.log";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("invalid log level '{0}'")]
    InvalidLogLevel(String),

    #[error("interval_ms must be greater than zero")]
    ZeroInterval,
}

/// Settings read from `config.json` in the platform config directory.
/// Every field is optional in the file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub interval_ms: u64,
    /// Defaults to `interval_ms`, which keeps a fixed cadence on errors.
    pub max_backoff_ms: Option<u64>,
    pub fetch_timeout_ms: Option<u64>,
    pub log_file: PathBuf,
    pub log_level: String,
    /// Points kept per chart.
    pub graph_history: usize,
    pub sink_buffer: usize,
}

impl Default for Config {
    fn default() -> Self {
        let log_file = project_dirs()
            .map(|dirs| dirs.data_local_dir().join(LOG_FILE))
            .unwrap_or_else(|| std::env::temp_dir().join(LOG_FILE));
        Self {
            interval_ms: 1000,
            max_backoff_ms: None,
            fetch_timeout_ms: None,
            log_file,
            log_level: "info".to_string(),
            graph_history: 120,
            sink_buffer: 64,
        }
    }
}

impl Config {
    /// Load `path`, or the default location when `path` is `None`.
    /// A missing default file is not an error.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (path, required) = match path {
            Some(p) => (p.to_path_buf(), true),
            None => match default_path() {
                Some(p) => (p, false),
                None => return Ok(Self::default()),
            },
        };

        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Self::default())
            }
            Err(source) => return Err(ConfigError::Io { path, source }),
        };
        let config: Config =
            serde_json::from_str(&raw).map_err(|source| ConfigError::Parse { path, source })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.interval_ms == 0 {
            return Err(ConfigError::ZeroInterval);
        }
        self.level_filter()?;
        Ok(())
    }

    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(&self.log_level)
            .map_err(|_| ConfigError::InvalidLogLevel(self.log_level.clone()))
    }

    pub fn sampler_options(&self) -> SamplerOptions {
        let interval = Duration::from_millis(self.interval_ms);
        SamplerOptions::new(interval)
            .with_max_backoff(
                self.max_backoff_ms
                    .map(Duration::from_millis)
                    .unwrap_or(interval),
            )
            .with_fetch_timeout(self.fetch_timeout_ms.map(Duration::from_millis))
    }
}

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("", "", "dockwatch")
}

pub fn default_path() -> Option<PathBuf> {
    project_dirs().map(|dirs| dirs.config_dir().join(CONFIG_FILE))
}
