use std::num::NonZeroUsize;
use std::time::Duration;
use std::{env, fs, path, thread};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Floor enforced on configured probe intervals; the scheduler itself
/// never clamps, it trusts registration to have validated.
pub const MIN_INTERVAL_SECONDS: u64 = 5;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed reading config file: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed writing config file: {0}")]
    Write(#[source] std::io::Error),
    #[error("failed parsing config file: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed serializing config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("no config path available; set XDG_CONFIG_HOME or HOME")]
    PathUnavailable,
    #[error("invalid target {url:?}: {reason}")]
    InvalidTarget { url: String, reason: String },
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub monitoring: Monitoring,
    /// Targets registered into the store at startup.
    pub targets: Vec<Target>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Monitoring {
    /// Size of the probe worker pool.
    pub workers: usize,
    /// Per-probe HTTP timeout, shared pool-wide.
    pub request_timeout_seconds: u64,
}

impl Default for Monitoring {
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism().map(NonZeroUsize::get).unwrap_or(4),
            request_timeout_seconds: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub url: String,
    pub interval_seconds: u64,
    /// Daily failure count at which alerts fire.
    pub threshold: u32,
}

impl Target {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_seconds)
    }
}

/// Used to ensure we are actually reading a toml file
fn normalize_toml_path(path: &path::Path) -> path::PathBuf {
    let mut path = path.to_path_buf();
    if path.extension().map(|ext| ext != "toml").unwrap_or(true) {
        path.set_extension("toml");
    }
    path
}

/// Default config path ($XDG_CONFIG_HOME/httpmon/config.toml or
/// $HOME/.config/...)
fn default_config_path() -> Result<path::PathBuf, ConfigError> {
    let path = if let Ok(config_home) = env::var("XDG_CONFIG_HOME") {
        path::PathBuf::from(config_home)
    } else if let Some(home_dir) = env::home_dir() {
        home_dir.join(".config")
    } else {
        return Err(ConfigError::PathUnavailable);
    };

    Ok(path.join("httpmon/config.toml"))
}

impl Config {
    /// Loads the config from `optional_path`, or from the default
    /// location. A missing file is not an error: defaults are written
    /// there and returned.
    pub fn from_config(optional_path: Option<impl AsRef<path::Path>>) -> Result<Self, ConfigError> {
        let config_path: path::PathBuf = if let Some(path) = optional_path {
            normalize_toml_path(path.as_ref())
        } else {
            default_config_path()?
        };

        let config = if config_path.exists() {
            let raw = fs::read_to_string(&config_path).map_err(ConfigError::Read)?;
            toml::from_str(raw.as_str())?
        } else {
            let config = Self::default();
            config.write_config(&config_path)?;
            config
        };

        config.validate()?;
        Ok(config)
    }

    /// Serialize and write a config to a file
    pub fn write_config(&self, path: &path::Path) -> Result<(), ConfigError> {
        let config_str = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(ConfigError::Write)?;
        }

        fs::write(path, config_str).map_err(ConfigError::Write)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.monitoring.request_timeout_seconds)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        for target in &self.targets {
            url::Url::parse(&target.url).map_err(|error| ConfigError::InvalidTarget {
                url: target.url.clone(),
                reason: error.to_string(),
            })?;
            if target.interval_seconds < MIN_INTERVAL_SECONDS {
                return Err(ConfigError::InvalidTarget {
                    url: target.url.clone(),
                    reason: format!("interval must be at least {MIN_INTERVAL_SECONDS} seconds"),
                });
            }
            if target.threshold == 0 {
                return Err(ConfigError::InvalidTarget {
                    url: target.url.clone(),
                    reason: "threshold must be positive".to_string(),
                });
            }
        }
        Ok(())
    }
}
