use serde::{Deserialize, Deserializer};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::catalog::{DEFAULT_MAX_AGE, DEFAULT_SOURCES};
use crate::predict::GroundStation;
use crate::rotctld::{DEFAULT_HOST, DEFAULT_PORT, DEFAULT_TIMEOUT};

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const CONFIG_DIR_ENV: &str = "SVAROG_CONFIG_DIR";
pub const CONFIG_FILE: &str = "config.yml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("YAML parse error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("cannot locate the configuration directory, set SVAROG_CONFIG_DIR or HOME")]
    NoConfigDir,
    #[error("invalid station coordinates {0:?}, expected \"<lat>, <lon>\"")]
    InvalidStation(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Where downloaded data is kept, defaults to the configuration directory.
    pub datadir: Option<PathBuf>,
    pub logging: LoggingConfig,
    pub station: Option<StationConfig>,
    pub rotator: RotatorConfig,
    pub tle: TleConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Log file path; `stdout` or nothing logs to the terminal.
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StationConfig {
    pub name: Option<String>,
    pub coordinates: String,
    #[serde(default)]
    pub altitude_m: f64,
}

impl StationConfig {
    pub fn ground_station(&self) -> Result<GroundStation, ConfigError> {
        GroundStation::from_coordinates(&self.coordinates, Some(self.altitude_m))
            .ok_or_else(|| ConfigError::InvalidStation(self.coordinates.clone()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RotatorConfig {
    pub host: String,
    pub port: u16,
    #[serde(deserialize_with = "deserialize_duration")]
    pub timeout: Duration,
    #[serde(deserialize_with = "deserialize_duration")]
    pub poll_interval: Duration,
}

impl Default for RotatorConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            timeout: DEFAULT_TIMEOUT,
            poll_interval: Duration::from_secs(1),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TleConfig {
    pub sources: Vec<String>,
    #[serde(deserialize_with = "deserialize_duration")]
    pub max_age: Duration,
}

impl Default for TleConfig {
    fn default() -> Self {
        Self {
            sources: DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
            max_age: DEFAULT_MAX_AGE,
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    humantime::parse_duration(&s).map_err(serde::de::Error::custom)
}

/// `$SVAROG_CONFIG_DIR`, or `~/.config/svarog-ctl`.
pub fn config_dir() -> Result<PathBuf, ConfigError> {
    if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV).filter(|d| !d.is_empty()) {
        return Ok(PathBuf::from(dir));
    }
    std::env::var_os("HOME")
        .filter(|h| !h.is_empty())
        .map(|home| PathBuf::from(home).join(".config").join(APP_NAME))
        .ok_or(ConfigError::NoConfigDir)
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&content, path)
    }

    fn from_yaml(content: &str, path: &Path) -> Result<Self, ConfigError> {
        // An empty file deserializes to unit, not to an empty mapping.
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Reads `config.yml` from `dir`; a missing file means all defaults.
    pub fn load_from_dir(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            log::debug!("No configuration at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        Self::from_file(&path)
    }

    pub fn tle_cache_dir(&self, config_dir: &Path) -> PathBuf {
        self.datadir
            .as_deref()
            .map(|d| expand_home(&d.to_string_lossy()))
            .unwrap_or_else(|| config_dir.to_path_buf())
            .join("tle")
    }

    pub fn log_file(&self) -> Option<PathBuf> {
        self.logging
            .file
            .as_deref()
            .filter(|f| !f.is_empty() && *f != "stdout")
            .map(expand_home)
    }
}
