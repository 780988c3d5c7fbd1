use std::{
    num::NonZeroU32,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};

use crate::{alarm::DEFAULT_SNOOZE_MINUTES, error::ConfigError};

const APP_NAME: &str = "wakewise";
// ticks drift by their own run time, so stay well inside a minute
const MAX_POLL_INTERVAL_MS: u64 = 30_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// chrono format string used when listing alarms
    pub time_format: String,
    /// how often the scheduler looks at the clock
    pub poll_interval_ms: u64,
    /// 0 to 100
    pub volume: f32,
    pub default_snooze_minutes: NonZeroU32,
    /// disable one-shot alarms once they are dismissed
    pub retire_one_shot: bool,
    /// defaults to `alarms.json` in the data directory
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alarms_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            time_format: "%H:%M".to_string(),
            poll_interval_ms: 1000,
            volume: 100.0,
            default_snooze_minutes: DEFAULT_SNOOZE_MINUTES,
            retire_one_shot: false,
            alarms_path: None,
        }
    }
}

impl Config {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the config at `path`, falling back to defaults if there is none.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let config = match std::fs::read_to_string(path) {
            Ok(config) => config,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        let config: Self = toml::from_str(&config).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_error = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        let config = toml::to_string(self)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_error)?;
        }
        std::fs::write(path, config).map_err(io_error)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=100.0).contains(&self.volume) {
            return Err(ConfigError::Invalid(format!(
                "volume {} is outside 0-100",
                self.volume
            )));
        }
        if !(1..=MAX_POLL_INTERVAL_MS).contains(&self.poll_interval_ms) {
            return Err(ConfigError::Invalid(format!(
                "poll_interval_ms {} must be between 1 and {MAX_POLL_INTERVAL_MS}",
                self.poll_interval_ms
            )));
        }
        Ok(())
    }

    #[must_use]
    pub const fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    fn project_dirs() -> Result<directories::ProjectDirs, ConfigError> {
        directories::ProjectDirs::from("", "", APP_NAME).ok_or(ConfigError::NoProjectDirs)
    }

    pub fn config_path() -> Result<PathBuf, ConfigError> {
        let mut path = Self::project_dirs()?.config_dir().to_path_buf();
        path.push("config.toml");
        Ok(path)
    }

    pub fn data_path() -> Result<PathBuf, ConfigError> {
        Ok(Self::project_dirs()?.data_dir().to_path_buf())
    }

    pub fn alarms_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.alarms_path {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::data_path()?.join("alarms.json")),
        }
    }

    #[must_use]
    pub fn is_config_present() -> bool {
        Self::config_path().is_ok_and(|path| path.exists())
    }
}
