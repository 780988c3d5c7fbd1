//! Error types for wakewise.
//!
//! The trigger engine itself never fails; these errors belong to its
//! collaborators (the store, the clock, the config) and to the loop that
//! drives them.

use std::path::PathBuf;

use thiserror::Error;

/// Problems with a single alarm record.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AlarmError {
    #[error("invalid alarm time `{0}`, expected HH:MM")]
    InvalidTime(String),

    #[error("invalid weekday {0}, expected 0 (Sunday) to 6 (Saturday)")]
    InvalidWeekday(u8),

    #[error("an alarm is already set for {0}")]
    DuplicateTime(String),
}

/// Alarm store errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("couldn't access alarm file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file exists but is not a JSON array of records.
    #[error("alarm file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("couldn't serialize alarms: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("no alarm with id {0}")]
    NotFound(String),

    /// Used by stores that can go away underneath us.
    #[error("alarm store unavailable: {0}")]
    Unavailable(String),
}

/// The clock could not produce a timestamp.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("clock source failed: {0}")]
pub struct ClockError(pub String);

/// The audio device could not be opened.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("couldn't open audio output: {0}")]
pub struct ToneError(pub String);

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("couldn't determine the home directory for config files")]
    NoProjectDirs,

    #[error("couldn't access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("couldn't parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("couldn't serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Reasons the polling loop stopped abnormally.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Clock(#[from] ClockError),
}
