//! Environment settings.
//!
//! | Variable              | Default             |
//! |-----------------------|---------------------|
//! | `CSVIMPORT_LOG`       | `screen`            |
//! | `CSVIMPORT_RUNS_DIR`  | `.csvimport/runs`   |
//! | `CSVIMPORT_STORE_DIR` | `.csvimport/store`  |
//! | `CSVIMPORT_SCHEMA`    | unset               |
//! | `CSVIMPORT_PORT`      | `3000`              |
//!
//! A `.env` file in the working directory is read first. Command line flags
//! override whatever is found here. With `CSVIMPORT_LOG=logger` the CLI
//! installs a JSON `tracing` subscriber on stderr, filtered by `RUST_LOG`
//! (default `csvimport=info`).

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::logs::{LogSink, NullSink, ScreenSink, TracingSink};
use crate::runs::DEFAULT_RUNS_DIR;
use crate::store::json::DEFAULT_STORE_DIR;

pub const DEFAULT_PORT: u16 = 3000;

/// Where import progress is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogDestination {
    #[default]
    Screen,
    Logger,
    Quiet,
}

impl FromStr for LogDestination {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "screen" => Ok(LogDestination::Screen),
            "logger" => Ok(LogDestination::Logger),
            "quiet" | "none" => Ok(LogDestination::Quiet),
            other => Err(ConfigError::InvalidValue {
                key: "CSVIMPORT_LOG".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub log: LogDestination,
    pub runs_dir: PathBuf,
    pub store_dir: PathBuf,
    /// Schema file used when the command line names none.
    pub schema: Option<PathBuf>,
    pub port: u16,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log: LogDestination::Screen,
            runs_dir: PathBuf::from(DEFAULT_RUNS_DIR),
            store_dir: PathBuf::from(DEFAULT_STORE_DIR),
            schema: None,
            port: DEFAULT_PORT,
        }
    }
}

impl Settings {
    /// Read settings from the process environment (and `.env`).
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read settings through `lookup`, unset keys keep their default.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Self::default();

        if let Some(value) = lookup("CSVIMPORT_LOG") {
            settings.log = value.parse()?;
        }
        if let Some(value) = lookup("CSVIMPORT_RUNS_DIR").filter(|v| !v.is_empty()) {
            settings.runs_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup("CSVIMPORT_STORE_DIR").filter(|v| !v.is_empty()) {
            settings.store_dir = PathBuf::from(value);
        }
        settings.schema = lookup("CSVIMPORT_SCHEMA")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        if let Some(value) = lookup("CSVIMPORT_PORT") {
            settings.port = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "CSVIMPORT_PORT".to_string(),
                value,
            })?;
        }

        Ok(settings)
    }

    /// Sink matching [`Settings::log`].
    pub fn sink(&self) -> Arc<dyn LogSink> {
        match self.log {
            LogDestination::Screen => Arc::new(ScreenSink),
            LogDestination::Logger => Arc::new(TracingSink),
            LogDestination::Quiet => Arc::new(NullSink),
        }
    }
}
