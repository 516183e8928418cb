//! Process configuration
//!
//! Loaded once at startup: optional JSON file, then environment overrides,
//! then validation. Every field has a default, so an empty file (or no file)
//! is a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{TimeZone, Utc, Weekday};
use croner::Cron;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::http_server::HttpServerConfig;

/// Environment variable overriding the data directory
pub const DATA_DIR_ENV: &str = "SMARTICKY_DATA_DIR";

/// Environment variable overriding the HTTP port
pub const PORT_ENV: &str = "PORT";

/// Invalid or unreadable process configuration
#[derive(Debug, Error)]
pub enum AppConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Scheduler settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Five-field cron expression for the daily tick, in local time.
    /// Must fire at most once per calendar day.
    pub cron: String,
    /// Day on which the weekly schedule proceeds
    pub weekly_day: Weekday,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            cron: "0 2 * * *".to_string(),
            weekly_day: Weekday::Sun,
        }
    }
}

impl SchedulerConfig {
    /// Parse `cron`, refusing expressions that would fire twice in a day.
    /// Each tick runs a full backup whenever the schedule is due, so a
    /// `*/5 * * * *` cadence would back up every five minutes.
    pub fn parse_cron(&self) -> Result<Cron, AppConfigError> {
        let cron = Cron::new(&self.cron).parse().map_err(|e| {
            AppConfigError::Invalid(format!("invalid scheduler.cron '{}': {}", self.cron, e))
        })?;

        let Some(reference) = Utc.with_ymd_and_hms(2026, 1, 5, 0, 0, 0).single() else {
            return Ok(cron);
        };
        let Ok(mut previous) = cron.find_next_occurrence(&reference, true) else {
            return Ok(cron);
        };
        for _ in 0..8 {
            let Ok(next) = cron.find_next_occurrence(&previous, false) else {
                break;
            };
            if next.date_naive() == previous.date_naive() {
                return Err(AppConfigError::Invalid(format!(
                    "scheduler.cron '{}' must fire at most once per day",
                    self.cron
                )));
            }
            previous = next;
        }
        Ok(cron)
    }
}

/// Logging settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default filter when `SMARTICKY_LOG` is unset
    pub level: String,
    /// Emit JSON lines on the console instead of text
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory holding `smarticky.db`, `uploads/` and the backup config
    pub data_dir: PathBuf,
    pub server: HttpServerConfig,
    pub scheduler: SchedulerConfig,
    /// Per-request deadline for remote backends
    pub backend_timeout_secs: u64,
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            server: HttpServerConfig::default(),
            scheduler: SchedulerConfig::default(),
            backend_timeout_secs: 300,
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from an optional file, apply process environment, validate.
    pub fn load(path: Option<&Path>) -> Result<Self, AppConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self, AppConfigError> {
        let content = fs::read_to_string(path).map_err(|source| AppConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Apply `SMARTICKY_DATA_DIR` and `PORT` through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), AppConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup(DATA_DIR_ENV).filter(|d| !d.is_empty()) {
            self.data_dir = PathBuf::from(dir);
        }
        if let Some(port) = lookup(PORT_ENV).filter(|p| !p.is_empty()) {
            self.server.port = port
                .parse()
                .map_err(|_| AppConfigError::Invalid(format!("invalid {}: {}", PORT_ENV, port)))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), AppConfigError> {
        if self.data_dir.as_os_str().is_empty() {
            return Err(AppConfigError::Invalid("data_dir must not be empty".into()));
        }
        if self.server.port == 0 {
            return Err(AppConfigError::Invalid("server.port must be > 0".into()));
        }
        if self.backend_timeout_secs == 0 {
            return Err(AppConfigError::Invalid(
                "backend_timeout_secs must be > 0".into(),
            ));
        }
        self.scheduler.parse_cron()?;
        Ok(())
    }

    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }
}
