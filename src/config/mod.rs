//! # Configuration
//!
//! Two kinds of configuration live here:
//!
//! - [`AppConfig`]: process settings (data directory, HTTP, scheduler,
//!   logging), read once at startup.
//! - [`BackupConfig`]: the persisted backup settings singleton, edited at
//!   runtime through the HTTP surface and stored by a [`ConfigStore`].

mod app;
mod backup_config;
mod store;

pub use app::{AppConfig, AppConfigError, LogConfig, SchedulerConfig, DATA_DIR_ENV, PORT_ENV};
pub use backup_config::{BackupConfig, BackupConfigUpdate, BackupSchedule};
pub use store::{ConfigStore, JsonConfigStore, MemoryConfigStore, CONFIG_FILE};
