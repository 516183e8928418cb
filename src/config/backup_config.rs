//! Persisted backup settings
//!
//! Exactly one `BackupConfig` exists. It is created with defaults on first
//! read and only ever changed through [`BackupConfigUpdate`], which
//! overwrites the fields a caller supplied and leaves the rest alone.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::backup::{BackupError, BackupResult};
use crate::remote::BackendKind;

/// How often the scheduler runs an automatic backup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackupSchedule {
    #[default]
    Daily,
    Weekly,
    /// Never run automatically
    Manual,
}

impl BackupSchedule {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackupSchedule::Daily => "daily",
            BackupSchedule::Weekly => "weekly",
            BackupSchedule::Manual => "manual",
        }
    }
}

impl fmt::Display for BackupSchedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackupSchedule {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "daily" => Ok(BackupSchedule::Daily),
            "weekly" => Ok(BackupSchedule::Weekly),
            "manual" => Ok(BackupSchedule::Manual),
            other => Err(BackupError::configuration(format!(
                "invalid backup schedule: {} (expected daily, weekly or manual)",
                other
            ))),
        }
    }
}

/// Backup settings singleton
///
/// Serialized in full for the admin edit form, secrets included.
/// The `Debug` output redacts them.
#[derive(Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BackupConfig {
    pub webdav_url: String,
    pub webdav_user: String,
    pub webdav_password: String,
    pub s3_endpoint: String,
    pub s3_region: String,
    pub s3_bucket: String,
    pub s3_access_key: String,
    pub s3_secret_key: String,
    pub auto_backup_enabled: bool,
    pub backup_schedule: BackupSchedule,
    pub last_backup_at: Option<DateTime<Utc>>,
    /// Days to keep remote archives; 0 keeps them forever
    pub backup_retention_days: u32,
    /// Archives to keep per backend; 0 keeps all
    pub backup_max_count: u32,
}

fn redact(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "[REDACTED]"
    }
}

impl fmt::Debug for BackupConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackupConfig")
            .field("webdav_url", &self.webdav_url)
            .field("webdav_user", &self.webdav_user)
            .field("webdav_password", &redact(&self.webdav_password))
            .field("s3_endpoint", &self.s3_endpoint)
            .field("s3_region", &self.s3_region)
            .field("s3_bucket", &self.s3_bucket)
            .field("s3_access_key", &redact(&self.s3_access_key))
            .field("s3_secret_key", &redact(&self.s3_secret_key))
            .field("auto_backup_enabled", &self.auto_backup_enabled)
            .field("backup_schedule", &self.backup_schedule)
            .field("last_backup_at", &self.last_backup_at)
            .field("backup_retention_days", &self.backup_retention_days)
            .field("backup_max_count", &self.backup_max_count)
            .finish()
    }
}

impl BackupConfig {
    /// Whether enough is set to reach `kind` at all
    pub fn is_configured(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::WebDav => !self.webdav_url.is_empty(),
            BackendKind::S3 => !self.s3_endpoint.is_empty() && !self.s3_bucket.is_empty(),
        }
    }

    /// Precondition for reading from (or listing, deleting on) a backend
    pub fn require_access(&self, kind: BackendKind) -> BackupResult<()> {
        if self.is_configured(kind) {
            return Ok(());
        }
        Err(BackupError::configuration(match kind {
            BackendKind::WebDav => "WebDAV not configured",
            BackendKind::S3 => "S3 not configured",
        }))
    }

    /// Precondition for a manual upload; S3 also needs the credential pair
    pub fn require_upload(&self, kind: BackendKind) -> BackupResult<()> {
        match kind {
            BackendKind::WebDav if self.webdav_url.is_empty() => {
                Err(BackupError::configuration("WebDAV URL not configured"))
            }
            BackendKind::S3
                if self.s3_endpoint.is_empty()
                    || self.s3_bucket.is_empty()
                    || self.s3_access_key.is_empty()
                    || self.s3_secret_key.is_empty() =>
            {
                Err(BackupError::configuration("S3 configuration incomplete"))
            }
            _ => Ok(()),
        }
    }
}

/// Partial update: every `Some` field overwrites, every `None` is left as is
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BackupConfigUpdate {
    pub webdav_url: Option<String>,
    pub webdav_user: Option<String>,
    pub webdav_password: Option<String>,
    pub s3_endpoint: Option<String>,
    pub s3_region: Option<String>,
    pub s3_bucket: Option<String>,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,
    pub auto_backup_enabled: Option<bool>,
    pub backup_schedule: Option<String>,
    pub backup_retention_days: Option<u32>,
    pub backup_max_count: Option<u32>,
}

impl BackupConfigUpdate {
    /// Merge into `config`. Nothing is changed if the schedule is invalid.
    pub fn apply(self, config: &mut BackupConfig) -> BackupResult<()> {
        let schedule = self
            .backup_schedule
            .as_deref()
            .map(BackupSchedule::from_str)
            .transpose()?;

        macro_rules! merge {
            ($($field:ident),* $(,)?) => {
                $(if let Some(value) = self.$field {
                    config.$field = value;
                })*
            };
        }
        merge!(
            webdav_url,
            webdav_user,
            webdav_password,
            s3_endpoint,
            s3_region,
            s3_bucket,
            s3_access_key,
            s3_secret_key,
            auto_backup_enabled,
            backup_retention_days,
            backup_max_count,
        );
        if let Some(schedule) = schedule {
            config.backup_schedule = schedule;
        }
        Ok(())
    }
}
