//! Retention policy
//!
//! Decides which remote archives to delete after a successful upload.
//!
//! 1. Keep only entries whose name parses as a manual or automatic archive
//! 2. Sort newest first (modification time descending, name ascending)
//! 3. Delete an entry if its index is at or past `max_count`, or if it is
//!    older than `max_age_days`
//!
//! Either threshold may be 0, meaning no limit on that dimension. The newest
//! entry is never removed for age alone.

use chrono::{DateTime, Duration, Utc};

use crate::archive::BackupName;
use crate::config::BackupConfig;
use crate::remote::RemoteEntry;

/// Age and count thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetentionPolicy {
    pub max_age_days: u32,
    pub max_count: u32,
}

impl RetentionPolicy {
    pub fn new(max_age_days: u32, max_count: u32) -> Self {
        Self {
            max_age_days,
            max_count,
        }
    }

    pub fn from_config(config: &BackupConfig) -> Self {
        Self::new(config.backup_retention_days, config.backup_max_count)
    }

    /// Whether this policy can never delete anything
    pub fn is_unlimited(&self) -> bool {
        self.max_age_days == 0 && self.max_count == 0
    }

    /// Names of the entries to delete, newest first
    pub fn select_expired(&self, entries: &[RemoteEntry], now: DateTime<Utc>) -> Vec<String> {
        if self.is_unlimited() {
            return Vec::new();
        }

        let mut ours: Vec<&RemoteEntry> = entries
            .iter()
            .filter(|e| BackupName::parse(&e.name).is_some_and(|n| n.kind.is_remote()))
            .collect();
        ours.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));

        let max_age = Duration::days(i64::from(self.max_age_days));
        ours.iter()
            .enumerate()
            .filter(|(index, entry)| {
                let over_count = self.max_count > 0 && *index >= self.max_count as usize;
                let too_old =
                    self.max_age_days > 0 && *index > 0 && now - entry.modified > max_age;
                over_count || too_old
            })
            .map(|(_, entry)| entry.name.clone())
            .collect()
    }
}
