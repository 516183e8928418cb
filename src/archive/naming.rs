//! Archive file names
//!
//! Grammar: `<prefix><YYYYMMDD_HHMMSS>[_<n>].tar.gz`
//!
//! The timestamp is always UTC, even though the scheduler fires on the
//! host's local clock. A 02:00 run on a UTC+2 host is therefore named
//! `..._000000.tar.gz`. Retention ages are computed from the same UTC
//! value, so the offset never skews them.
//!
//! Listing and retention identify our archives by parsing this grammar, not
//! by a bare prefix match, so an operator file such as
//! `smarticky_backup_notes.txt` on the same share is never touched.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::backup::BackupError;

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
const TIMESTAMP_LEN: usize = 15;
const EXTENSION: &str = ".tar.gz";

/// What produced an archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackupKind {
    /// User-triggered backup
    Manual,
    /// Scheduler-triggered backup
    Automatic,
    /// Local snapshot taken right before a restore
    PreRestore,
}

impl BackupKind {
    /// File name prefix for this kind
    pub fn prefix(&self) -> &'static str {
        match self {
            BackupKind::Manual => "smarticky_backup_",
            BackupKind::Automatic => "smarticky_auto_backup_",
            BackupKind::PreRestore => "smarticky_pre_restore_backup_",
        }
    }

    /// Whether archives of this kind are uploaded to remote stores
    pub fn is_remote(&self) -> bool {
        !matches!(self, BackupKind::PreRestore)
    }

    const ALL: [BackupKind; 3] = [
        BackupKind::Manual,
        BackupKind::Automatic,
        BackupKind::PreRestore,
    ];
}

/// Structured archive name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BackupName {
    pub kind: BackupKind,
    pub timestamp: NaiveDateTime,
    /// Disambiguates archives of the same kind created within one second
    pub sequence: u32,
}

impl BackupName {
    /// Create a name with no sequence suffix
    pub fn new(kind: BackupKind, at: DateTime<Utc>) -> Self {
        Self {
            kind,
            timestamp: at.naive_utc().with_nanosecond(0).unwrap_or(at.naive_utc()),
            sequence: 0,
        }
    }

    /// Parse a name produced by a remote listing. Returns `None` for foreign files.
    pub fn parse(name: &str) -> Option<Self> {
        name.parse().ok()
    }
}

impl fmt::Display for BackupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}",
            self.kind.prefix(),
            self.timestamp.format(TIMESTAMP_FORMAT)
        )?;
        if self.sequence > 0 {
            write!(f, "_{}", self.sequence)?;
        }
        f.write_str(EXTENSION)
    }
}

impl FromStr for BackupName {
    type Err = BackupError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let invalid = || BackupError::InvalidName(name.to_string());

        let stem = name.strip_suffix(EXTENSION).ok_or_else(invalid)?;
        let (kind, rest) = BackupKind::ALL
            .iter()
            .find_map(|kind| stem.strip_prefix(kind.prefix()).map(|rest| (*kind, rest)))
            .ok_or_else(invalid)?;

        if rest.len() < TIMESTAMP_LEN || !rest.is_char_boundary(TIMESTAMP_LEN) {
            return Err(invalid());
        }
        let (stamp, suffix) = rest.split_at(TIMESTAMP_LEN);
        let timestamp =
            NaiveDateTime::parse_from_str(stamp, TIMESTAMP_FORMAT).map_err(|_| invalid())?;

        let sequence = match suffix {
            "" => 0,
            s => {
                let digits = s.strip_prefix('_').ok_or_else(invalid)?;
                if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                let n: u32 = digits.parse().map_err(|_| invalid())?;
                if n == 0 {
                    return Err(invalid());
                }
                n
            }
        };

        Ok(Self {
            kind,
            timestamp,
            sequence,
        })
    }
}

/// Issues archive names, never handing out the same name twice per process.
#[derive(Debug, Default)]
pub struct BackupNamer {
    last: Mutex<HashMap<BackupKind, (NaiveDateTime, u32)>>,
}

impl BackupNamer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next name for `kind` at `now`
    pub fn next(&self, kind: BackupKind, now: DateTime<Utc>) -> BackupName {
        let mut name = BackupName::new(kind, now);
        let mut last = match self.last.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if let Some((stamp, seq)) = last.get(&kind) {
            if *stamp == name.timestamp {
                name.sequence = seq + 1;
            }
        }
        last.insert(kind, (name.timestamp, name.sequence));
        name
    }
}
