//! Non-destructive archive verification
//!
//! The archive is decoded into a [`MemoryFileStore`](crate::file_store::MemoryFileStore);
//! the live data directory is never touched. Two paths are checked:
//!
//! - `/smarticky.db` must exist and be non-empty
//! - `/uploads` must exist
//!
//! A failed check is reported in the result, not raised as an error.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::archive::{extract_to_memory, DATABASE_FILE, UPLOADS_DIR};
use crate::backup::{BackupError, BackupResult};
use crate::file_store::FileStore;

/// Outcome of checking one required path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileCheck {
    pub path: String,
    pub exists: bool,
    pub size: u64,
    pub is_dir: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of verifying one archive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub valid: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub file_checks: Vec<FileCheck>,
    /// Decompressed bytes of all regular files
    pub total_size: u64,
    /// Files and directories decoded
    pub file_count: u64,
    pub verified_at: DateTime<Utc>,
}

impl VerificationResult {
    fn failed(error: String, now: DateTime<Utc>) -> Self {
        Self {
            valid: false,
            error: Some(error),
            file_checks: Vec::new(),
            total_size: 0,
            file_count: 0,
            verified_at: now,
        }
    }
}

/// Decode `data` in memory and check it is restorable.
///
/// Only cancellation is an error; an undecodable archive yields
/// `valid == false` with the decode error.
pub fn verify_archive(
    data: &[u8],
    now: DateTime<Utc>,
    cancel: &CancellationToken,
) -> BackupResult<VerificationResult> {
    let (store, stats) = match extract_to_memory(data, cancel) {
        Ok(decoded) => decoded,
        Err(BackupError::Cancelled) => return Err(BackupError::Cancelled),
        Err(e) => return Ok(VerificationResult::failed(e.to_string(), now)),
    };

    let file_checks: Vec<FileCheck> = [DATABASE_FILE, UPLOADS_DIR]
        .into_iter()
        .map(|path| check_path(&store, path))
        .collect();
    let valid = file_checks.iter().all(|c| c.exists && c.error.is_none());

    Ok(VerificationResult {
        valid,
        error: (!valid).then(|| "one or more critical files are missing or invalid".to_string()),
        file_checks,
        total_size: stats.bytes,
        file_count: stats.entries,
        verified_at: now,
    })
}

fn check_path(store: &dyn FileStore, path: &str) -> FileCheck {
    let display = format!("/{}", path);
    match store.stat(Path::new(path)) {
        Ok(meta) => {
            let error = (path == DATABASE_FILE && (meta.is_dir || meta.len == 0))
                .then(|| "database file is empty".to_string());
            FileCheck {
                path: display,
                exists: true,
                size: meta.len,
                is_dir: meta.is_dir,
                error,
            }
        }
        Err(e) => FileCheck {
            path: display,
            exists: false,
            size: 0,
            is_dir: false,
            error: Some(e.to_string()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::create_archive_bytes;
    use crate::file_store::MemoryFileStore;
    use chrono::TimeZone;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tar::{Builder, EntryType, Header};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 14, 12, 0, 0).unwrap()
    }

    fn archive_of(db: &[u8]) -> Vec<u8> {
        let store = MemoryFileStore::new();
        store.write(Path::new("smarticky.db"), db).unwrap();
        store.create_dir_all(Path::new("uploads")).unwrap();
        store.write(Path::new("uploads/cat.png"), b"meow").unwrap();
        create_archive_bytes(&store, &CancellationToken::new()).unwrap().0
    }

    #[test]
    fn test_valid_archive() {
        let result = verify_archive(&archive_of(b"SQLite format 3"), now(), &CancellationToken::new())
            .unwrap();

        assert!(result.valid);
        assert!(result.error.is_none());
        assert_eq!(result.file_count, 3);
        assert_eq!(result.total_size, 15 + 4);
        assert_eq!(result.file_checks[0].path, "/smarticky.db");
        assert_eq!(result.file_checks[0].size, 15);
        assert!(result.file_checks[1].is_dir);
        assert_eq!(result.verified_at, now());
    }

    #[test]
    fn test_empty_database_flagged() {
        let result = verify_archive(&archive_of(b""), now(), &CancellationToken::new()).unwrap();

        assert!(!result.valid);
        let db = &result.file_checks[0];
        assert!(db.exists);
        assert_eq!(db.error.as_deref(), Some("database file is empty"));
        assert_eq!(
            result.error.as_deref(),
            Some("one or more critical files are missing or invalid")
        );
    }

    #[test]
    fn test_missing_uploads_flagged() {
        let mut builder = Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let mut header = Header::new_ustar();
        header.set_entry_type(EntryType::Regular);
        header.set_mode(0o644);
        header.set_size(2);
        builder
            .append_data(&mut header, "smarticky.db", &b"db"[..])
            .unwrap();
        let data = builder.into_inner().unwrap().finish().unwrap();

        let result = verify_archive(&data, now(), &CancellationToken::new()).unwrap();

        assert!(!result.valid);
        assert!(result.file_checks[0].error.is_none());
        assert!(!result.file_checks[1].exists);
        assert!(result.file_checks[1].error.is_some());
    }

    #[test]
    fn test_corrupt_archive_is_invalid_result() {
        let result = verify_archive(b"not an archive", now(), &CancellationToken::new()).unwrap();
        assert!(!result.valid);
        assert!(result.error.is_some());
        assert!(result.file_checks.is_empty());
    }

    #[test]
    fn test_json_shape() {
        let result = verify_archive(&archive_of(b"db"), now(), &CancellationToken::new()).unwrap();
        let json = serde_json::to_value(&result).unwrap();

        assert_eq!(json["valid"], true);
        assert!(json.get("error").is_none());
        assert_eq!(json["file_checks"][0]["is_dir"], false);
        assert!(json["file_checks"][0].get("error").is_none());
        assert_eq!(json["file_count"], 3);
    }
}
