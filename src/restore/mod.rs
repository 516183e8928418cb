//! Restore subsystem for Smarticky
//!
//! Restore overwrites the live data directory with a remote archive.
//!
//! # Algorithm
//!
//! 1. Validate the file name and check the backend is configured
//! 2. Acquire the operation lock
//! 3. Download the archive
//! 4. Decode it in memory; refuse archives that fail verification
//! 5. Checkpoint the live database and write a safety snapshot
//!    (`smarticky_pre_restore_backup_*.tar.gz`) into the data directory
//! 6. Extract the archive over the data directory
//! 7. Release the operation lock and report that a restart is required
//!
//! Every step before 6 aborts without touching live data. Without a safety
//! snapshot there is no restore.
//!
//! # Important
//!
//! Extraction is additive: files created after the archive was taken are
//! not removed. The safety snapshot is never deleted automatically.
//! Open database handles keep stale state until the process restarts.

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use crate::archive::{extract_archive, BackupKind};
use crate::backup::{join_error, parse_filename, BackupEngine, BackupError, BackupResult};
use crate::remote::BackendKind;

/// Warning returned with every successful restore
pub const RESTART_WARNING: &str = "Please restart the application for changes to take full effect";

/// A completed restore
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoreOutcome {
    pub restart_required: bool,
    pub warning: String,
    /// Pre-restore snapshot written into the data directory
    pub safety_snapshot: String,
    /// Files and directories written
    pub entries: u64,
}

impl BackupEngine {
    /// Restore `filename` from `kind` over the live data directory
    pub async fn restore(&self, kind: BackendKind, filename: &str) -> BackupResult<RestoreOutcome> {
        let name = parse_filename(filename)?.to_string();
        let config = self.config().await?;
        let backend = self.backends.open(kind, &config)?;

        let _guard = self.operation_lock.lock().await;
        info!(backend = %kind, file = %name, "restore started");

        let data = backend.read(&name).await?;

        let check = self.verify_bytes(data.clone()).await?;
        if !check.valid {
            let reason = check
                .error
                .unwrap_or_else(|| "archive failed verification".to_string());
            return Err(BackupError::InvalidRequest(format!(
                "refusing to restore {}: {}",
                name, reason
            )));
        }

        let safety_snapshot = self
            .write_safety_snapshot()
            .await
            .map_err(BackupError::safety_snapshot)?;
        info!(snapshot = %safety_snapshot, "safety snapshot written");

        let store = Arc::clone(&self.store);
        let cancel = self.cancel.clone();
        let stats = tokio::task::spawn_blocking(move || {
            extract_archive(data.as_slice(), store.as_ref(), &cancel)
        })
        .await
        .map_err(join_error)??;

        warn!(
            backend = %kind,
            file = %name,
            entries = stats.entries,
            "restore complete, restart required"
        );
        Ok(RestoreOutcome {
            restart_required: true,
            warning: RESTART_WARNING.to_string(),
            safety_snapshot,
            entries: stats.entries,
        })
    }

    async fn write_safety_snapshot(&self) -> BackupResult<String> {
        let name = self
            .namer
            .next(BackupKind::PreRestore, self.clock.now())
            .to_string();
        let (data, _) = self.build_archive().await?;

        let store = Arc::clone(&self.store);
        let path = name.clone();
        tokio::task::spawn_blocking(move || {
            store
                .write(Path::new(&path), &data)
                .map_err(|e| BackupError::archive_io(format!("failed to write {}", path), e))
        })
        .await
        .map_err(join_error)??;

        Ok(name)
    }
}
