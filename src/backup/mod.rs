//! Backup subsystem for Smarticky
//!
//! [`BackupEngine`] owns every collaborator the backup and restore flows
//! need and is passed explicitly to the HTTP layer, the scheduler and the CLI.
//!
//! # Backup algorithm
//!
//! 1. Load the backup config and check the target backend is configured
//! 2. Acquire the operation lock
//! 3. Checkpoint the database write-ahead log
//! 4. Encode the data directory into a gzip tar archive
//! 5. Upload the archive under a fresh name
//! 6. Record `last_backup_at`
//! 7. Apply the retention policy to that backend (failures only logged)
//! 8. Release the operation lock
//!
//! Automatic backups run steps 3-4 once and offer the same archive to each
//! configured backend in turn (WebDAV, then S3).
//!
//! Restore (see [`crate::restore`]) holds the same lock, so a backup never
//! reads a half-restored tree and a restore never overwrites files that are
//! being archived.

mod clock;
mod errors;
mod retention;
mod verifier;

pub use clock::{Clock, SystemClock};
pub use errors::{BackupError, BackupResult};
pub use retention::RetentionPolicy;
pub use verifier::{verify_archive, FileCheck, VerificationResult};

use std::io;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::archive::{create_archive_bytes, ArchiveStats, BackupKind, BackupName, BackupNamer};
use crate::checkpoint::{Checkpoint, SqliteCheckpoint};
use crate::config::{AppConfig, BackupConfig, BackupConfigUpdate, ConfigStore, JsonConfigStore};
use crate::file_store::{FileStore, LocalFileStore};
use crate::remote::{BackendFactory, BackendKind, RemoteBackends, StorageBackend};

/// Remote listings are narrowed to this prefix before names are parsed
pub const REMOTE_PREFIX: &str = "smarticky_";

/// A completed upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupOutcome {
    pub backend: BackendKind,
    pub file: String,
    /// Compressed archive size
    pub size: u64,
}

/// One remote archive as shown in list views
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupFileInfo {
    pub filename: String,
    pub size: u64,
    pub created_at: DateTime<Utc>,
}

/// Backup and restore engine
#[derive(Debug)]
pub struct BackupEngine {
    pub(crate) store: Arc<dyn FileStore>,
    pub(crate) checkpoint: Arc<dyn Checkpoint>,
    pub(crate) configs: Arc<dyn ConfigStore>,
    pub(crate) backends: Arc<dyn BackendFactory>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) namer: BackupNamer,
    /// Held for the whole of every backup and restore
    pub(crate) operation_lock: Mutex<()>,
    config_lock: Mutex<()>,
    pub(crate) cancel: CancellationToken,
}

impl BackupEngine {
    pub fn new(
        store: Arc<dyn FileStore>,
        checkpoint: Arc<dyn Checkpoint>,
        configs: Arc<dyn ConfigStore>,
        backends: Arc<dyn BackendFactory>,
    ) -> Self {
        Self {
            store,
            checkpoint,
            configs,
            backends,
            clock: Arc::new(SystemClock),
            namer: BackupNamer::new(),
            operation_lock: Mutex::new(()),
            config_lock: Mutex::new(()),
            cancel: CancellationToken::new(),
        }
    }

    /// Engine over the real data directory, SQLite database and HTTP backends
    pub fn from_app_config(config: &AppConfig) -> BackupResult<Self> {
        let data_dir = &config.data_dir;
        std::fs::create_dir_all(data_dir).map_err(|e| {
            BackupError::archive_io(
                format!("failed to create data directory {}", data_dir.display()),
                e,
            )
        })?;

        Ok(Self::new(
            Arc::new(LocalFileStore::new(data_dir)),
            Arc::new(SqliteCheckpoint::new(
                data_dir.join(crate::archive::DATABASE_FILE),
            )),
            Arc::new(JsonConfigStore::in_data_dir(data_dir)),
            Arc::new(RemoteBackends::new(config.backend_timeout())?),
        ))
    }

    /// Replace the clock
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Token cancelled by [`shutdown`](Self::shutdown)
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Stop in-flight archive work and the scheduler
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Current backup configuration, created with defaults on first use
    pub async fn config(&self) -> BackupResult<BackupConfig> {
        let _guard = self.config_lock.lock().await;
        self.load_or_create()
    }

    fn load_or_create(&self) -> BackupResult<BackupConfig> {
        if let Some(config) = self.configs.load()? {
            return Ok(config);
        }
        let config = BackupConfig::default();
        self.configs.save(&config)?;
        debug!("created default backup configuration");
        Ok(config)
    }

    /// Merge `update` into the stored configuration
    pub async fn update_config(&self, update: BackupConfigUpdate) -> BackupResult<BackupConfig> {
        let _guard = self.config_lock.lock().await;
        let mut config = self.load_or_create()?;
        update.apply(&mut config)?;
        self.configs.save(&config)?;
        info!(
            auto_backup_enabled = config.auto_backup_enabled,
            schedule = %config.backup_schedule,
            "backup configuration updated"
        );
        Ok(config)
    }

    async fn record_backup_time(&self, at: DateTime<Utc>) {
        let _guard = self.config_lock.lock().await;
        let result = self.load_or_create().and_then(|mut config| {
            config.last_backup_at = Some(at);
            self.configs.save(&config)
        });
        if let Err(e) = result {
            warn!(error = %e, "failed to record last backup time");
        }
    }

    /// Manual backup to `kind`
    pub async fn backup(&self, kind: BackendKind) -> BackupResult<BackupOutcome> {
        let config = self.config().await?;
        config.require_upload(kind)?;
        let backend = self.backends.open(kind, &config)?;

        let _guard = self.operation_lock.lock().await;
        let name = self.namer.next(BackupKind::Manual, self.clock.now()).to_string();
        let (data, stats) = self.build_archive().await?;
        self.upload_archive(backend.as_ref(), &name, data, stats, &config)
            .await
    }

    /// Unattended backup: checkpoint and archive once, then offer the same
    /// archive to each configured backend in priority order until one
    /// accepts it.
    pub async fn run_automatic(&self) -> BackupResult<BackupOutcome> {
        let config = self.config().await?;
        let targets: Vec<BackendKind> = BackendKind::PRIORITY
            .into_iter()
            .filter(|kind| config.is_configured(*kind))
            .collect();
        if targets.is_empty() {
            return Err(BackupError::configuration("backup not configured"));
        }

        let _guard = self.operation_lock.lock().await;
        let name = self
            .namer
            .next(BackupKind::Automatic, self.clock.now())
            .to_string();
        let (data, stats) = self.build_archive().await?;

        let mut last_error = None;
        for kind in targets {
            let attempt = match self.backends.open(kind, &config) {
                Ok(backend) => {
                    self.upload_archive(backend.as_ref(), &name, data.clone(), stats, &config)
                        .await
                }
                Err(e) => Err(e),
            };
            match attempt {
                Ok(outcome) => return Ok(outcome),
                Err(BackupError::Cancelled) => return Err(BackupError::Cancelled),
                Err(e) => {
                    warn!(backend = %kind, error = %e, "automatic backup failed");
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| BackupError::configuration("backup not configured")))
    }

    /// Upload an archive built under the operation lock, then record the
    /// time and apply retention. The caller holds the lock.
    async fn upload_archive(
        &self,
        backend: &dyn StorageBackend,
        name: &str,
        data: Vec<u8>,
        stats: ArchiveStats,
        config: &BackupConfig,
    ) -> BackupResult<BackupOutcome> {
        let size = data.len() as u64;

        backend.write(name, data).await?;
        info!(
            backend = %backend.kind(),
            file = %name,
            entries = stats.entries,
            bytes = size,
            "backup uploaded"
        );

        self.record_backup_time(self.clock.now()).await;
        self.apply_retention(backend, config).await;

        Ok(BackupOutcome {
            backend: backend.kind(),
            file: name.to_string(),
            size,
        })
    }

    /// Checkpoint, then encode the data directory, off the async runtime
    pub(crate) async fn build_archive(&self) -> BackupResult<(Vec<u8>, ArchiveStats)> {
        let store = Arc::clone(&self.store);
        let checkpoint = Arc::clone(&self.checkpoint);
        let cancel = self.cancel.clone();

        tokio::task::spawn_blocking(move || {
            checkpoint.checkpoint()?;
            debug!("database checkpoint complete");
            create_archive_bytes(store.as_ref(), &cancel)
        })
        .await
        .map_err(join_error)?
    }

    async fn apply_retention(&self, backend: &dyn StorageBackend, config: &BackupConfig) {
        let policy = RetentionPolicy::from_config(config);
        if policy.is_unlimited() {
            return;
        }

        let entries = match backend.list(REMOTE_PREFIX).await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(backend = %backend.kind(), error = %e, "retention listing failed");
                return;
            }
        };

        let expired = policy.select_expired(&entries, self.clock.now());
        let mut deleted = 0usize;
        for name in &expired {
            match backend.delete(name).await {
                Ok(()) => deleted += 1,
                Err(e) => warn!(backend = %backend.kind(), file = %name, error = %e, "failed to delete old backup"),
            }
        }
        if !expired.is_empty() {
            info!(backend = %backend.kind(), deleted, "retention applied");
        }
    }

    /// Manual and automatic archives on `kind`, newest first
    pub async fn list(&self, kind: BackendKind) -> BackupResult<Vec<BackupFileInfo>> {
        let config = self.config().await?;
        let backend = self.backends.open(kind, &config)?;

        let mut entries: Vec<_> = backend
            .list(REMOTE_PREFIX)
            .await?
            .into_iter()
            .filter(|e| BackupName::parse(&e.name).is_some_and(|n| n.kind.is_remote()))
            .collect();
        entries.sort_by(|a, b| b.modified.cmp(&a.modified).then_with(|| a.name.cmp(&b.name)));

        Ok(entries
            .into_iter()
            .map(|e| BackupFileInfo {
                filename: e.name,
                size: e.size,
                created_at: e.modified,
            })
            .collect())
    }

    /// Download `filename` from `kind` and check it without restoring
    pub async fn verify(&self, kind: BackendKind, filename: &str) -> BackupResult<VerificationResult> {
        let name = parse_filename(filename)?;
        let config = self.config().await?;
        let backend = self.backends.open(kind, &config)?;

        let data = backend.read(&name.to_string()).await?;
        let result = self.verify_bytes(data).await?;
        info!(backend = %kind, file = %name, valid = result.valid, "backup verified");
        Ok(result)
    }

    pub(crate) async fn verify_bytes(&self, data: Vec<u8>) -> BackupResult<VerificationResult> {
        let now = self.clock.now();
        let cancel = self.cancel.clone();
        tokio::task::spawn_blocking(move || verify_archive(&data, now, &cancel))
            .await
            .map_err(join_error)?
    }
}

/// Validate a caller-supplied archive name
pub(crate) fn parse_filename(filename: &str) -> BackupResult<BackupName> {
    if filename.trim().is_empty() {
        return Err(BackupError::InvalidRequest("filename is required".to_string()));
    }
    filename.parse()
}

pub(crate) fn join_error(err: tokio::task::JoinError) -> BackupError {
    if err.is_cancelled() {
        return BackupError::Cancelled;
    }
    BackupError::archive_io(
        "archive task failed",
        io::Error::new(io::ErrorKind::Other, err.to_string()),
    )
}
