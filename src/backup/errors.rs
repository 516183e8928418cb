//! Backup-specific error types
//!
//! Every failure of the backup/restore engine maps onto one variant here.
//! Each variant carries:
//! - A stable error code (`SMARTICKY_BACKUP_*`)
//! - An HTTP status for the request-facing surface
//! - A message safe to return verbatim to an admin UI
//!
//! A failed verification is not an error. It is reported as a
//! [`VerificationResult`](super::VerificationResult) with `valid == false`.

use std::io;

use thiserror::Error;

use crate::checkpoint::CheckpointError;
use crate::remote::BackendKind;

/// Result type for backup operations
pub type BackupResult<T> = Result<T, BackupError>;

/// Backup and restore errors
#[derive(Debug, Error)]
pub enum BackupError {
    /// A backend or setting is missing; the user can fix this.
    #[error("{0}")]
    Configuration(String),

    /// The database refused to flush its write-ahead log.
    #[error("failed to prepare database for backup: {0}")]
    Checkpoint(#[from] CheckpointError),

    /// Local disk or walk failure while building or extracting an archive.
    #[error("{message}: {source}")]
    ArchiveIo {
        message: String,
        #[source]
        source: io::Error,
    },

    /// Network or auth failure talking to a remote store.
    #[error("{backend} request failed: {message}")]
    Transport { backend: BackendKind, message: String },

    /// The named archive does not exist on the remote store.
    #[error("backup file not found on {backend}: {name}")]
    NotFound { backend: BackendKind, name: String },

    /// The pre-restore snapshot could not be taken; restore refused.
    #[error("failed to create pre-restore backup: {0}")]
    SafetySnapshot(#[source] Box<BackupError>),

    /// A request the caller can fix (missing or malformed field).
    #[error("{0}")]
    InvalidRequest(String),

    /// A file name that is not one of ours.
    #[error("invalid backup file name: {0}")]
    InvalidName(String),

    /// The engine is shutting down.
    #[error("operation cancelled")]
    Cancelled,

    /// The persisted configuration could not be read or written.
    #[error("backup configuration store error: {0}")]
    ConfigStore(String),
}

impl BackupError {
    /// Creates a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        BackupError::Configuration(message.into())
    }

    /// Creates an archive I/O error
    pub fn archive_io(message: impl Into<String>, source: io::Error) -> Self {
        BackupError::ArchiveIo {
            message: message.into(),
            source,
        }
    }

    /// Creates a transport error for the given backend
    pub fn transport(backend: BackendKind, message: impl Into<String>) -> Self {
        BackupError::Transport {
            backend,
            message: message.into(),
        }
    }

    /// Wraps any failure raised while taking the pre-restore snapshot
    pub fn safety_snapshot(cause: BackupError) -> Self {
        BackupError::SafetySnapshot(Box::new(cause))
    }

    /// Returns the stable error code
    pub fn code(&self) -> &'static str {
        match self {
            BackupError::Configuration(_) => "SMARTICKY_BACKUP_CONFIGURATION",
            BackupError::Checkpoint(_) => "SMARTICKY_BACKUP_CHECKPOINT",
            BackupError::ArchiveIo { .. } => "SMARTICKY_BACKUP_ARCHIVE_IO",
            BackupError::Transport { .. } => "SMARTICKY_BACKUP_TRANSPORT",
            BackupError::NotFound { .. } => "SMARTICKY_BACKUP_NOT_FOUND",
            BackupError::SafetySnapshot(_) => "SMARTICKY_BACKUP_SAFETY_SNAPSHOT",
            BackupError::InvalidRequest(_) => "SMARTICKY_BACKUP_INVALID_REQUEST",
            BackupError::InvalidName(_) => "SMARTICKY_BACKUP_INVALID_NAME",
            BackupError::Cancelled => "SMARTICKY_BACKUP_CANCELLED",
            BackupError::ConfigStore(_) => "SMARTICKY_BACKUP_CONFIG_STORE",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            BackupError::Configuration(_) => 400,
            BackupError::InvalidRequest(_) => 400,
            BackupError::InvalidName(_) => 400,
            BackupError::NotFound { .. } => 404,
            BackupError::Transport { .. } => 502,
            BackupError::Cancelled => 503,
            BackupError::Checkpoint(_) => 500,
            BackupError::ArchiveIo { .. } => 500,
            BackupError::SafetySnapshot(_) => 500,
            BackupError::ConfigStore(_) => 500,
        }
    }
}
