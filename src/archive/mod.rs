//! # Archive Codec
//!
//! Builds and extracts the backup archive: a gzip-compressed ustar stream
//! holding the primary database file and the uploads tree, with entry names
//! relative to the data directory (`smarticky.db`, `uploads/...`).
//!
//! The codec only talks to a [`FileStore`](crate::file_store::FileStore), so
//! the same code archives the live data directory, restores into it, and
//! decodes into memory for verification. It knows nothing of backends or
//! schedules.
//!
//! Both directions check a [`CancellationToken`](tokio_util::sync::CancellationToken)
//! between entries and stop with [`BackupError::Cancelled`](crate::backup::BackupError::Cancelled).

mod builder;
mod extractor;
mod naming;

pub use builder::{create_archive, create_archive_bytes};
pub use extractor::{extract_archive, extract_to_memory};
pub use naming::{BackupKind, BackupName, BackupNamer};

/// Primary database file, relative to the data directory
pub const DATABASE_FILE: &str = "smarticky.db";

/// Attachment tree, relative to the data directory
pub const UPLOADS_DIR: &str = "uploads";

/// Counters gathered while encoding or decoding an archive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArchiveStats {
    /// Files and directories
    pub entries: u64,
    /// Regular-file payload bytes (uncompressed)
    pub bytes: u64,
}
