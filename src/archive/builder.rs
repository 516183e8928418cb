//! Archive creation
//!
//! Entry order is fixed: the database file first, then the uploads tree in
//! depth-first name order. Headers carry the relative path, mode, size,
//! mtime and the directory/regular flag.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use flate2::write::GzEncoder;
use flate2::Compression;
use tar::{Builder, EntryType, Header};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{ArchiveStats, DATABASE_FILE, UPLOADS_DIR};
use crate::backup::{BackupError, BackupResult};
use crate::file_store::{FileMeta, FileStore, WalkEntry};

/// Encode the database file and uploads tree of `store` into `writer`.
///
/// Fails with `ArchiveIo` when the database file is missing, or when a file
/// disappears or changes size while it is being read. A missing uploads
/// directory is archived as an empty one, so every archive restores a
/// complete data directory layout.
pub fn create_archive<W: Write>(
    store: &dyn FileStore,
    writer: W,
    cancel: &CancellationToken,
) -> BackupResult<(W, ArchiveStats)> {
    let db_path = Path::new(DATABASE_FILE);
    let db_meta = store
        .stat(db_path)
        .map_err(|e| BackupError::archive_io("database file not found", e))?;
    if db_meta.is_dir {
        return Err(BackupError::archive_io(
            "database path is not a regular file",
            io::Error::new(io::ErrorKind::InvalidData, DATABASE_FILE),
        ));
    }

    let mut builder = Builder::new(GzEncoder::new(writer, Compression::default()));
    let mut stats = ArchiveStats::default();

    append_entry(
        store,
        &mut builder,
        &WalkEntry {
            path: PathBuf::from(DATABASE_FILE),
            meta: db_meta,
        },
        &mut stats,
    )?;

    let uploads = Path::new(UPLOADS_DIR);
    let entries = if store.exists(uploads) {
        store
            .walk(uploads)
            .map_err(|e| BackupError::archive_io("failed to walk uploads directory", e))?
    } else {
        debug!("uploads directory absent, archiving an empty one");
        vec![WalkEntry {
            path: PathBuf::from(UPLOADS_DIR),
            meta: FileMeta {
                len: 0,
                is_dir: true,
                mode: 0o755,
                modified: None,
            },
        }]
    };

    for entry in &entries {
        if cancel.is_cancelled() {
            return Err(BackupError::Cancelled);
        }
        append_entry(store, &mut builder, entry, &mut stats)?;
    }

    let encoder = builder
        .into_inner()
        .map_err(|e| BackupError::archive_io("failed to finish archive", e))?;
    let writer = encoder
        .finish()
        .map_err(|e| BackupError::archive_io("failed to finish compression", e))?;

    Ok((writer, stats))
}

/// Encode into an in-memory buffer
pub fn create_archive_bytes(
    store: &dyn FileStore,
    cancel: &CancellationToken,
) -> BackupResult<(Vec<u8>, ArchiveStats)> {
    create_archive(store, Vec::new(), cancel)
}

fn append_entry<W: Write>(
    store: &dyn FileStore,
    builder: &mut Builder<W>,
    entry: &WalkEntry,
    stats: &mut ArchiveStats,
) -> BackupResult<()> {
    let mut header = Header::new_ustar();
    header.set_mode(entry.meta.mode);
    header.set_mtime(unix_seconds(entry.meta.modified));

    if entry.meta.is_dir {
        header.set_entry_type(EntryType::Directory);
        header.set_size(0);
        builder
            .append_data(&mut header, &entry.path, io::empty())
            .map_err(|e| {
                BackupError::archive_io(
                    format!("failed to add directory {}", entry.path.display()),
                    e,
                )
            })?;
    } else {
        header.set_entry_type(EntryType::Regular);
        header.set_size(entry.meta.len);
        let file = store.open(&entry.path).map_err(|e| {
            BackupError::archive_io(format!("failed to open {}", entry.path.display()), e)
        })?;
        let mut reader = ExactReader::new(file, entry.meta.len);
        builder
            .append_data(&mut header, &entry.path, &mut reader)
            .map_err(|e| {
                BackupError::archive_io(format!("failed to add file {}", entry.path.display()), e)
            })?;
        stats.bytes += entry.meta.len;
    }

    stats.entries += 1;
    Ok(())
}

fn unix_seconds(modified: Option<SystemTime>) -> u64 {
    modified
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Yields exactly `len` bytes, or fails if the source runs short.
struct ExactReader<R> {
    inner: R,
    remaining: u64,
}

impl<R: Read> ExactReader<R> {
    fn new(inner: R, len: u64) -> Self {
        Self {
            inner,
            remaining: len,
        }
    }
}

impl<R: Read> Read for ExactReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remaining == 0 {
            return Ok(0);
        }
        let max = buf.len().min(self.remaining as usize);
        let n = self.inner.read(&mut buf[..max])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "file shrank while being archived",
            ));
        }
        self.remaining -= n as u64;
        Ok(n)
    }
}
