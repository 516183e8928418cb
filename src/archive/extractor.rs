//! Archive extraction
//!
//! Extraction is additive: entries overwrite same-named files, files absent
//! from the archive are left alone. Each regular file is written to a
//! sibling temp name and renamed into place.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::ArchiveStats;
use crate::backup::{BackupError, BackupResult};
use crate::file_store::{normalize, FileStore, MemoryFileStore};

/// Decode `reader` into `store`, recreating directories as needed.
///
/// Entries with absolute paths or `..` components are rejected and stop the
/// extraction. Links and other special entries are skipped.
pub fn extract_archive<R: Read>(
    reader: R,
    store: &dyn FileStore,
    cancel: &CancellationToken,
) -> BackupResult<ArchiveStats> {
    let mut archive = Archive::new(GzDecoder::new(reader));
    let entries = archive
        .entries()
        .map_err(|e| BackupError::archive_io("failed to read archive", e))?;

    let mut stats = ArchiveStats::default();
    for entry in entries {
        if cancel.is_cancelled() {
            return Err(BackupError::Cancelled);
        }
        let mut entry =
            entry.map_err(|e| BackupError::archive_io("failed to read archive entry", e))?;

        let raw = entry
            .path()
            .map_err(|e| BackupError::archive_io("invalid archive entry name", e))?
            .into_owned();
        let path = normalize(&raw).map_err(|e| {
            BackupError::archive_io(format!("unsafe archive entry {}", raw.display()), e)
        })?;
        if path.as_os_str().is_empty() {
            continue;
        }

        let entry_type = entry.header().entry_type();
        if entry_type.is_dir() {
            store.create_dir_all(&path).map_err(|e| {
                BackupError::archive_io(format!("failed to create {}", path.display()), e)
            })?;
        } else if entry_type.is_file() {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                store.create_dir_all(parent).map_err(|e| {
                    BackupError::archive_io(format!("failed to create {}", parent.display()), e)
                })?;
            }
            stats.bytes += replace_file(store, &path, &mut entry)?;
        } else {
            debug!(path = %path.display(), entry_type = ?entry_type, "skipping archive entry");
            continue;
        }
        stats.entries += 1;
    }

    Ok(stats)
}

/// Decode into a fresh in-memory store; nothing on disk is touched.
pub fn extract_to_memory<R: Read>(
    reader: R,
    cancel: &CancellationToken,
) -> BackupResult<(MemoryFileStore, ArchiveStats)> {
    let store = MemoryFileStore::new();
    let stats = extract_archive(reader, &store, cancel)?;
    Ok((store, stats))
}

fn replace_file(store: &dyn FileStore, path: &Path, data: &mut dyn Read) -> BackupResult<u64> {
    let temp = temp_sibling(path);
    let written = match store.write_from(&temp, data) {
        Ok(n) => n,
        Err(e) => {
            let _ = store.remove(&temp);
            return Err(BackupError::archive_io(
                format!("failed to write {}", path.display()),
                e,
            ));
        }
    };
    store.rename(&temp, path).map_err(|e| {
        let _ = store.remove(&temp);
        BackupError::archive_io(format!("failed to replace {}", path.display()), e)
    })?;
    Ok(written)
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(".restoring");
    path.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::create_archive_bytes;
    use crate::file_store::LocalFileStore;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use tar::{Builder, EntryType, Header};
    use tempfile::TempDir;

    fn source_store() -> MemoryFileStore {
        let store = MemoryFileStore::new();
        store.write(Path::new("smarticky.db"), b"notes").unwrap();
        store.create_dir_all(Path::new("uploads/2026")).unwrap();
        store.write(Path::new("uploads/2026/photo.jpg"), b"jpeg").unwrap();
        store
    }

    fn raw_archive(name: &[u8], data: &[u8]) -> Vec<u8> {
        let mut builder = Builder::new(GzEncoder::new(Vec::new(), Compression::default()));
        let mut header = Header::new_ustar();
        header.as_old_mut().name[..name.len()].copy_from_slice(name);
        header.set_entry_type(EntryType::Regular);
        header.set_mode(0o644);
        header.set_size(data.len() as u64);
        header.set_cksum();
        builder.append(&header, data).unwrap();
        builder.into_inner().unwrap().finish().unwrap()
    }

    #[test]
    fn test_extract_to_memory() {
        let (data, _) = create_archive_bytes(&source_store(), &CancellationToken::new()).unwrap();

        let (store, stats) = extract_to_memory(&data[..], &CancellationToken::new()).unwrap();

        assert_eq!(store.read(Path::new("smarticky.db")).unwrap(), b"notes");
        assert_eq!(store.read(Path::new("uploads/2026/photo.jpg")).unwrap(), b"jpeg");
        assert!(store.stat(Path::new("uploads")).unwrap().is_dir);
        assert_eq!(stats.entries, 4);
        assert_eq!(stats.bytes, 9);
        assert!(!store.exists(Path::new(".smarticky.db.restoring")));
    }

    #[test]
    fn test_extract_overwrites_but_keeps_extra_files() {
        let (data, _) = create_archive_bytes(&source_store(), &CancellationToken::new()).unwrap();

        let temp = TempDir::new().unwrap();
        let live = LocalFileStore::new(temp.path());
        live.write(Path::new("smarticky.db"), b"newer contents").unwrap();
        live.create_dir_all(Path::new("uploads")).unwrap();
        live.write(Path::new("uploads/added-later.png"), b"x").unwrap();

        extract_archive(&data[..], &live, &CancellationToken::new()).unwrap();

        assert_eq!(live.read(Path::new("smarticky.db")).unwrap(), b"notes");
        assert_eq!(live.read(Path::new("uploads/2026/photo.jpg")).unwrap(), b"jpeg");
        assert!(live.exists(Path::new("uploads/added-later.png")));
    }

    #[test]
    fn test_parent_traversal_rejected() {
        let data = raw_archive(b"../escape.txt", b"evil");
        let temp = TempDir::new().unwrap();
        let live = LocalFileStore::new(temp.path().join("data"));
        std::fs::create_dir_all(live.root()).unwrap();

        let err = extract_archive(&data[..], &live, &CancellationToken::new()).unwrap_err();

        assert!(err.to_string().contains("unsafe archive entry"));
        assert!(!temp.path().join("escape.txt").exists());
    }

    #[test]
    fn test_absolute_path_rejected() {
        let data = raw_archive(b"/etc/smarticky.db", b"evil");
        let store = MemoryFileStore::new();

        let err = extract_archive(&data[..], &store, &CancellationToken::new()).unwrap_err();
        assert!(matches!(err, BackupError::ArchiveIo { .. }));
        assert!(store.is_empty());
    }

    #[test]
    fn test_garbage_input_is_archive_error() {
        let err = extract_to_memory(&b"definitely not gzip"[..], &CancellationToken::new())
            .unwrap_err();
        assert!(matches!(err, BackupError::ArchiveIo { .. }));
    }
}
