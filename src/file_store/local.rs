//! # Local Filesystem Store

use std::fs::{self, File};
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use super::{normalize, FileMeta, FileStore, WalkEntry};

/// File store rooted at a directory on disk
#[derive(Debug, Clone)]
pub struct LocalFileStore {
    root: PathBuf,
}

impl LocalFileStore {
    /// Create a new local store
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The directory this store is rooted at
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn full_path(&self, path: &Path) -> io::Result<PathBuf> {
        Ok(self.root.join(normalize(path)?))
    }
}

fn meta_from(metadata: &fs::Metadata) -> FileMeta {
    FileMeta {
        len: if metadata.is_dir() { 0 } else { metadata.len() },
        is_dir: metadata.is_dir(),
        mode: mode_of(metadata),
        modified: metadata.modified().ok(),
    }
}

#[cfg(unix)]
fn mode_of(metadata: &fs::Metadata) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn mode_of(metadata: &fs::Metadata) -> u32 {
    if metadata.is_dir() {
        0o755
    } else {
        0o644
    }
}

impl FileStore for LocalFileStore {
    fn stat(&self, path: &Path) -> io::Result<FileMeta> {
        let metadata = fs::metadata(self.full_path(path)?)?;
        Ok(meta_from(&metadata))
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send + '_>> {
        let file = File::open(self.full_path(path)?)?;
        Ok(Box::new(file))
    }

    fn write_from(&self, path: &Path, reader: &mut dyn Read) -> io::Result<u64> {
        let full_path = self.full_path(path)?;
        let mut file = File::create(&full_path)?;
        let written = io::copy(reader, &mut file)?;
        file.sync_all()?;
        Ok(written)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(self.full_path(path)?)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        let full_path = self.full_path(path)?;
        if fs::symlink_metadata(&full_path)?.is_dir() {
            fs::remove_dir(&full_path)
        } else {
            fs::remove_file(&full_path)
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(self.full_path(from)?, self.full_path(to)?)
    }

    fn walk(&self, path: &Path) -> io::Result<Vec<WalkEntry>> {
        let start = self.full_path(path)?;
        let mut entries = Vec::new();

        for entry in WalkDir::new(&start).sort_by_file_name() {
            let entry = entry.map_err(io::Error::from)?;
            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?
                .to_path_buf();
            let metadata = entry.metadata().map_err(io::Error::from)?;

            entries.push(WalkEntry {
                path: relative,
                meta: meta_from(&metadata),
            });
        }

        Ok(entries)
    }
}
