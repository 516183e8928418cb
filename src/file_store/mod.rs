//! # Data Directory File Store
//!
//! Hierarchical file access rooted at the data directory. The archive codec
//! only ever sees this trait, so the same code reads the live directory,
//! restores into it, and decodes into memory for verification.
//!
//! All paths are relative to the store root and use `/`-free component
//! iteration; absolute paths and `..` are rejected with `InvalidInput`.

mod local;
mod memory;

pub use local::LocalFileStore;
pub use memory::MemoryFileStore;

use std::fmt;
use std::io::{self, Read};
use std::path::{Component, Path, PathBuf};
use std::time::SystemTime;

/// Metadata for a single entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// Size in bytes (0 for directories)
    pub len: u64,
    /// Whether the entry is a directory
    pub is_dir: bool,
    /// Unix permission bits
    pub mode: u32,
    /// Last modification time, when the store tracks it
    pub modified: Option<SystemTime>,
}

/// One entry produced by [`FileStore::walk`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalkEntry {
    /// Path relative to the store root
    pub path: PathBuf,
    /// Metadata captured during the walk
    pub meta: FileMeta,
}

/// File store contract
pub trait FileStore: Send + Sync + fmt::Debug {
    /// Stat a path
    fn stat(&self, path: &Path) -> io::Result<FileMeta>;

    /// Open a regular file for reading
    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send + '_>>;

    /// Create or truncate a file and fill it from `reader`. Returns bytes written.
    /// The parent directory must already exist.
    fn write_from(&self, path: &Path, reader: &mut dyn Read) -> io::Result<u64>;

    /// Create a directory and all missing parents
    fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Remove a file or an empty directory
    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Rename an entry
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Walk `path` depth-first in name order, starting with `path` itself
    fn walk(&self, path: &Path) -> io::Result<Vec<WalkEntry>>;

    /// Whether a path exists
    fn exists(&self, path: &Path) -> bool {
        self.stat(path).is_ok()
    }

    /// Read a whole file
    fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        let mut buf = Vec::new();
        self.open(path)?.read_to_end(&mut buf)?;
        Ok(buf)
    }

    /// Write a whole file
    fn write(&self, path: &Path, data: &[u8]) -> io::Result<()> {
        let mut reader = data;
        self.write_from(path, &mut reader).map(|_| ())
    }
}

/// Normalize a store-relative path, rejecting anything that escapes the root.
pub fn normalize(path: &Path) -> io::Result<PathBuf> {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidInput,
                    format!("path escapes store root: {}", path.display()),
                ));
            }
        }
    }
    Ok(out)
}
