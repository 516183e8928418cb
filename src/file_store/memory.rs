//! # In-Memory Store
//!
//! Non-persistent store used to decode archives for verification.
//! Entries live in a `BTreeMap` keyed by normalized path; component-wise
//! `PathBuf` ordering gives the same depth-first name order as a sorted
//! directory walk.

use std::collections::BTreeMap;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

use super::{normalize, FileMeta, FileStore, WalkEntry};

const DIR_MODE: u32 = 0o755;
const FILE_MODE: u32 = 0o644;

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File { data: Vec<u8>, modified: SystemTime },
}

impl Node {
    fn meta(&self) -> FileMeta {
        match self {
            Node::Dir => FileMeta {
                len: 0,
                is_dir: true,
                mode: DIR_MODE,
                modified: None,
            },
            Node::File { data, modified } => FileMeta {
                len: data.len() as u64,
                is_dir: false,
                mode: FILE_MODE,
                modified: Some(*modified),
            },
        }
    }
}

/// Ephemeral file store
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    nodes: RwLock<BTreeMap<PathBuf, Node>>,
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("no such file or directory: {}", path.display()),
    )
}

fn poisoned() -> io::Error {
    io::Error::new(io::ErrorKind::Other, "memory store lock poisoned")
}

impl MemoryFileStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries (files and directories)
    pub fn len(&self) -> usize {
        self.nodes.read().map(|n| n.len()).unwrap_or(0)
    }

    /// Whether the store holds nothing
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, path: &Path) -> io::Result<Node> {
        let key = normalize(path)?;
        if key.as_os_str().is_empty() {
            return Ok(Node::Dir);
        }
        let nodes = self.nodes.read().map_err(|_| poisoned())?;
        nodes.get(&key).cloned().ok_or_else(|| not_found(path))
    }

    fn parent_is_dir(nodes: &BTreeMap<PathBuf, Node>, key: &Path) -> bool {
        match key.parent() {
            None => true,
            Some(parent) if parent.as_os_str().is_empty() => true,
            Some(parent) => matches!(nodes.get(parent), Some(Node::Dir)),
        }
    }
}

impl FileStore for MemoryFileStore {
    fn stat(&self, path: &Path) -> io::Result<FileMeta> {
        Ok(self.get(path)?.meta())
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send + '_>> {
        match self.get(path)? {
            Node::File { data, .. } => Ok(Box::new(Cursor::new(data))),
            Node::Dir => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("is a directory: {}", path.display()),
            )),
        }
    }

    fn write_from(&self, path: &Path, reader: &mut dyn Read) -> io::Result<u64> {
        let key = normalize(path)?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        let written = data.len() as u64;

        let mut nodes = self.nodes.write().map_err(|_| poisoned())?;
        if !Self::parent_is_dir(&nodes, &key) {
            return Err(not_found(key.parent().unwrap_or(&key)));
        }
        if matches!(nodes.get(&key), Some(Node::Dir)) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("is a directory: {}", path.display()),
            ));
        }
        nodes.insert(
            key,
            Node::File {
                data,
                modified: SystemTime::now(),
            },
        );
        Ok(written)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        let key = normalize(path)?;
        let mut nodes = self.nodes.write().map_err(|_| poisoned())?;

        let mut current = PathBuf::new();
        for component in key.components() {
            current.push(component);
            match nodes.get(&current) {
                Some(Node::Dir) => {}
                Some(Node::File { .. }) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("not a directory: {}", current.display()),
                    ));
                }
                None => {
                    nodes.insert(current.clone(), Node::Dir);
                }
            }
        }
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        let key = normalize(path)?;
        let mut nodes = self.nodes.write().map_err(|_| poisoned())?;

        let has_children = nodes
            .range(key.clone()..)
            .nth(1)
            .map(|(child, _)| child.starts_with(&key))
            .unwrap_or(false);
        if has_children {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("directory not empty: {}", path.display()),
            ));
        }
        nodes.remove(&key).map(|_| ()).ok_or_else(|| not_found(path))
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let from_key = normalize(from)?;
        let to_key = normalize(to)?;
        let mut nodes = self.nodes.write().map_err(|_| poisoned())?;

        if !nodes.contains_key(&from_key) {
            return Err(not_found(from));
        }
        if !Self::parent_is_dir(&nodes, &to_key) {
            return Err(not_found(to_key.parent().unwrap_or(&to_key)));
        }

        let moved: Vec<PathBuf> = nodes
            .range(from_key.clone()..)
            .take_while(|(k, _)| k.starts_with(&from_key))
            .map(|(k, _)| k.clone())
            .collect();
        for old in moved {
            if let Some(node) = nodes.remove(&old) {
                let suffix = old.strip_prefix(&from_key).unwrap_or(Path::new(""));
                nodes.insert(to_key.join(suffix), node);
            }
        }
        Ok(())
    }

    fn walk(&self, path: &Path) -> io::Result<Vec<WalkEntry>> {
        let key = normalize(path)?;
        let root = self.get(&key)?;
        let nodes = self.nodes.read().map_err(|_| poisoned())?;

        let mut entries = vec![WalkEntry {
            path: key.clone(),
            meta: root.meta(),
        }];
        entries.extend(
            nodes
                .range(key.clone()..)
                .filter(|(k, _)| **k != key && k.starts_with(&key))
                .take_while(|(k, _)| k.starts_with(&key))
                .map(|(k, node)| WalkEntry {
                    path: k.clone(),
                    meta: node.meta(),
                }),
        );
        Ok(entries)
    }
}
