//! Shared fakes for the integration tests
//!
//! - `MemoryBackend`: in-memory `StorageBackend` with failure injection and
//!   a one-shot write gate; logs `<kind> write|read <name>` once a call completes
//! - `FakeBackends`: factory handing out one `MemoryBackend` per kind
//! - `RecordingCheckpoint`: logs checkpoints into a shared event list
//! - `RecordingStore`: `FileStore` wrapper that logs opens and every mutation
//! - `FixedClock`: settable clock

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Notify;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use sha2::{Digest, Sha256};
use tempfile::TempDir;

use smarticky_backup::backup::{BackupEngine, BackupError, BackupResult, Clock};
use smarticky_backup::checkpoint::{Checkpoint, CheckpointError, CheckpointResult};
use smarticky_backup::config::{BackupConfig, MemoryConfigStore};
use smarticky_backup::file_store::{FileMeta, FileStore, LocalFileStore, WalkEntry};
use smarticky_backup::remote::{BackendFactory, BackendKind, RemoteEntry, StorageBackend};

pub type Events = Arc<Mutex<Vec<String>>>;

// ==================
// Clock
// ==================

#[derive(Debug)]
pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn at(now: DateTime<Utc>) -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(now),
        })
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 14, 2, 0, 0).unwrap()
}

// ==================
// Remote backends
// ==================

#[derive(Debug)]
pub struct MemoryBackend {
    kind: BackendKind,
    clock: Arc<FixedClock>,
    events: Events,
    objects: Mutex<BTreeMap<String, (Vec<u8>, DateTime<Utc>)>>,
    fail_writes: AtomicBool,
    write_gate: Mutex<Option<WriteGate>>,
}

/// Parks the next write until `release` is notified
#[derive(Debug, Clone)]
pub struct WriteGate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

impl MemoryBackend {
    pub fn new(kind: BackendKind, clock: Arc<FixedClock>, events: Events) -> Arc<Self> {
        Arc::new(Self {
            kind,
            clock,
            events,
            objects: Mutex::new(BTreeMap::new()),
            fail_writes: AtomicBool::new(false),
            write_gate: Mutex::new(None),
        })
    }

    /// Hold the next write: `entered` fires when it arrives, and it
    /// completes only after `release` is notified.
    pub fn hold_next_write(&self) -> WriteGate {
        let gate = WriteGate {
            entered: Arc::new(Notify::new()),
            release: Arc::new(Notify::new()),
        };
        *self.write_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    fn record(&self, op: &str, name: &str) {
        self.events
            .lock()
            .unwrap()
            .push(format!("{} {} {}", self.kind, op, name));
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn insert(&self, name: &str, data: Vec<u8>, modified: DateTime<Utc>) {
        self.objects
            .lock()
            .unwrap()
            .insert(name.to_string(), (data, modified));
    }

    pub fn names(&self) -> Vec<String> {
        self.objects.lock().unwrap().keys().cloned().collect()
    }

    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        self.objects.lock().unwrap().get(name).map(|(d, _)| d.clone())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn kind(&self) -> BackendKind {
        self.kind
    }

    async fn write(&self, name: &str, data: Vec<u8>) -> BackupResult<()> {
        let gate = self.write_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(BackupError::transport(self.kind, "connection refused"));
        }
        self.insert(name, data, self.clock.now());
        self.record("write", name);
        Ok(())
    }

    async fn read(&self, name: &str) -> BackupResult<Vec<u8>> {
        let data = self.get(name).ok_or_else(|| BackupError::NotFound {
            backend: self.kind,
            name: name.to_string(),
        })?;
        self.record("read", name);
        Ok(data)
    }

    async fn list(&self, prefix: &str) -> BackupResult<Vec<RemoteEntry>> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name.starts_with(prefix))
            .map(|(name, (data, modified))| RemoteEntry {
                name: name.clone(),
                size: data.len() as u64,
                modified: *modified,
            })
            .collect())
    }

    async fn delete(&self, name: &str) -> BackupResult<()> {
        self.objects.lock().unwrap().remove(name);
        Ok(())
    }
}

#[derive(Debug)]
pub struct FakeBackends {
    pub webdav: Arc<MemoryBackend>,
    pub s3: Arc<MemoryBackend>,
}

impl BackendFactory for FakeBackends {
    fn open(
        &self,
        kind: BackendKind,
        config: &BackupConfig,
    ) -> BackupResult<Arc<dyn StorageBackend>> {
        config.require_access(kind)?;
        let backend: Arc<dyn StorageBackend> = match kind {
            BackendKind::WebDav => self.webdav.clone(),
            BackendKind::S3 => self.s3.clone(),
        };
        Ok(backend)
    }
}

// ==================
// Checkpoint and file store
// ==================

#[derive(Debug)]
pub struct RecordingCheckpoint {
    events: Events,
    fail: AtomicBool,
}

impl RecordingCheckpoint {
    pub fn new(events: Events) -> Arc<Self> {
        Arc::new(Self {
            events,
            fail: AtomicBool::new(false),
        })
    }

    pub fn fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl Checkpoint for RecordingCheckpoint {
    fn checkpoint(&self) -> CheckpointResult<()> {
        self.events.lock().unwrap().push("checkpoint".to_string());
        if self.fail.load(Ordering::SeqCst) {
            return Err(CheckpointError::busy("database is locked"));
        }
        Ok(())
    }
}

/// Logs `open <path>` for every file read through the store, and
/// `write|mkdir|remove|rename <path>` for every change
#[derive(Debug)]
pub struct RecordingStore {
    inner: LocalFileStore,
    events: Events,
}

impl RecordingStore {
    fn record(&self, op: &str, path: &Path) {
        self.events
            .lock()
            .unwrap()
            .push(format!("{} {}", op, path.display()));
    }
}

impl FileStore for RecordingStore {
    fn stat(&self, path: &Path) -> io::Result<FileMeta> {
        self.inner.stat(path)
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn Read + Send + '_>> {
        self.record("open", path);
        self.inner.open(path)
    }

    fn write_from(&self, path: &Path, reader: &mut dyn Read) -> io::Result<u64> {
        self.record("write", path);
        self.inner.write_from(path, reader)
    }

    fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        self.record("mkdir", path);
        self.inner.create_dir_all(path)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        self.record("remove", path);
        self.inner.remove(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        self.record("rename", to);
        self.inner.rename(from, to)
    }

    fn walk(&self, path: &Path) -> io::Result<Vec<WalkEntry>> {
        self.inner.walk(path)
    }
}

// ==================
// Harness
// ==================

pub struct Harness {
    pub temp: TempDir,
    pub engine: Arc<BackupEngine>,
    pub webdav: Arc<MemoryBackend>,
    pub s3: Arc<MemoryBackend>,
    pub clock: Arc<FixedClock>,
    pub checkpoint: Arc<RecordingCheckpoint>,
    pub events: Events,
}

impl Harness {
    /// Data directory with a database and two uploads
    pub fn new(config: BackupConfig) -> Self {
        let temp = TempDir::new().unwrap();
        let data = temp.path();
        std::fs::write(data.join("smarticky.db"), b"SQLite format 3\0notes v1").unwrap();
        std::fs::create_dir_all(data.join("uploads/2026")).unwrap();
        std::fs::write(data.join("uploads/avatar.png"), b"png bytes").unwrap();
        std::fs::write(data.join("uploads/2026/scan.pdf"), b"pdf bytes").unwrap();

        let events: Events = Arc::new(Mutex::new(Vec::new()));
        let clock = FixedClock::at(start_time());
        let webdav = MemoryBackend::new(BackendKind::WebDav, clock.clone(), events.clone());
        let s3 = MemoryBackend::new(BackendKind::S3, clock.clone(), events.clone());
        let checkpoint = RecordingCheckpoint::new(events.clone());

        let engine = BackupEngine::new(
            Arc::new(RecordingStore {
                inner: LocalFileStore::new(data),
                events: events.clone(),
            }),
            checkpoint.clone(),
            Arc::new(MemoryConfigStore::with(config)),
            Arc::new(FakeBackends {
                webdav: webdav.clone(),
                s3: s3.clone(),
            }),
        )
        .with_clock(clock.clone());

        Self {
            temp,
            engine: Arc::new(engine),
            webdav,
            s3,
            clock,
            checkpoint,
            events,
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.temp.path().to_path_buf()
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear_events(&self) {
        self.events.lock().unwrap().clear();
    }

    /// sha256 of every file under the data directory that belongs in a backup
    pub fn digest(&self) -> BTreeMap<String, String> {
        let root = self.data_dir();
        let mut out = BTreeMap::new();
        let db = root.join("smarticky.db");
        out.insert("smarticky.db".to_string(), sha256_file(&db));
        for entry in walkdir::WalkDir::new(root.join("uploads")).sort_by_file_name() {
            let entry = entry.unwrap();
            if entry.file_type().is_file() {
                let rel = entry.path().strip_prefix(&root).unwrap();
                out.insert(rel.display().to_string(), sha256_file(entry.path()));
            }
        }
        out
    }
}

pub fn sha256_file(path: &Path) -> String {
    hex::encode(Sha256::digest(std::fs::read(path).unwrap()))
}

pub fn webdav_config() -> BackupConfig {
    BackupConfig {
        webdav_url: "https://dav.example.com/backups".into(),
        webdav_user: "alice".into(),
        webdav_password: "secret".into(),
        ..Default::default()
    }
}

pub fn full_config() -> BackupConfig {
    BackupConfig {
        s3_endpoint: "http://minio:9000".into(),
        s3_region: "us-east-1".into(),
        s3_bucket: "notes".into(),
        s3_access_key: "AKIA".into(),
        s3_secret_key: "shh".into(),
        ..webdav_config()
    }
}
