//! Backup configuration persistence

use std::fmt;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::BackupConfig;
use crate::backup::{BackupError, BackupResult};

/// File name of the persisted configuration inside the data directory
pub const CONFIG_FILE: &str = "backup_config.json";

/// Storage for the `BackupConfig` singleton
pub trait ConfigStore: Send + Sync + fmt::Debug {
    /// The stored configuration, or `None` if nothing was saved yet
    fn load(&self) -> BackupResult<Option<BackupConfig>>;

    /// Replace the stored configuration
    fn save(&self, config: &BackupConfig) -> BackupResult<()>;
}

/// JSON file store, replaced atomically on every save
#[derive(Debug, Clone)]
pub struct JsonConfigStore {
    path: PathBuf,
}

impl JsonConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `<data_dir>/backup_config.json`
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(CONFIG_FILE))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_atomic(&self, bytes: &[u8]) -> io::Result<()> {
        let mut temp = self.path.clone().into_os_string();
        temp.push(".tmp");
        let temp = PathBuf::from(temp);

        let mut file = File::create(&temp)?;
        file.write_all(bytes)?;
        file.sync_all()?;
        fs::rename(&temp, &self.path)
    }
}

impl ConfigStore for JsonConfigStore {
    fn load(&self) -> BackupResult<Option<BackupConfig>> {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(BackupError::ConfigStore(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };
        serde_json::from_slice(&bytes).map(Some).map_err(|e| {
            BackupError::ConfigStore(format!("failed to parse {}: {}", self.path.display(), e))
        })
    }

    fn save(&self, config: &BackupConfig) -> BackupResult<()> {
        let bytes = serde_json::to_vec_pretty(config)
            .map_err(|e| BackupError::ConfigStore(format!("failed to encode config: {}", e)))?;
        self.write_atomic(&bytes).map_err(|e| {
            BackupError::ConfigStore(format!("failed to write {}: {}", self.path.display(), e))
        })
    }
}

/// Non-persistent store
#[derive(Debug, Default)]
pub struct MemoryConfigStore {
    config: Mutex<Option<BackupConfig>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-seeded store
    pub fn with(config: BackupConfig) -> Self {
        Self {
            config: Mutex::new(Some(config)),
        }
    }
}

impl ConfigStore for MemoryConfigStore {
    fn load(&self) -> BackupResult<Option<BackupConfig>> {
        self.config
            .lock()
            .map(|c| c.clone())
            .map_err(|_| BackupError::ConfigStore("config lock poisoned".into()))
    }

    fn save(&self, config: &BackupConfig) -> BackupResult<()> {
        let mut guard = self
            .config
            .lock()
            .map_err(|_| BackupError::ConfigStore("config lock poisoned".into()))?;
        *guard = Some(config.clone());
        Ok(())
    }
}
