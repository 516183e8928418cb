//! SQLite WAL checkpoint

use std::path::{Path, PathBuf};

use rusqlite::{Connection, OpenFlags};
use tracing::debug;

use super::{Checkpoint, CheckpointError, CheckpointResult};

/// Runs `PRAGMA wal_checkpoint(TRUNCATE)` on a short-lived connection
#[derive(Debug, Clone)]
pub struct SqliteCheckpoint {
    db_path: PathBuf,
}

impl SqliteCheckpoint {
    pub fn new(db_path: impl Into<PathBuf>) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

impl Checkpoint for SqliteCheckpoint {
    fn checkpoint(&self) -> CheckpointResult<()> {
        // Never create: a missing database must fail the backup.
        let conn = Connection::open_with_flags(
            &self.db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            CheckpointError::open_failed(
                format!("failed to open database {}", self.db_path.display()),
                e,
            )
        })?;

        let (busy, log_frames, checkpointed): (i64, i64, i64) = conn
            .query_row("PRAGMA wal_checkpoint(TRUNCATE)", [], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .map_err(|e| CheckpointError::failed_with_source("wal checkpoint failed", e))?;

        if busy != 0 {
            return Err(CheckpointError::busy(format!(
                "database busy, {} of {} log frames checkpointed",
                checkpointed, log_frames
            )));
        }

        debug!(
            db = %self.db_path.display(),
            frames = checkpointed,
            "wal checkpoint complete"
        );
        Ok(())
    }
}
