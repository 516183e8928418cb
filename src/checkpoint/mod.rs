//! Consistency checkpoint
//!
//! Before the archive codec reads `smarticky.db`, the database engine must
//! flush its write-ahead log into the main file, otherwise the archived copy
//! can miss the most recent committed transactions.
//!
//! The operation is synchronous, idempotent, and safe with no pending writes.

mod errors;
mod sqlite;

pub use errors::{CheckpointError, CheckpointErrorCode, CheckpointResult};
pub use sqlite::SqliteCheckpoint;

use std::fmt;

/// Flushes pending database writes into the primary file
pub trait Checkpoint: Send + Sync + fmt::Debug {
    /// Checkpoint and truncate the write-ahead log
    fn checkpoint(&self) -> CheckpointResult<()>;
}
