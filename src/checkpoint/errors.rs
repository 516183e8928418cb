//! Checkpoint error types
//!
//! A checkpoint failure aborts the backup attempt before any archive byte
//! is written. Codes follow the `SMARTICKY_CHECKPOINT_*` format.

use std::fmt;

/// Checkpoint error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointErrorCode {
    /// The database file could not be opened
    SmartickyCheckpointOpenFailed,
    /// Another connection held a lock and the log was not fully flushed
    SmartickyCheckpointBusy,
    /// The checkpoint pragma itself failed
    SmartickyCheckpointFailed,
}

impl CheckpointErrorCode {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            CheckpointErrorCode::SmartickyCheckpointOpenFailed => {
                "SMARTICKY_CHECKPOINT_OPEN_FAILED"
            }
            CheckpointErrorCode::SmartickyCheckpointBusy => "SMARTICKY_CHECKPOINT_BUSY",
            CheckpointErrorCode::SmartickyCheckpointFailed => "SMARTICKY_CHECKPOINT_FAILED",
        }
    }
}

impl fmt::Display for CheckpointErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Checkpoint error with context
#[derive(Debug)]
pub struct CheckpointError {
    code: CheckpointErrorCode,
    message: String,
    source: Option<rusqlite::Error>,
}

impl CheckpointError {
    fn new(
        code: CheckpointErrorCode,
        message: impl Into<String>,
        source: Option<rusqlite::Error>,
    ) -> Self {
        Self {
            code,
            message: message.into(),
            source,
        }
    }

    /// Database could not be opened
    pub fn open_failed(message: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::new(
            CheckpointErrorCode::SmartickyCheckpointOpenFailed,
            message,
            Some(source),
        )
    }

    /// Log could not be fully checkpointed because of a concurrent lock
    pub fn busy(message: impl Into<String>) -> Self {
        Self::new(CheckpointErrorCode::SmartickyCheckpointBusy, message, None)
    }

    /// General checkpoint failure
    pub fn failed(message: impl Into<String>) -> Self {
        Self::new(CheckpointErrorCode::SmartickyCheckpointFailed, message, None)
    }

    /// General checkpoint failure with a driver error
    pub fn failed_with_source(message: impl Into<String>, source: rusqlite::Error) -> Self {
        Self::new(
            CheckpointErrorCode::SmartickyCheckpointFailed,
            message,
            Some(source),
        )
    }

    /// Returns the error code
    pub fn code(&self) -> CheckpointErrorCode {
        self.code
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for CheckpointError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for CheckpointError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for checkpoint operations
pub type CheckpointResult<T> = Result<T, CheckpointError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(
            CheckpointErrorCode::SmartickyCheckpointBusy.as_str(),
            "SMARTICKY_CHECKPOINT_BUSY"
        );
        assert_eq!(
            CheckpointError::failed("x").code(),
            CheckpointErrorCode::SmartickyCheckpointFailed
        );
    }

    #[test]
    fn test_display_includes_cause() {
        let err = CheckpointError::failed_with_source(
            "wal checkpoint failed",
            rusqlite::Error::InvalidQuery,
        );
        let display = err.to_string();
        assert!(display.starts_with("wal checkpoint failed"));
        assert!(display.contains("caused by"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_busy_has_no_source() {
        let err = CheckpointError::busy("database is locked");
        assert_eq!(err.message(), "database is locked");
        assert!(std::error::Error::source(&err).is_none());
    }
}
