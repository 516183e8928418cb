//! Observability subsystem for Smarticky backups
//!
//! Installs the process-wide `tracing` subscriber. Everything else in the
//! crate logs through `tracing` macros with structured fields.
//!
//! # Principles
//!
//! 1. Observability is read-only
//! 2. Observability failure never stops a backup
//! 3. Secrets never reach a log line
//!
//! # Usage
//!
//! ```ignore
//! use smarticky_backup::observability::init_logging;
//!
//! let _guard = init_logging(&config.log, &config.data_dir)?;
//! tracing::info!(backend = "webdav", "backup uploaded");
//! ```

mod logging;

pub use logging::{filter_directive, init_logging, LOG_ENV, LOG_FILE};

use std::fmt;
use std::io;

/// Observability error code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservabilityErrorCode {
    /// The log directory could not be created
    SmartickyLogDirFailed,
    /// A global subscriber was already installed or the filter is invalid
    SmartickySubscriberFailed,
}

impl ObservabilityErrorCode {
    /// Returns the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            ObservabilityErrorCode::SmartickyLogDirFailed => "SMARTICKY_LOG_DIR_FAILED",
            ObservabilityErrorCode::SmartickySubscriberFailed => "SMARTICKY_SUBSCRIBER_FAILED",
        }
    }
}

impl fmt::Display for ObservabilityErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Observability error
///
/// Never fatal: callers report it on stderr and keep running.
#[derive(Debug)]
pub struct ObservabilityError {
    code: ObservabilityErrorCode,
    message: String,
    source: Option<io::Error>,
}

impl ObservabilityError {
    /// Log directory could not be created
    pub fn log_dir(message: impl Into<String>, source: io::Error) -> Self {
        Self {
            code: ObservabilityErrorCode::SmartickyLogDirFailed,
            message: message.into(),
            source: Some(source),
        }
    }

    /// Subscriber could not be installed
    pub fn subscriber(message: impl Into<String>) -> Self {
        Self {
            code: ObservabilityErrorCode::SmartickySubscriberFailed,
            message: message.into(),
            source: None,
        }
    }

    /// Get the error code
    pub fn code(&self) -> ObservabilityErrorCode {
        self.code
    }

    /// Get the message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ObservabilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[ERROR] {}: {}", self.code, self.message)?;
        if let Some(ref source) = self.source {
            write!(f, " (caused by: {})", source)?;
        }
        Ok(())
    }
}

impl std::error::Error for ObservabilityError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e as &(dyn std::error::Error + 'static))
    }
}

/// Result type for observability operations
pub type ObservabilityResult<T> = Result<T, ObservabilityError>;
