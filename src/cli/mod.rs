//! CLI module for Smarticky backups
//!
//! Provides command-line interface for:
//! - serve: HTTP API plus the automatic backup scheduler
//! - backup, list, verify, restore: one-shot engine operations
//! - config: show or update the backup configuration

mod args;
mod commands;
mod errors;
mod io;

pub use args::{Cli, Command};
pub use commands::{backup, list, restore, run, run_command, serve, show_config, verify};
pub use errors::{CliError, CliErrorCode, CliResult};
pub use io::{write_error, write_response};
