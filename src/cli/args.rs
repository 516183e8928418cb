//! CLI argument definitions using clap
//!
//! Commands:
//! - smarticky-backup serve [--port <port>]
//! - smarticky-backup backup <backend>
//! - smarticky-backup list <backend>
//! - smarticky-backup verify <backend> <filename>
//! - smarticky-backup restore <backend> <filename>
//! - smarticky-backup config [--update <json>]

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Smarticky backup and restore engine
#[derive(Parser, Debug)]
#[command(name = "smarticky-backup")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a JSON configuration file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the backup API and run the scheduler
    Serve {
        /// Port to listen on (overrides config and PORT)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Take a manual backup now
    Backup {
        /// Target backend: webdav or s3
        backend: String,
    },

    /// List backups on a backend, newest first
    List {
        /// Backend to list: webdav or s3
        backend: String,
    },

    /// Download a backup and check its contents
    Verify {
        /// Backend holding the archive
        backend: String,
        /// Archive file name
        filename: String,
    },

    /// Restore a backup over the data directory
    Restore {
        /// Backend holding the archive
        backend: String,
        /// Archive file name
        filename: String,
    },

    /// Show the backup configuration, optionally applying a partial update
    Config {
        /// JSON object with the fields to change
        #[arg(long)]
        update: Option<String>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }
}
