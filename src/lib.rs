//! smarticky-backup - backup and restore engine for the Smarticky notes server
//!
//! Archives the data directory (`smarticky.db` plus `uploads/`) into a gzip
//! tar file, ships it to WebDAV or S3-compatible storage, prunes old copies,
//! verifies archives, and restores them behind a pre-restore safety snapshot.
//!
//! # Layout
//!
//! - [`file_store`]: data directory access, real or in-memory
//! - [`archive`]: archive codec and backup file names
//! - [`checkpoint`]: SQLite WAL checkpoint before every archive
//! - [`remote`]: WebDAV and S3 storage backends
//! - [`config`]: persisted backup settings and process configuration
//! - [`backup`]: the engine, retention and verification
//! - [`restore`]: restore orchestration
//! - [`scheduler`]: cron-driven automatic backups
//! - [`http_server`]: REST API
//! - [`observability`]: logging setup
//! - [`cli`]: command line

pub mod archive;
pub mod backup;
pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod file_store;
pub mod http_server;
pub mod observability;
pub mod remote;
pub mod restore;
pub mod scheduler;
