//! # HTTP Server Module
//!
//! REST surface for the backup engine: configuration, manual backups,
//! listing, verification and restore under `/api`, plus `/health`.

mod backup_routes;
mod config;
mod health_routes;
mod server;

pub use backup_routes::{backup_routes, BackupState, ErrorResponse};
pub use config::HttpServerConfig;
pub use health_routes::{health_routes, HealthResponse};
pub use server::HttpServer;
