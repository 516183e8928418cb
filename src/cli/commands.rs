//! CLI command implementations
//!
//! Every command follows the same boot sequence:
//!
//! 1. Load `AppConfig` (file, then environment)
//! 2. Install logging (failure is reported and ignored)
//! 3. Build the `BackupEngine` over the data directory
//! 4. Run the command on a tokio runtime
//!
//! One-shot commands print a single JSON object on stdout.

use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;

use crate::backup::BackupEngine;
use crate::config::{AppConfig, BackupConfigUpdate};
use crate::http_server::HttpServer;
use crate::observability::init_logging;
use crate::remote::BackendKind;
use crate::scheduler::BackupScheduler;

use super::args::{Cli, Command};
use super::errors::{CliError, CliResult};
use super::io::{write_error, write_response};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = Cli::parse_args();
    run_command(cli.config.as_deref(), cli.command)
}

/// Run one command against the configuration at `config_path`
pub fn run_command(config_path: Option<&Path>, cmd: Command) -> CliResult<()> {
    let mut config = AppConfig::load(config_path)?;
    if let Command::Serve { port: Some(port) } = cmd {
        config.server.port = port;
    }
    let _guard = start_logging(&config);

    let engine = Arc::new(BackupEngine::from_app_config(&config)?);
    let runtime = tokio::runtime::Runtime::new()
        .map_err(|e| CliError::boot_failed(format!("Failed to create tokio runtime: {}", e)))?;

    let result = runtime.block_on(async {
        match cmd {
            Command::Serve { .. } => serve(&config, engine).await,
            Command::Backup { backend } => backup(&engine, &backend).await,
            Command::List { backend } => list(&engine, &backend).await,
            Command::Verify { backend, filename } => verify(&engine, &backend, &filename).await,
            Command::Restore { backend, filename } => restore(&engine, &backend, &filename).await,
            Command::Config { update } => show_config(&engine, update.as_deref()).await,
        }
    });

    if let Err(ref e) = result {
        write_error(e.code_str(), e.message())?;
    }
    result
}

fn start_logging(config: &AppConfig) -> Option<WorkerGuard> {
    match init_logging(&config.log, &config.data_dir) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("logging disabled: {}", e);
            None
        }
    }
}

fn parse_backend(raw: &str) -> CliResult<BackendKind> {
    Ok(raw.parse::<BackendKind>()?)
}

/// Serve the HTTP API and the scheduler until Ctrl-C
pub async fn serve(config: &AppConfig, engine: Arc<BackupEngine>) -> CliResult<()> {
    let shutdown = engine.cancellation_token();
    let scheduler = BackupScheduler::new(Arc::clone(&engine), &config.scheduler)?;
    let scheduler_task = scheduler.spawn(shutdown.clone());

    tokio::spawn(wait_for_signal(shutdown.clone()));

    let server = HttpServer::new(config.server.clone(), Arc::clone(&engine));
    info!(
        addr = %server.socket_addr(),
        data_dir = %config.data_dir.display(),
        "smarticky backup service starting"
    );
    let served = server.start(shutdown.clone()).await;

    engine.shutdown();
    if let Err(e) = scheduler_task.await {
        warn!(error = %e, "scheduler task ended abnormally");
    }

    served.map_err(|e| CliError::boot_failed(format!("HTTP server failed: {}", e)))
}

async fn wait_for_signal(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            info!("shutdown requested");
            shutdown.cancel();
        }
        Err(e) => warn!(error = %e, "cannot listen for shutdown signal"),
    }
}

/// Take a manual backup
pub async fn backup(engine: &BackupEngine, backend: &str) -> CliResult<()> {
    let outcome = engine.backup(parse_backend(backend)?).await?;
    write_response(&serde_json::json!({
        "message": "backup successful",
        "file": outcome.file,
        "size": outcome.size,
    }))
}

/// List remote backups
pub async fn list(engine: &BackupEngine, backend: &str) -> CliResult<()> {
    let backups = engine.list(parse_backend(backend)?).await?;
    write_response(&serde_json::json!({ "backups": backups }))
}

/// Verify a remote backup
pub async fn verify(engine: &BackupEngine, backend: &str, filename: &str) -> CliResult<()> {
    let result = engine.verify(parse_backend(backend)?, filename).await?;
    write_response(&result)
}

/// Restore a remote backup over the data directory
pub async fn restore(engine: &BackupEngine, backend: &str, filename: &str) -> CliResult<()> {
    let outcome = engine.restore(parse_backend(backend)?, filename).await?;
    write_response(&serde_json::json!({
        "message": "restore successful",
        "warning": outcome.warning,
        "restart_required": outcome.restart_required,
        "safety_snapshot": outcome.safety_snapshot,
    }))
}

/// Print the backup configuration, applying `update` first when given
pub async fn show_config(engine: &BackupEngine, update: Option<&str>) -> CliResult<()> {
    let config = match update {
        Some(raw) => {
            let update: BackupConfigUpdate = serde_json::from_str(raw)
                .map_err(|e| CliError::config_error(format!("Invalid update JSON: {}", e)))?;
            engine.update_config(update).await?
        }
        None => engine.config().await?,
    };
    write_response(&config)
}
