//! Subscriber setup
//!
//! Two sinks share one filter: stderr (text or JSON lines) and a
//! daily-rolling plain-text file under `<data_dir>/logs/`. Stdout stays free
//! for command output.
//!
//! Filter precedence:
//! 1. `SMARTICKY_LOG` when set (full `EnvFilter` syntax)
//! 2. `debug` when `DEBUG` is set to anything but `""`, `0` or `false`
//! 3. The configured level

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use super::{ObservabilityError, ObservabilityResult};
use crate::config::LogConfig;

/// Environment variable holding an explicit filter
pub const LOG_ENV: &str = "SMARTICKY_LOG";

/// File name prefix of the rolling log
pub const LOG_FILE: &str = "smarticky.log";

/// Pick the filter directive from the environment and `config`.
pub fn filter_directive(config: &LogConfig, lookup: impl Fn(&str) -> Option<String>) -> String {
    if let Some(directive) = lookup(LOG_ENV).filter(|v| !v.trim().is_empty()) {
        return directive;
    }
    let debug = lookup("DEBUG")
        .map(|v| !matches!(v.trim(), "" | "0" | "false"))
        .unwrap_or(false);
    if debug {
        return "debug".to_string();
    }
    config.level.clone()
}

/// Install the global subscriber.
///
/// The returned guard flushes the file writer on drop; keep it alive for the
/// life of the process.
pub fn init_logging(config: &LogConfig, data_dir: &Path) -> ObservabilityResult<WorkerGuard> {
    let log_dir = data_dir.join("logs");
    std::fs::create_dir_all(&log_dir).map_err(|e| {
        ObservabilityError::log_dir(format!("cannot create {}", log_dir.display()), e)
    })?;

    let directive = filter_directive(config, |key| std::env::var(key).ok());
    let filter = EnvFilter::try_new(&directive).map_err(|e| {
        ObservabilityError::subscriber(format!("invalid log filter {:?}: {}", directive, e))
    })?;

    let (file_writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(&log_dir, LOG_FILE));
    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true);

    let json_layer = config.json.then(|| {
        fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .with_target(true)
    });
    let text_layer =
        (!config.json).then(|| fmt::layer().with_writer(std::io::stderr).with_target(true));

    Registry::default()
        .with(filter)
        .with(json_layer)
        .with(text_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| ObservabilityError::subscriber(e.to_string()))?;

    tracing::debug!(filter = %directive, dir = %log_dir.display(), "logging initialised");
    Ok(guard)
}
