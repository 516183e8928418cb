//! Backup scheduler
//!
//! A single background task wakes on a cron expression (default
//! `0 2 * * *`, local time) and decides whether to run an automatic backup:
//!
//! - auto backup disabled: nothing
//! - `daily`: always
//! - `weekly`: only on the configured weekday
//! - `manual`: never
//!
//! Failures are logged and never surfaced elsewhere.

use std::sync::Arc;

use chrono::{DateTime, Datelike, Local, TimeZone, Weekday};
use croner::Cron;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backup::{BackupEngine, BackupError, BackupOutcome, BackupResult};
use crate::config::{BackupConfig, BackupSchedule, SchedulerConfig};

/// What one tick did
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    /// Auto backup is switched off
    Disabled,
    /// The schedule does not fire today
    Skipped(BackupSchedule),
    Completed(BackupOutcome),
    Failed(String),
}

/// Whether the schedule fires on a day that is `today`
pub fn should_run(config: &BackupConfig, today: Weekday, weekly_day: Weekday) -> bool {
    if !config.auto_backup_enabled {
        return false;
    }
    match config.backup_schedule {
        BackupSchedule::Daily => true,
        BackupSchedule::Weekly => today == weekly_day,
        BackupSchedule::Manual => false,
    }
}

/// Cron-driven automatic backups
#[derive(Debug)]
pub struct BackupScheduler {
    engine: Arc<BackupEngine>,
    cron: Cron,
    weekly_day: Weekday,
}

impl BackupScheduler {
    pub fn new(engine: Arc<BackupEngine>, config: &SchedulerConfig) -> BackupResult<Self> {
        let cron = config
            .parse_cron()
            .map_err(|e| BackupError::configuration(e.to_string()))?;
        Ok(Self {
            engine,
            cron,
            weekly_day: config.weekly_day,
        })
    }

    /// Next wake-up strictly after `after`
    pub fn next_run<Tz: TimeZone>(&self, after: &DateTime<Tz>) -> Option<DateTime<Tz>> {
        self.cron.find_next_occurrence(after, false).ok()
    }

    /// Evaluate the persisted config at `now` and run a backup if due
    pub async fn tick<Tz: TimeZone>(&self, now: &DateTime<Tz>) -> TickOutcome {
        let today = now.weekday();
        let config = match self.engine.config().await {
            Ok(config) => config,
            Err(e) => {
                error!(error = %e, "scheduler could not load backup configuration");
                return TickOutcome::Failed(e.to_string());
            }
        };

        if !config.auto_backup_enabled {
            debug!("auto backup disabled");
            return TickOutcome::Disabled;
        }
        if !should_run(&config, today, self.weekly_day) {
            debug!(schedule = %config.backup_schedule, "automatic backup not due");
            return TickOutcome::Skipped(config.backup_schedule);
        }

        info!(schedule = %config.backup_schedule, "automatic backup starting");
        match self.engine.run_automatic().await {
            Ok(outcome) => {
                info!(backend = %outcome.backend, file = %outcome.file, "automatic backup completed");
                TickOutcome::Completed(outcome)
            }
            Err(e) => {
                error!(error = %e, "automatic backup failed on every configured backend");
                TickOutcome::Failed(e.to_string())
            }
        }
    }

    /// Run until `cancel` fires
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(weekly_day = %self.weekly_day, "backup scheduler started");
            loop {
                let now = Local::now();
                let Some(next) = self.next_run(&now) else {
                    warn!("cron expression has no future occurrence, scheduler stopping");
                    return;
                };
                let wait = (next - now).to_std().unwrap_or_default();
                debug!(next = %next, "scheduler sleeping");

                tokio::select! {
                    _ = cancel.cancelled() => {
                        info!("backup scheduler stopped");
                        return;
                    }
                    _ = tokio::time::sleep(wait) => {}
                }

                self.tick(&next).await;
            }
        })
    }
}
