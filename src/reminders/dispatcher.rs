use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};

use super::scheduler::ReminderScheduler;
use super::store::{ReminderJob, ReminderKey};

/// Delivery channel for due reminders.
#[mockall::automock]
#[async_trait]
pub trait ReminderNotifier: Send + Sync {
    async fn notify(&self, job: &ReminderJob) -> Result<()>;
}

/// Writes reminders to the log.
pub struct LogNotifier;

#[async_trait]
impl ReminderNotifier for LogNotifier {
    async fn notify(&self, job: &ReminderJob) -> Result<()> {
        info!(user_id = %job.key.user_id, block = %job.key.block_label, "{}", job.message);
        Ok(())
    }
}

pub struct ReminderDispatcher {
    scheduler: Arc<ReminderScheduler>,
    notifier: Arc<dyn ReminderNotifier>,
}

impl ReminderDispatcher {
    pub fn new(scheduler: Arc<ReminderScheduler>, notifier: Arc<dyn ReminderNotifier>) -> Self {
        Self { scheduler, notifier }
    }

    /// Delivers every job due at `now` once and moves it to its next weekly
    /// fire. A failed delivery is logged and not retried. The store stays
    /// unlocked while the notifier runs.
    pub async fn fire_due(&self, now: DateTime<Utc>) -> Result<usize> {
        let due = self.scheduler.due_jobs(now).await?;
        if due.is_empty() {
            return Ok(0);
        }

        let mut delivered = 0;
        for job in &due {
            match self.notifier.notify(job).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(job_id = %job.key, error = %e, "reminder delivery failed"),
            }
        }
        let keys: Vec<ReminderKey> = due.into_iter().map(|job| job.key).collect();
        self.scheduler.advance(&keys, now).await?;
        Ok(delivered)
    }

    /// Checks for due reminders every `period` until `shutdown` turns true
    /// or its sender is dropped.
    pub async fn run(&self, period: Duration, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(?period, "reminder dispatcher started");
        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.fire_due(Utc::now()).await {
                        error!(error = %e, "reminder dispatch failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("reminder dispatcher stopped");
                        return Ok(());
                    }
                }
            }
        }
    }
}
