use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use fs2::FileExt;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::schedule::next_fire_time;
use super::store::{ReminderJob, ReminderKey, ReminderStore};
use crate::planner::partition_week;

pub const DEFAULT_REMINDER_HOUR: u32 = 9;

pub fn reminder_message(block_label: &str, schedule: &str) -> String {
    format!("Напоминаем о покупках для блока {}:\n{}", block_label, schedule)
}

/// Advisory lock on `<store>.lock`, released when dropped.
struct StoreFileLock(File);

impl StoreFileLock {
    fn acquire(store_path: &Path, exclusive: bool) -> Result<Self> {
        let lock_path = store_path.with_extension("lock");
        if let Some(parent) = lock_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {:?}", parent))?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file {:?}", lock_path))?;
        let locked = if exclusive {
            FileExt::lock_exclusive(&file)
        } else {
            FileExt::lock_shared(&file)
        };
        locked.with_context(|| format!("Failed to lock {:?}", lock_path))?;
        Ok(Self(file))
    }
}

impl Drop for StoreFileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

/// Registers weekly shopping reminders for a user's plan blocks.
///
/// With a persistence path, the file is the source of truth: every read
/// reloads it and every change happens under an exclusive file lock, so
/// several processes can share one store.
pub struct ReminderScheduler {
    store: Arc<Mutex<ReminderStore>>,
    tz: Tz,
    hour: u32,
    persist_path: Option<PathBuf>,
}

impl ReminderScheduler {
    pub fn new(tz: Tz, hour: u32) -> Self {
        Self {
            store: Arc::new(Mutex::new(ReminderStore::new())),
            tz,
            hour,
            persist_path: None,
        }
    }

    pub fn persistent(tz: Tz, hour: u32, path: PathBuf) -> Result<Self> {
        let store = {
            let _file_lock = StoreFileLock::acquire(&path, false)?;
            ReminderStore::load(&path)?
        };
        info!(path = ?path, jobs = store.len(), "loaded reminder store");
        Ok(Self {
            store: Arc::new(Mutex::new(store)),
            tz,
            hour,
            persist_path: Some(path),
        })
    }

    pub fn tz(&self) -> Tz {
        self.tz
    }

    /// Runs `read` against the latest persisted state.
    pub(crate) async fn read<T>(&self, read: impl FnOnce(&ReminderStore) -> T) -> Result<T> {
        let mut store = self.store.lock().await;
        if let Some(path) = &self.persist_path {
            let _file_lock = StoreFileLock::acquire(path, false)?;
            *store = ReminderStore::load(path)?;
        }
        Ok(read(&store))
    }

    /// Reload, apply and save as one step under the file lock. Nothing is
    /// written when `apply` fails.
    pub(crate) async fn update<T>(&self, apply: impl FnOnce(&mut ReminderStore) -> Result<T>) -> Result<T> {
        let mut store = self.store.lock().await;
        let Some(path) = &self.persist_path else {
            return apply(&mut store);
        };
        let _file_lock = StoreFileLock::acquire(path, true)?;
        let mut fresh = ReminderStore::load(path)?;
        let result = apply(&mut fresh)?;
        fresh.save(path)?;
        *store = fresh;
        Ok(result)
    }

    /// One job per schedule entry. The week is split by the number of
    /// entries; each job fires on its block's first day.
    pub async fn schedule_for_plan(
        &self,
        user_id: &str,
        schedule_texts: &[String],
        now: DateTime<Utc>,
    ) -> Result<Vec<ReminderJob>> {
        if schedule_texts.is_empty() {
            return Ok(Vec::new());
        }
        let blocks = partition_week(schedule_texts.len());
        let mut jobs = Vec::with_capacity(blocks.len());
        for (block, schedule) in blocks.iter().zip(schedule_texts) {
            let label = block.label();
            let weekday = block.start_weekday();
            let job = ReminderJob {
                next_fire: next_fire_time(now, self.tz, weekday, self.hour)?,
                message: reminder_message(&label, schedule),
                key: ReminderKey::new(user_id, label),
                weekday,
                hour: self.hour,
            };
            debug!(job_id = %job.key, next_fire = %job.next_fire, "reminder prepared");
            jobs.push(job);
        }

        self.update(|store| {
            for job in &jobs {
                store.upsert(job.clone());
            }
            Ok(())
        })
        .await?;
        info!(user_id, jobs = jobs.len(), "reminders scheduled");
        Ok(jobs)
    }

    pub async fn remove_all(&self, user_id: &str) -> Result<usize> {
        let removed = self.update(|store| Ok(store.remove_all(user_id))).await?;
        if removed > 0 {
            info!(user_id, removed, "reminders removed");
        }
        Ok(removed)
    }

    pub async fn list_all(&self, user_id: &str) -> Result<Vec<ReminderJob>> {
        self.read(|store| store.list_all(user_id)).await
    }

    /// Copies of the jobs due at `now`.
    pub(crate) async fn due_jobs(&self, now: DateTime<Utc>) -> Result<Vec<ReminderJob>> {
        self.read(|store| {
            store
                .due(now)
                .iter()
                .filter_map(|key| store.get(key).cloned())
                .collect()
        })
        .await
    }

    /// Moves the given jobs past `now`. Keys removed in the meantime are
    /// skipped.
    pub(crate) async fn advance(&self, keys: &[ReminderKey], now: DateTime<Utc>) -> Result<()> {
        let tz = self.tz;
        self.update(|store| {
            for key in keys {
                store.advance(key, now, tz)?;
            }
            Ok(())
        })
        .await
    }
}
