use anyhow::Result;
use chrono::{DateTime, Utc, Weekday};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use super::schedule::following_fire;
use crate::persistence::{read_json, write_json_atomic};

/// Identity of a reminder. Ordered by user first, so one user's jobs form a
/// contiguous range of the store.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReminderKey {
    pub user_id: String,
    pub block_label: String,
}

impl ReminderKey {
    pub fn new(user_id: impl Into<String>, block_label: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            block_label: block_label.into(),
        }
    }

    pub fn job_id(&self) -> String {
        format!("reminder_{}_{}", self.user_id, self.block_label)
    }
}

impl fmt::Display for ReminderKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.job_id())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReminderJob {
    pub key: ReminderKey,
    pub weekday: Weekday,
    pub hour: u32,
    pub message: String,
    pub next_fire: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct ReminderStore {
    jobs: BTreeMap<ReminderKey, ReminderJob>,
}

impl ReminderStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the job under its key. Returns the replaced job.
    pub fn upsert(&mut self, job: ReminderJob) -> Option<ReminderJob> {
        self.jobs.insert(job.key.clone(), job)
    }

    pub fn get(&self, key: &ReminderKey) -> Option<&ReminderJob> {
        self.jobs.get(key)
    }

    fn user_keys(&self, user_id: &str) -> Vec<ReminderKey> {
        self.user_jobs(user_id).map(|job| job.key.clone()).collect()
    }

    fn user_jobs<'a>(&'a self, user_id: &'a str) -> impl Iterator<Item = &'a ReminderJob> + 'a {
        self.jobs
            .range(ReminderKey::new(user_id, "")..)
            .take_while(move |(key, _)| key.user_id == user_id)
            .map(|(_, job)| job)
    }

    /// Removes every job of `user_id`, returning how many there were.
    pub fn remove_all(&mut self, user_id: &str) -> usize {
        let keys = self.user_keys(user_id);
        for key in &keys {
            self.jobs.remove(key);
        }
        keys.len()
    }

    /// The user's jobs, soonest first.
    pub fn list_all(&self, user_id: &str) -> Vec<ReminderJob> {
        let mut jobs: Vec<ReminderJob> = self.user_jobs(user_id).cloned().collect();
        jobs.sort_by(|a, b| a.next_fire.cmp(&b.next_fire).then_with(|| a.key.cmp(&b.key)));
        jobs
    }

    pub fn due(&self, now: DateTime<Utc>) -> Vec<ReminderKey> {
        self.jobs
            .values()
            .filter(|job| job.next_fire <= now)
            .map(|job| job.key.clone())
            .collect()
    }

    /// Moves the job to its first weekly fire after `now`. Missed weeks are
    /// skipped, not replayed.
    pub fn advance(&mut self, key: &ReminderKey, now: DateTime<Utc>, tz: Tz) -> Result<Option<DateTime<Utc>>> {
        let Some(job) = self.jobs.get_mut(key) else {
            return Ok(None);
        };
        while job.next_fire <= now {
            job.next_fire = following_fire(job.next_fire, tz, job.hour)?;
        }
        Ok(Some(job.next_fire))
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn load(path: &Path) -> Result<Self> {
        let jobs: Vec<ReminderJob> = read_json(path)?.unwrap_or_default();
        let mut store = Self::new();
        for job in jobs {
            store.upsert(job);
        }
        Ok(store)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let jobs: Vec<&ReminderJob> = self.jobs.values().collect();
        write_json_atomic(path, &jobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    fn job(user: &str, label: &str, message: &str, day: u32) -> ReminderJob {
        ReminderJob {
            key: ReminderKey::new(user, label),
            weekday: Weekday::Mon,
            hour: 9,
            message: message.to_string(),
            next_fire: Utc.with_ymd_and_hms(2024, 5, day, 6, 0, 0).unwrap(),
        }
    }

    #[test]
    fn job_id_format() {
        assert_eq!(
            ReminderKey::new("42", "Понедельник-Вторник").job_id(),
            "reminder_42_Понедельник-Вторник"
        );
    }

    #[test]
    fn upsert_replaces_under_same_key() {
        let mut store = ReminderStore::new();
        assert!(store.upsert(job("1", "Понедельник-Вторник", "old", 20)).is_none());
        let replaced = store.upsert(job("1", "Понедельник-Вторник", "new", 27));
        assert_eq!(replaced.map(|j| j.message), Some("old".to_string()));

        assert_eq!(store.len(), 1);
        let jobs = store.list_all("1");
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].message, "new");
        assert_eq!(jobs[0].next_fire, Utc.with_ymd_and_hms(2024, 5, 27, 6, 0, 0).unwrap());
    }

    #[test]
    fn remove_all_leaves_other_users_alone() {
        let mut store = ReminderStore::new();
        store.upsert(job("1", "Понедельник-Вторник", "a", 20));
        store.upsert(job("1", "Среда-Воскресенье", "b", 22));
        store.upsert(job("12", "Понедельник-Вторник", "c", 20));
        store.upsert(job("2", "Понедельник-Воскресенье", "d", 20));

        assert_eq!(store.remove_all("1"), 2);
        assert!(store.list_all("1").is_empty());
        assert!(store
            .jobs
            .values()
            .all(|j| !j.key.job_id().starts_with("reminder_1_")));
        assert_eq!(store.list_all("12").len(), 1);
        assert_eq!(store.list_all("2").len(), 1);
        assert_eq!(store.remove_all("1"), 0);
    }

    #[test]
    fn list_all_sorts_by_next_fire() {
        let mut store = ReminderStore::new();
        store.upsert(job("7", "Понедельник-Вторник", "later", 27));
        store.upsert(job("7", "Среда-Четверг", "sooner", 22));
        let messages: Vec<String> = store.list_all("7").into_iter().map(|j| j.message).collect();
        assert_eq!(messages, vec!["sooner", "later"]);
    }

    #[test]
    fn advance_skips_missed_weeks() -> Result<()> {
        let mut store = ReminderStore::new();
        let j = job("3", "Понедельник-Воскресенье", "m", 6);
        let key = j.key.clone();
        store.upsert(j);

        let now = Utc.with_ymd_and_hms(2024, 5, 21, 0, 0, 0).unwrap();
        assert_eq!(store.due(now), vec![key.clone()]);
        let next = store.advance(&key, now, Tz::UTC)?;
        assert_eq!(next, Some(Utc.with_ymd_and_hms(2024, 5, 27, 9, 0, 0).unwrap()));
        assert!(store.due(now).is_empty());
        Ok(())
    }

    #[test]
    fn save_and_load() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("reminders.json");
        assert!(ReminderStore::load(&path)?.is_empty());

        let mut store = ReminderStore::new();
        store.upsert(job("5", "Понедельник-Вторник", "x", 20));
        store.save(&path)?;

        let loaded = ReminderStore::load(&path)?;
        assert_eq!(loaded.list_all("5"), store.list_all("5"));
        Ok(())
    }
}
