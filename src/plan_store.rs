use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::debug;

use crate::persistence::{read_json, remove_if_exists, write_json_atomic};
use crate::planner::{BlockCheckpoint, PlanProgress, WeekPlan};

/// The two per-user plan artifacts, one entry per block in week order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPlan {
    pub meal_plan: Vec<String>,
    pub shopping_schedule: Vec<String>,
}

impl StoredPlan {
    /// Placeholders written before a run have no blocks yet.
    pub fn is_placeholder(&self) -> bool {
        self.meal_plan.is_empty() && self.shopping_schedule.is_empty()
    }
}

/// Plan files under one storage directory, named by user id.
#[derive(Debug, Clone)]
pub struct PlanStore {
    dir: PathBuf,
}

impl PlanStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn meal_plan_path(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("meal_plan_{}.json", user_id))
    }

    pub fn schedule_path(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("shopping_schedule_{}.json", user_id))
    }

    pub fn progress_path(&self, user_id: &str) -> PathBuf {
        self.dir.join(format!("plan_progress_{}.json", user_id))
    }

    /// Either artifact existing means the user has a plan, finished or not.
    pub fn has_active_plan(&self, user_id: &str) -> bool {
        self.meal_plan_path(user_id).exists() || self.schedule_path(user_id).exists()
    }

    /// Empty arrays, so an interrupted run leaves readable files behind.
    pub fn write_placeholders(&self, user_id: &str) -> Result<()> {
        let empty: Vec<String> = Vec::new();
        write_json_atomic(&self.meal_plan_path(user_id), &empty)?;
        write_json_atomic(&self.schedule_path(user_id), &empty)?;
        debug!(user_id, "plan placeholders written");
        Ok(())
    }

    pub fn save_block_progress(&self, user_id: &str, progress: &PlanProgress) -> Result<()> {
        write_json_atomic(&self.progress_path(user_id), progress)?;
        debug!(
            user_id,
            completed = progress.completed.len(),
            total = progress.total_blocks(),
            "plan progress saved"
        );
        Ok(())
    }

    /// Writes both artifacts and drops the progress marker.
    pub fn save(&self, user_id: &str, plan: &WeekPlan) -> Result<()> {
        write_json_atomic(&self.meal_plan_path(user_id), &plan.plan_texts())?;
        write_json_atomic(&self.schedule_path(user_id), &plan.schedule_texts())?;
        remove_if_exists(&self.progress_path(user_id))?;
        Ok(())
    }

    pub fn load(&self, user_id: &str) -> Result<Option<StoredPlan>> {
        let meal_plan: Option<Vec<String>> = read_json(&self.meal_plan_path(user_id))?;
        let shopping_schedule: Option<Vec<String>> = read_json(&self.schedule_path(user_id))?;
        if meal_plan.is_none() && shopping_schedule.is_none() {
            return Ok(None);
        }
        Ok(Some(StoredPlan {
            meal_plan: meal_plan.unwrap_or_default(),
            shopping_schedule: shopping_schedule.unwrap_or_default(),
        }))
    }

    pub fn load_checkpoint(&self, user_id: &str) -> Result<Option<PlanProgress>> {
        read_json(&self.progress_path(user_id))
    }

    /// Removes every plan file of the user. Returns whether anything existed.
    pub fn delete(&self, user_id: &str) -> Result<bool> {
        let mut removed = false;
        for path in [
            self.meal_plan_path(user_id),
            self.schedule_path(user_id),
            self.progress_path(user_id),
        ] {
            removed |= remove_if_exists(&path)?;
        }
        Ok(removed)
    }

    pub fn checkpoint<'a>(&'a self, user_id: &'a str) -> StoreCheckpoint<'a> {
        StoreCheckpoint { store: self, user_id }
    }
}

/// Persists planner progress for one user after every block.
pub struct StoreCheckpoint<'a> {
    store: &'a PlanStore,
    user_id: &'a str,
}

impl BlockCheckpoint for StoreCheckpoint<'_> {
    fn record_progress(&mut self, progress: &PlanProgress) -> Result<()> {
        self.store.save_block_progress(self.user_id, progress)
    }
}
