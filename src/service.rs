use chrono::Utc;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use crate::backend::CompletionBackend;
use crate::error::{PlannerError, PlannerResult};
use crate::plan_store::{PlanStore, StoredPlan};
use crate::planner::{MealPlanPipeline, MemoryStore, PlanOutcome, WeekPlan};
use crate::profile::UserProfile;
use crate::reminders::{ReminderJob, ReminderScheduler};
use crate::search::RecipeCorpus;

/// User-facing plan operations. Runs for the same user are serialised;
/// different users proceed concurrently.
pub struct PlannerService {
    pipeline: MealPlanPipeline,
    plans: PlanStore,
    reminders: Arc<ReminderScheduler>,
    user_locks: DashMap<String, Arc<Mutex<()>>>,
    cancel: Option<watch::Receiver<bool>>,
}

impl PlannerService {
    pub fn new(
        backend: Arc<dyn CompletionBackend>,
        corpus: Arc<RecipeCorpus>,
        memory: Arc<MemoryStore>,
        plans: PlanStore,
        reminders: Arc<ReminderScheduler>,
    ) -> Self {
        Self {
            pipeline: MealPlanPipeline::new(backend, corpus, memory),
            plans,
            reminders,
            user_locks: DashMap::new(),
            cancel: None,
        }
    }

    /// Runs stop between blocks once `cancel` turns true.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        self.user_locks
            .entry(user_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// First plan for a user. Refused while an earlier plan still exists.
    pub async fn generate_plan(&self, profile: &UserProfile) -> PlannerResult<PlanOutcome> {
        let lock = self.user_lock(&profile.user_id);
        let _guard = lock.lock().await;

        if self.plans.has_active_plan(&profile.user_id) {
            return Err(PlannerError::PlanAlreadyExists(profile.user_id.clone()));
        }
        self.plans
            .write_placeholders(&profile.user_id)
            .map_err(PlannerError::Storage)?;
        self.run(profile, None).await
    }

    /// Regenerates an existing plan with the user's extra wishes. The old
    /// plan and its reminders stay in place until the new one is complete.
    pub async fn edit_plan(&self, profile: &UserProfile, prompt: &str) -> PlannerResult<PlanOutcome> {
        let lock = self.user_lock(&profile.user_id);
        let _guard = lock.lock().await;

        if !self.plans.has_active_plan(&profile.user_id) {
            return Err(PlannerError::NoActivePlan(profile.user_id.clone()));
        }
        self.run(profile, Some(prompt)).await
    }

    /// Finishes a run that stopped part way through the week.
    pub async fn resume_plan(&self, profile: &UserProfile) -> PlannerResult<WeekPlan> {
        let lock = self.user_lock(&profile.user_id);
        let _guard = lock.lock().await;

        let progress = self
            .plans
            .load_checkpoint(&profile.user_id)
            .map_err(PlannerError::Storage)?
            .ok_or_else(|| PlannerError::NothingToResume(profile.user_id.clone()))?;

        let mut checkpoint = self.plans.checkpoint(&profile.user_id);
        let plan = self
            .pipeline
            .resume(profile, progress, &mut checkpoint, self.cancel.as_ref())
            .await?;
        self.finish(&profile.user_id, &plan).await?;
        Ok(plan)
    }

    pub fn view_plan(&self, user_id: &str) -> PlannerResult<StoredPlan> {
        stored_plan(&self.plans, user_id)
    }

    /// Removes the plan files and every reminder of the user. Returns the
    /// number of reminders removed.
    pub async fn delete_plan(&self, user_id: &str) -> PlannerResult<usize> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;
        remove_plan(&self.plans, &self.reminders, user_id).await
    }

    pub async fn list_reminders(&self, user_id: &str) -> PlannerResult<Vec<ReminderJob>> {
        self.reminders.list_all(user_id).await.map_err(PlannerError::Storage)
    }

    async fn run(&self, profile: &UserProfile, override_prompt: Option<&str>) -> PlannerResult<PlanOutcome> {
        let mut checkpoint = self.plans.checkpoint(&profile.user_id);
        let outcome = match self
            .pipeline
            .run(profile, override_prompt, &mut checkpoint, self.cancel.as_ref())
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(user_id = %profile.user_id, error = %e, "plan generation failed");
                return Err(e);
            }
        };
        self.finish(&profile.user_id, &outcome.plan).await?;
        Ok(outcome)
    }

    async fn finish(&self, user_id: &str, plan: &WeekPlan) -> PlannerResult<()> {
        self.plans.save(user_id, plan).map_err(PlannerError::Storage)?;
        self.reminders
            .remove_all(user_id)
            .await
            .map_err(PlannerError::Storage)?;
        self.reminders
            .schedule_for_plan(user_id, &plan.schedule_texts(), Utc::now())
            .await
            .map_err(PlannerError::Storage)?;
        info!(user_id, blocks = plan.blocks.len(), "plan saved");
        Ok(())
    }
}

/// The user's stored plan, placeholders included.
pub fn stored_plan(plans: &PlanStore, user_id: &str) -> PlannerResult<StoredPlan> {
    plans
        .load(user_id)
        .map_err(PlannerError::Storage)?
        .ok_or_else(|| PlannerError::NoActivePlan(user_id.to_string()))
}

/// Deletes the plan files and reminders of `user_id`. `NoActivePlan` when
/// there was neither.
pub async fn remove_plan(plans: &PlanStore, reminders: &ReminderScheduler, user_id: &str) -> PlannerResult<usize> {
    let removed_files = plans.delete(user_id).map_err(PlannerError::Storage)?;
    let removed_jobs = reminders.remove_all(user_id).await.map_err(PlannerError::Storage)?;
    if !removed_files && removed_jobs == 0 {
        return Err(PlannerError::NoActivePlan(user_id.to_string()));
    }
    info!(user_id, removed_jobs, "plan deleted");
    Ok(removed_jobs)
}
