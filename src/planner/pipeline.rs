use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

use super::analyzer::{CookingPreferences, PreferenceAnalyzer};
use super::block_planner::{BlockCheckpoint, BlockPlanner, PlanProgress, WeekPlan};
use super::meal_generator::MealDescriptionGenerator;
use super::memory::MemoryStore;
use super::retriever::RecipeRetriever;
use crate::backend::CompletionBackend;
use crate::error::{PlannerError, PlannerResult};
use crate::profile::UserProfile;
use crate::search::RecipeCorpus;

#[derive(Debug, Clone)]
pub struct PlanOutcome {
    pub preferences: CookingPreferences,
    pub dishes: Vec<String>,
    pub plan: WeekPlan,
}

/// Analyzer, generator, retriever and block planner chained for one user.
pub struct MealPlanPipeline {
    analyzer: PreferenceAnalyzer,
    generator: MealDescriptionGenerator,
    retriever: RecipeRetriever,
    planner: BlockPlanner,
}

impl MealPlanPipeline {
    pub fn new(backend: Arc<dyn CompletionBackend>, corpus: Arc<RecipeCorpus>, memory: Arc<MemoryStore>) -> Self {
        Self {
            analyzer: PreferenceAnalyzer::new(backend.clone()),
            generator: MealDescriptionGenerator::new(backend.clone(), memory),
            retriever: RecipeRetriever::new(corpus),
            planner: BlockPlanner::new(backend),
        }
    }

    pub async fn run(
        &self,
        profile: &UserProfile,
        override_prompt: Option<&str>,
        checkpoint: &mut dyn BlockCheckpoint,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> PlannerResult<PlanOutcome> {
        let preferences = self.analyzer.analyze(&profile.cooking_preferences).await?;
        info!(
            user_id = %profile.user_id,
            cooking_days = preferences.cooking_days,
            max_minutes = preferences.max_minutes,
            "preferences analyzed"
        );

        let dishes = self.generator.generate(profile, override_prompt).await?;
        info!(user_id = %profile.user_id, dishes = dishes.len(), "dishes generated");

        let grounding = self
            .retriever
            .ground(&dishes, preferences.max_minutes)
            .map_err(PlannerError::Retrieval)?;

        let progress = PlanProgress::fresh(preferences.cooking_days, preferences.max_minutes, grounding);
        checkpoint.record_progress(&progress).map_err(PlannerError::Storage)?;

        let plan = self.planner.plan_week(profile, progress, checkpoint, cancel).await?;
        info!(user_id = %profile.user_id, blocks = plan.blocks.len(), "week planned");
        Ok(PlanOutcome {
            preferences,
            dishes,
            plan,
        })
    }

    /// Finishes a run from saved progress. Analysis, generation and
    /// retrieval are not repeated.
    pub async fn resume(
        &self,
        profile: &UserProfile,
        progress: PlanProgress,
        checkpoint: &mut dyn BlockCheckpoint,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> PlannerResult<WeekPlan> {
        info!(
            user_id = %profile.user_id,
            completed = progress.completed.len(),
            total = progress.total_blocks(),
            "resuming plan"
        );
        self.planner.plan_week(profile, progress, checkpoint, cancel).await
    }
}
