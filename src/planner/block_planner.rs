use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};

use super::prompts;
use super::week::{partition_week, DayBlock};
use crate::backend::CompletionBackend;
use crate::error::{PlannerError, PlannerResult};
use crate::profile::UserProfile;

/// Separator between earlier blocks' texts in the running `current_state`.
pub const STATE_SEPARATOR: &str = "\n";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanBlock {
    pub label: String,
    pub days: Vec<String>,
    pub plan: String,
    pub schedule: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekPlan {
    pub blocks: Vec<PlanBlock>,
}

impl WeekPlan {
    pub fn plan_texts(&self) -> Vec<String> {
        self.blocks.iter().map(|b| b.plan.clone()).collect()
    }

    pub fn schedule_texts(&self) -> Vec<String> {
        self.blocks.iter().map(|b| b.schedule.clone()).collect()
    }
}

/// Everything needed to continue a week after an interruption.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanProgress {
    pub cooking_days: u32,
    pub max_minutes: u32,
    pub grounding: String,
    pub completed: Vec<PlanBlock>,
}

impl PlanProgress {
    pub fn fresh(cooking_days: u32, max_minutes: u32, grounding: String) -> Self {
        Self {
            cooking_days,
            max_minutes,
            grounding,
            completed: Vec::new(),
        }
    }

    pub fn total_blocks(&self) -> usize {
        partition_week(self.cooking_days as usize).len()
    }

    pub fn is_complete(&self) -> bool {
        self.completed.len() >= self.total_blocks()
    }
}

/// Receives the run's state once it is known and again after every
/// finished block, before the next one starts.
pub trait BlockCheckpoint: Send {
    fn record_progress(&mut self, progress: &PlanProgress) -> anyhow::Result<()>;
}

pub struct NoCheckpoint;

impl BlockCheckpoint for NoCheckpoint {
    fn record_progress(&mut self, _progress: &PlanProgress) -> anyhow::Result<()> {
        Ok(())
    }
}

pub struct BlockPlanner {
    backend: Arc<dyn CompletionBackend>,
}

impl BlockPlanner {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Generates the remaining blocks of the week in order. Each block's plan
    /// prompt carries every earlier plan text, and its schedule prompt every
    /// earlier schedule text, so blocks cannot be produced concurrently.
    ///
    /// Completed blocks in `progress` are kept when they line up with the
    /// week partition; otherwise planning restarts from Monday.
    pub async fn plan_week(
        &self,
        profile: &UserProfile,
        mut progress: PlanProgress,
        checkpoint: &mut dyn BlockCheckpoint,
        cancel: Option<&watch::Receiver<bool>>,
    ) -> PlannerResult<WeekPlan> {
        let blocks = partition_week(progress.cooking_days as usize);
        if !completed_matches(&progress.completed, &blocks) {
            warn!(
                user_id = %profile.user_id,
                completed = progress.completed.len(),
                "completed blocks do not match the week partition, starting over"
            );
            progress.completed.clear();
        }

        for block in blocks.iter().skip(progress.completed.len()) {
            if cancel.is_some_and(|rx| *rx.borrow()) {
                info!(user_id = %profile.user_id, completed = progress.completed.len(), "planning cancelled");
                return Err(PlannerError::Cancelled {
                    completed_blocks: progress.completed.len(),
                });
            }

            let days = block.days();
            let plan_state = join_field(&progress.completed, |b| &b.plan);
            let plan = self
                .backend
                .complete(&prompts::block_plan(&progress.grounding, profile, days, &plan_state))
                .await?;

            let schedule_state = join_field(&progress.completed, |b| &b.schedule);
            let schedule = self
                .backend
                .complete(&prompts::shopping_schedule(&plan, days, &schedule_state))
                .await?;

            info!(user_id = %profile.user_id, block = %block.label(), "block planned");
            progress.completed.push(PlanBlock {
                label: block.label(),
                days: days.iter().map(|d| d.to_string()).collect(),
                plan,
                schedule,
            });
            checkpoint
                .record_progress(&progress)
                .map_err(PlannerError::Storage)?;
        }

        Ok(WeekPlan {
            blocks: progress.completed,
        })
    }
}

fn completed_matches(completed: &[PlanBlock], blocks: &[DayBlock]) -> bool {
    completed.len() <= blocks.len()
        && completed
            .iter()
            .zip(blocks)
            .all(|(done, block)| done.label == block.label())
}

fn join_field(blocks: &[PlanBlock], field: impl Fn(&PlanBlock) -> &String) -> String {
    blocks
        .iter()
        .map(|b| field(b).as_str())
        .collect::<Vec<_>>()
        .join(STATE_SEPARATOR)
}
