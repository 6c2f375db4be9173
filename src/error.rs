use thiserror::Error;

use crate::api_connection::ApiConnectionError;

#[derive(Debug, Error)]
pub enum PlannerError {
    #[error("Completion backend failed: {0}")]
    Backend(#[from] ApiConnectionError),
    #[error("Recipe retrieval failed: {0:#}")]
    Retrieval(anyhow::Error),
    #[error("User {0} already has an active plan")]
    PlanAlreadyExists(String),
    #[error("User {0} has no active plan")]
    NoActivePlan(String),
    #[error("User {0} has no interrupted plan to resume")]
    NothingToResume(String),
    #[error("Planning cancelled after {completed_blocks} block(s)")]
    Cancelled { completed_blocks: usize },
    #[error("Storage error: {0:#}")]
    Storage(anyhow::Error),
}

pub type PlannerResult<T> = Result<T, PlannerError>;
