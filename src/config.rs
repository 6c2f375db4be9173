use anyhow::{Context, Result};
use chrono_tz::Tz;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::api_connection::endpoints::{DEFAULT_MODEL, OPENROUTER_CHAT_URL};
use crate::backend::RetryPolicy;
use crate::planner::memory::DEFAULT_MAX_EXCHANGES;
use crate::reminders::DEFAULT_REMINDER_HOUR;

/// Name of the variable holding the OpenRouter key. The key itself is read
/// when a request is made, never stored here.
pub const API_KEY_ENV_VAR: &str = "OPENROUTER_API_KEY";

#[derive(Debug, Clone)]
pub struct PlannerConfig {
    pub api_key_env_var: String,
    pub model: String,
    pub api_url: String,
    pub storage_dir: PathBuf,
    pub recipes_path: PathBuf,
    pub corpus_snapshot: PathBuf,
    pub timezone: Tz,
    pub reminder_hour: u32,
    pub memory_exchanges: usize,
    pub backend_timeout: Duration,
    pub backend_attempts: u32,
}

impl PlannerConfig {
    /// Reads `.env` if present, then the process environment.
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let text = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        let reminder_hour: u32 = parsed(&lookup, "PLANNER_REMINDER_HOUR", DEFAULT_REMINDER_HOUR)?;
        if reminder_hour > 23 {
            anyhow::bail!("PLANNER_REMINDER_HOUR must be between 0 and 23, got {}", reminder_hour);
        }
        let timezone_name = text("PLANNER_TIMEZONE", "Europe/Moscow");
        let timezone: Tz = timezone_name
            .parse()
            .map_err(|e| anyhow::anyhow!("{}", e))
            .with_context(|| format!("PLANNER_TIMEZONE is not a known timezone: {}", timezone_name))?;

        Ok(Self {
            api_key_env_var: API_KEY_ENV_VAR.to_string(),
            model: text("PLANNER_MODEL", DEFAULT_MODEL),
            api_url: text("PLANNER_API_URL", OPENROUTER_CHAT_URL),
            storage_dir: text("PLANNER_STORAGE_DIR", "storage").into(),
            recipes_path: text("PLANNER_RECIPES_PATH", "data/recipes_data.json").into(),
            corpus_snapshot: text("PLANNER_CORPUS_SNAPSHOT", "data/recipe_corpus.json").into(),
            timezone,
            reminder_hour,
            memory_exchanges: parsed(&lookup, "PLANNER_MEMORY_EXCHANGES", DEFAULT_MAX_EXCHANGES)?,
            backend_timeout: Duration::from_secs(parsed(&lookup, "PLANNER_BACKEND_TIMEOUT_SECS", 120u64)?),
            backend_attempts: parsed(&lookup, "PLANNER_BACKEND_ATTEMPTS", 3u32)?.max(1),
        })
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.backend_attempts,
            timeout: self.backend_timeout,
            ..RetryPolicy::default()
        }
    }

    pub fn reminder_store_path(&self) -> PathBuf {
        self.storage_dir.join("reminders.json")
    }

    pub fn profile_path(&self, user_id: &str) -> PathBuf {
        self.storage_dir.join(format!("user_{}.json", user_id))
    }
}

fn parsed<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(name) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{} has an invalid value: {:?}", name, value)),
        None => Ok(default),
    }
}
