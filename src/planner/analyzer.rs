use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, LazyLock};
use tracing::{debug, warn};

use super::prompts;
use crate::api_connection::ApiConnectionError;
use crate::backend::CompletionBackend;

pub const DEFAULT_COOKING_DAYS: u32 = 3;
pub const DEFAULT_MAX_MINUTES: u32 = 120;

static ANSWER_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"Дни готовки:\s*(\d+);\s*Время готовки:\s*(\d+)\s*минут").expect("answer pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookingPreferences {
    /// Always within `1..=7`.
    pub cooking_days: u32,
    /// Always positive.
    pub max_minutes: u32,
}

impl Default for CookingPreferences {
    fn default() -> Self {
        Self {
            cooking_days: DEFAULT_COOKING_DAYS,
            max_minutes: DEFAULT_MAX_MINUTES,
        }
    }
}

/// Reads `"Дни готовки: <d>; Время готовки: <m> минут"` out of a backend
/// answer. Anything else yields the defaults. Days are clamped into a week
/// and a zero time budget falls back to the default budget.
pub fn parse_preferences(response: &str) -> CookingPreferences {
    let Some(caps) = ANSWER_PATTERN.captures(response) else {
        warn!(response, "preference answer did not match, using defaults");
        return CookingPreferences::default();
    };
    let (Ok(days), Ok(minutes)) = (caps[1].parse::<u32>(), caps[2].parse::<u32>()) else {
        warn!(response, "preference answer held unreadable numbers, using defaults");
        return CookingPreferences::default();
    };
    CookingPreferences {
        cooking_days: days.clamp(1, 7),
        max_minutes: if minutes == 0 { DEFAULT_MAX_MINUTES } else { minutes },
    }
}

pub struct PreferenceAnalyzer {
    backend: Arc<dyn CompletionBackend>,
}

impl PreferenceAnalyzer {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self { backend }
    }

    /// Only a failing backend is an error; an unreadable answer is not.
    pub async fn analyze(&self, cooking_preferences: &str) -> Result<CookingPreferences, ApiConnectionError> {
        let response = self
            .backend
            .complete(&prompts::preference_analysis(cooking_preferences))
            .await?;
        let preferences = parse_preferences(&response);
        debug!(?preferences, "analyzed cooking preferences");
        Ok(preferences)
    }
}
