use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

use super::memory::MemoryStore;
use super::prompts;
use crate::api_connection::ApiConnectionError;
use crate::backend::CompletionBackend;
use crate::profile::UserProfile;

pub const EXPECTED_DISH_COUNT: usize = 10;

/// Turns a one-dish-per-line answer into dish names: list markers are
/// stripped, blank lines dropped, and repeats (ignoring case) removed.
pub fn parse_dish_list(response: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    response
        .lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .filter(|line| seen.insert(line.to_lowercase()))
        .map(String::from)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let line = line.trim_start_matches(['-', '*', '•']);
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    let line = if digits > 0 && line[digits..].starts_with(['.', ')']) {
        &line[digits + 1..]
    } else {
        line
    };
    line.trim()
}

pub struct MealDescriptionGenerator {
    backend: Arc<dyn CompletionBackend>,
    memory: Arc<MemoryStore>,
}

impl MealDescriptionGenerator {
    pub fn new(backend: Arc<dyn CompletionBackend>, memory: Arc<MemoryStore>) -> Self {
        Self { backend, memory }
    }

    /// Asks for ten dishes suited to `profile`, feeding back everything this
    /// user has exchanged with the generator so far. The exchange is then
    /// recorded under the override prompt, or the profile summary if none.
    pub async fn generate(
        &self,
        profile: &UserProfile,
        override_prompt: Option<&str>,
    ) -> Result<Vec<String>, ApiConnectionError> {
        let override_prompt = override_prompt.map(str::trim).filter(|p| !p.is_empty());
        let handle = self.memory.get_or_create(&profile.user_id);
        let mut memory = handle.lock().await;

        let prompt = prompts::meal_descriptions(profile, override_prompt.unwrap_or(""), &memory.transcript());
        let response = self.backend.complete(&prompt).await?;

        let input = match override_prompt {
            Some(p) => p.to_string(),
            None => profile.summary(),
        };
        memory.record(input, response.clone());

        let dishes = parse_dish_list(&response);
        if dishes.len() != EXPECTED_DISH_COUNT {
            warn!(user_id = %profile.user_id, count = dishes.len(), "unexpected number of dishes");
        }
        debug!(user_id = %profile.user_id, ?dishes, "generated dish list");
        Ok(dishes)
    }
}
