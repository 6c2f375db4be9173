use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Snapshot of a registered user's free-text answers. The planner never
/// mutates it; editing happens in the conversation layer.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
pub struct UserProfile {
    #[serde(default)]
    pub user_id: String,
    pub about_user: String,
    pub forbidden_products: String,
    pub favorite_products: String,
    pub cooking_preferences: String,
}

impl UserProfile {
    /// All answers in one line, used as the memory input when no override
    /// prompt was given.
    pub fn summary(&self) -> String {
        format!(
            "{}, {}, {}, {}",
            self.about_user, self.forbidden_products, self.favorite_products, self.cooking_preferences
        )
    }

    /// Reads a profile JSON file written by the registration flow. The file
    /// itself carries no id, so the caller supplies it.
    pub fn load(path: &Path, user_id: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read user profile {:?}", path))?;
        let mut profile: UserProfile = serde_json::from_str(&contents)
            .with_context(|| format!("User profile {:?} is malformed", path))?;
        profile.user_id = user_id.to_string();
        Ok(profile)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn load_sets_user_id() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(
            file,
            r#"{{"about_user": "30 лет, бегаю", "forbidden_products": "орехи",
                "favorite_products": "курица", "cooking_preferences": "2 раза в неделю по часу"}}"#
        )?;
        file.flush()?;
        let profile = UserProfile::load(file.path(), "42")?;
        assert_eq!(profile.user_id, "42");
        assert_eq!(profile.forbidden_products, "орехи");
        assert_eq!(
            profile.summary(),
            "30 лет, бегаю, орехи, курица, 2 раза в неделю по часу"
        );
        Ok(())
    }
}
