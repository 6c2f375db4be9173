use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::recipe::RawRecipe;

/// Anything that can hand the corpus builder a batch of scraped recipes.
/// `None` entries are recipes the scraper failed to parse; the source keeps
/// them and the corpus builder drops them.
pub trait RecipeSource {
    fn load(&self) -> Result<Vec<Option<RawRecipe>>>;
}

/// Reads the scraper's JSON snapshot: an array of recipe objects or `null`s.
pub struct JsonRecipeSource {
    path: PathBuf,
}

impl JsonRecipeSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl RecipeSource for JsonRecipeSource {
    fn load(&self) -> Result<Vec<Option<RawRecipe>>> {
        if !self.path.exists() {
            return Err(anyhow::anyhow!("Recipe snapshot not found at: {:?}", self.path));
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read recipe snapshot at {:?}", self.path))?;
        let values: Vec<serde_json::Value> = serde_json::from_str(&contents)
            .with_context(|| format!("Recipe snapshot at {:?} is not a JSON array", self.path))?;

        // A malformed entry is a parse failure of that recipe only.
        Ok(values
            .into_iter()
            .map(|value| {
                if value.is_null() {
                    None
                } else {
                    serde_json::from_value::<RawRecipe>(value).ok()
                }
            })
            .collect())
    }
}

/// In-memory source, handy for seeding a corpus from already-parsed data.
pub struct StaticRecipeSource(pub Vec<Option<RawRecipe>>);

impl RecipeSource for StaticRecipeSource {
    fn load(&self) -> Result<Vec<Option<RawRecipe>>> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn loads_snapshot_with_nulls_and_bad_entries() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(
            file,
            r#"[
                {{"title": "Борщ", "url": "https://eda.ru/borsch", "ingredients": ["Свекла: 2 шт"],
                  "portions": "4 порции", "cooking_time": "1 час",
                  "nutrition": {{"calories": "120", "proteins": "4", "fats": "5", "carbs": "14"}}}},
                null,
                {{"title": 42}},
                {{"url": "https://eda.ru/no-title"}}
            ]"#
        )?;
        file.flush()?;

        let recipes = JsonRecipeSource::new(file.path()).load()?;
        assert_eq!(recipes.len(), 4);
        assert_eq!(recipes[0].as_ref().unwrap().title.as_deref(), Some("Борщ"));
        assert!(recipes[1].is_none());
        assert!(recipes[2].is_none(), "wrongly typed entry counts as a parse failure");
        assert!(recipes[3].as_ref().unwrap().title.is_none());
        Ok(())
    }

    #[test]
    fn missing_snapshot_is_an_error() {
        let result = JsonRecipeSource::new("this_file_does_not_exist.json").load();
        assert!(result.unwrap_err().to_string().contains("Recipe snapshot not found"));
    }

    #[test]
    fn non_array_snapshot_is_an_error() -> Result<()> {
        let mut file = NamedTempFile::new()?;
        write!(file, r#"{{"title": "Борщ"}}"#)?;
        file.flush()?;
        assert!(JsonRecipeSource::new(file.path()).load().is_err());
        Ok(())
    }
}
