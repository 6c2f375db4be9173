use serde::{Deserialize, Serialize};

/// Placeholder the scraper writes for any field it could not find.
pub const NOT_SPECIFIED: &str = "Не указано";

/// A recipe as it appears in the scraper's JSON snapshot. Every field may be
/// missing; `RecipeRecord::from_raw` decides which absences are fatal.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RawRecipe {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub portions: Option<String>,
    #[serde(default)]
    pub cooking_time: Option<String>,
    #[serde(default)]
    pub ingredients: Option<Vec<String>>,
    #[serde(default)]
    pub nutrition: Option<RawNutrition>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RawNutrition {
    #[serde(default)]
    pub calories: Option<String>,
    #[serde(default)]
    pub proteins: Option<String>,
    #[serde(default)]
    pub fats: Option<String>,
    #[serde(default)]
    pub carbs: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Nutrition {
    pub calories: String,
    pub proteins: String,
    pub fats: String,
    pub carbs: String,
}

impl Default for Nutrition {
    fn default() -> Self {
        Self {
            calories: NOT_SPECIFIED.to_string(),
            proteins: NOT_SPECIFIED.to_string(),
            fats: NOT_SPECIFIED.to_string(),
            carbs: NOT_SPECIFIED.to_string(),
        }
    }
}

/// A parsed recipe. Title and url are mandatory; the url is the unique key.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct RecipeRecord {
    pub title: String,
    pub url: String,
    /// Ordered "name: quantity" lines.
    pub ingredients: Vec<String>,
    pub portions: String,
    pub cooking_time: String,
    pub nutrition: Nutrition,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn or_not_specified(value: Option<String>) -> String {
    non_empty(value).unwrap_or_else(|| NOT_SPECIFIED.to_string())
}

impl RecipeRecord {
    /// Returns `None` when the title or url is missing.
    pub fn from_raw(raw: RawRecipe) -> Option<Self> {
        let title = non_empty(raw.title)?;
        let url = non_empty(raw.url)?;
        let nutrition = raw.nutrition.unwrap_or_default();
        Some(Self {
            title,
            url,
            ingredients: raw.ingredients.unwrap_or_default(),
            portions: or_not_specified(raw.portions),
            cooking_time: or_not_specified(raw.cooking_time),
            nutrition: Nutrition {
                calories: or_not_specified(nutrition.calories),
                proteins: or_not_specified(nutrition.proteins),
                fats: or_not_specified(nutrition.fats),
                carbs: or_not_specified(nutrition.carbs),
            },
        })
    }

    /// Text that is embedded and handed to the plan generator as grounding.
    /// Field order is fixed: title, ingredients, portions, time, nutrition.
    pub fn document_text(&self) -> String {
        format!(
            "{}\n\nИнгредиенты:\n{}\n\nПорции: {}\nВремя приготовления: {}\n\nПищевая ценность:\nКалории: {}\nБелки: {}\nЖиры: {}\nУглеводы: {}\n",
            self.title,
            self.ingredients.join("\n"),
            self.portions,
            self.cooking_time,
            self.nutrition.calories,
            self.nutrition.proteins,
            self.nutrition.fats,
            self.nutrition.carbs,
        )
    }
}
