pub mod analyzer;
pub mod block_planner;
pub mod meal_generator;
pub mod memory;
pub mod pipeline;
pub mod prompts;
pub mod retriever;
pub mod week;

pub use analyzer::{CookingPreferences, PreferenceAnalyzer};
pub use block_planner::{BlockCheckpoint, BlockPlanner, NoCheckpoint, PlanBlock, PlanProgress, WeekPlan};
pub use meal_generator::MealDescriptionGenerator;
pub use memory::{MemoryHandle, MemoryStore};
pub use pipeline::{MealPlanPipeline, PlanOutcome};
pub use retriever::RecipeRetriever;
pub use week::{partition_week, DayBlock, WEEK_DAYS};
