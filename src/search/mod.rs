pub mod corpus;
pub mod data_loader;
pub mod embedding_engine;
pub mod vector_store;

pub use corpus::{RecipeCorpus, ScoredRecipe, MAX_QUERY_CHARS};
pub use data_loader::{JsonRecipeSource, RecipeSource, StaticRecipeSource};
pub use embedding_engine::EmbeddingEngine;
pub use vector_store::RecipeVectorStore;
