use anyhow::{Context, Result};
use model2vec_rs::model::StaticModel;
use tracing::info;

use crate::backend::EmbeddingBackend;

// Multilingual static model; recipe texts are Russian.
pub const EMBEDDING_MODEL_ID: &str = "minishlab/potion-multilingual-128M";

pub const EMBEDDING_DIMENSION: usize = 256;

pub struct EmbeddingEngine {
    model: StaticModel,
    dimension: usize,
}

impl EmbeddingEngine {
    pub fn new() -> Result<Self> {
        Self::from_pretrained(EMBEDDING_MODEL_ID)
    }

    pub fn from_pretrained(model_id: &str) -> Result<Self> {
        info!(model_id, "loading static embedding model");
        let model = StaticModel::from_pretrained(model_id, None, None, None)
            .with_context(|| format!("Failed to load embedding model '{}'", model_id))?;
        // The model does not expose its width; measure it on one sample.
        let dimension = model
            .encode(&["образец".to_string()])
            .first()
            .map(Vec::len)
            .unwrap_or(EMBEDDING_DIMENSION);
        Ok(Self { model, dimension })
    }
}

impl EmbeddingBackend for EmbeddingEngine {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(self.model.encode(texts))
    }
}
