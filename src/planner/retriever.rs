use anyhow::Result;
use std::sync::Arc;
use tracing::debug;

use crate::search::RecipeCorpus;

/// Joins per-dish grounding segments.
pub const GROUNDING_SEPARATOR: &str = "; ";

/// Best-matching recipe per dish.
const HITS_PER_DISH: usize = 1;

pub struct RecipeRetriever {
    corpus: Arc<RecipeCorpus>,
}

impl RecipeRetriever {
    pub fn new(corpus: Arc<RecipeCorpus>) -> Self {
        Self { corpus }
    }

    /// Query text for one dish: the time budget is appended so that quick
    /// recipes rank higher for users with little time.
    pub fn query_for(dish: &str, max_minutes: u32) -> String {
        format!("{} Готовить не более {} минут", dish.trim(), max_minutes)
    }

    /// One segment per dish, in order. A dish without a match contributes an
    /// empty segment.
    pub fn ground(&self, dishes: &[String], max_minutes: u32) -> Result<String> {
        let mut segments = Vec::with_capacity(dishes.len());
        for dish in dishes {
            let hits = self.corpus.query(&Self::query_for(dish, max_minutes), HITS_PER_DISH)?;
            debug!(dish = %dish, hits = hits.len(), "grounded dish");
            let segment = hits
                .first()
                .map(|hit| hit.record.document_text())
                .unwrap_or_default();
            segments.push(segment);
        }
        Ok(segments.join(GROUNDING_SEPARATOR))
    }
}
