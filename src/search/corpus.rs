use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use super::data_loader::RecipeSource;
use super::vector_store::RecipeVectorStore;
use crate::backend::EmbeddingBackend;
use crate::recipe::RecipeRecord;

/// Query texts are cut to this many characters before embedding.
pub const MAX_QUERY_CHARS: usize = 512;

#[derive(Debug, Clone)]
pub struct ScoredRecipe {
    pub record: Arc<RecipeRecord>,
    /// Cosine similarity, higher is closer.
    pub score: f32,
}

/// Recipe records plus their vector index. Read-only once built.
pub struct RecipeCorpus {
    embedder: Arc<dyn EmbeddingBackend>,
    store: RecipeVectorStore,
}

pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => &text[..byte_idx],
        None => text,
    }
}

impl RecipeCorpus {
    pub fn empty(embedder: Arc<dyn EmbeddingBackend>) -> Self {
        let store = RecipeVectorStore::new(embedder.dimension());
        Self { embedder, store }
    }

    /// Embeds and indexes every record. Records whose title or url is
    /// missing are dropped, never reported as an error.
    pub fn build<I>(records: I, embedder: Arc<dyn EmbeddingBackend>) -> Result<Self>
    where
        I: IntoIterator<Item = Option<crate::recipe::RawRecipe>>,
    {
        let mut dropped = 0usize;
        let valid: Vec<RecipeRecord> = records
            .into_iter()
            .filter_map(|raw| {
                let parsed = raw.and_then(RecipeRecord::from_raw);
                if parsed.is_none() {
                    dropped += 1;
                }
                parsed
            })
            .collect();
        if dropped > 0 {
            warn!(dropped, "skipped recipes with missing mandatory fields");
        }

        let mut corpus = Self::empty(embedder);
        if valid.is_empty() {
            info!("recipe corpus is empty");
            return Ok(corpus);
        }

        let documents: Vec<String> = valid.iter().map(RecipeRecord::document_text).collect();
        info!(count = documents.len(), "embedding recipe documents");
        let embeddings = corpus
            .embedder
            .embed(&documents)
            .context("Failed to generate embeddings for recipe documents")?;
        if embeddings.len() != valid.len() {
            anyhow::bail!(
                "Embedding backend returned {} vectors for {} documents",
                embeddings.len(),
                valid.len()
            );
        }

        corpus
            .store
            .upsert(valid.into_iter().zip(embeddings).collect())
            .context("Failed to index recipe embeddings")?;
        info!(indexed = corpus.len(), "recipe corpus built");
        Ok(corpus)
    }

    /// Builds from a source. A failing source yields an empty corpus.
    pub fn from_source(source: &dyn RecipeSource, embedder: Arc<dyn EmbeddingBackend>) -> Result<Self> {
        match source.load() {
            Ok(records) => Self::build(records, embedder),
            Err(e) => {
                warn!(error = %e, "recipe source unavailable, continuing with an empty corpus");
                Ok(Self::empty(embedder))
            }
        }
    }

    /// Reuses a snapshot when one exists with a matching dimension,
    /// otherwise builds from `source` and writes a fresh snapshot.
    pub fn load_or_build(
        snapshot_path: &Path,
        source: &dyn RecipeSource,
        embedder: Arc<dyn EmbeddingBackend>,
    ) -> Result<Self> {
        if snapshot_path.exists() {
            match RecipeVectorStore::load(snapshot_path, embedder.dimension()) {
                Ok(store) => {
                    info!(path = ?snapshot_path, count = store.len(), "loaded recipe corpus snapshot");
                    return Ok(Self { embedder, store });
                }
                Err(e) => warn!(error = %e, "ignoring unusable corpus snapshot"),
            }
        }
        let corpus = Self::from_source(source, embedder)?;
        if !corpus.is_empty() {
            corpus.save(snapshot_path)?;
        }
        Ok(corpus)
    }

    pub fn save(&self, snapshot_path: &Path) -> Result<()> {
        self.store.save(snapshot_path)
    }

    pub fn len(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    pub fn records(&self) -> &[Arc<RecipeRecord>] {
        self.store.records()
    }

    /// Up to `k` recipes closest to `text`, best first. An empty corpus
    /// answers with an empty list.
    pub fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredRecipe>> {
        if self.store.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let text = truncate_chars(text, MAX_QUERY_CHARS);
        let embedding = self
            .embedder
            .embed_one(text)
            .with_context(|| format!("Failed to embed corpus query: {}", text))?;
        Ok(self
            .store
            .query(&embedding, k)
            .into_iter()
            .map(|(record, score)| ScoredRecipe { record, score })
            .collect())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use std::sync::Mutex;

    /// Bag-of-characters embedder: deterministic, no model download, and
    /// texts sharing words land close to each other.
    #[derive(Default)]
    pub struct CharEmbedder {
        pub seen: Mutex<Vec<String>>,
    }

    pub const CHAR_DIM: usize = 64;

    impl EmbeddingBackend for CharEmbedder {
        fn dimension(&self) -> usize {
            CHAR_DIM
        }

        fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.seen.lock().unwrap().extend(texts.iter().cloned());
            Ok(texts
                .iter()
                .map(|text| {
                    let mut v = vec![0.0; CHAR_DIM];
                    for c in text.to_lowercase().chars().filter(|c| c.is_alphabetic()) {
                        v[(c as usize) % CHAR_DIM] += 1.0;
                    }
                    v
                })
                .collect())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::CharEmbedder;
    use super::*;
    use crate::recipe::RawRecipe;
    use crate::search::data_loader::StaticRecipeSource;
    use tempfile::tempdir;

    fn raw(title: Option<&str>, url: &str, ingredients: Vec<&str>) -> Option<RawRecipe> {
        Some(RawRecipe {
            title: title.map(String::from),
            url: Some(url.to_string()),
            ingredients: Some(ingredients.into_iter().map(String::from).collect()),
            ..Default::default()
        })
    }

    #[test]
    fn build_drops_unparseable_records() -> Result<()> {
        let embedder = Arc::new(CharEmbedder::default());
        let corpus = RecipeCorpus::build(
            vec![
                raw(Some("Омлет"), "https://eda.ru/omlet", vec![]),
                raw(None, "https://eda.ru/untitled", vec!["Соль: щепотка"]),
                None,
            ],
            embedder,
        )?;
        assert_eq!(corpus.len(), 1);
        assert_eq!(corpus.records()[0].title, "Омлет");
        Ok(())
    }

    #[test]
    fn query_finds_closest_recipe() -> Result<()> {
        let embedder = Arc::new(CharEmbedder::default());
        let corpus = RecipeCorpus::build(
            vec![
                raw(Some("Гречка с грибами"), "https://eda.ru/grechka", vec!["Гречка: 200 г", "Грибы: 300 г"]),
                raw(Some("Шоколадный торт"), "https://eda.ru/tort", vec!["Шоколад: 100 г", "Мука: 250 г"]),
            ],
            embedder,
        )?;
        let hits = corpus.query("Гречка с грибами", 1)?;
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].record.url, "https://eda.ru/grechka");

        let hits = corpus.query("Гречка с грибами", 5)?;
        assert_eq!(hits.len(), 2);
        assert!(hits[0].score >= hits[1].score);
        Ok(())
    }

    #[test]
    fn empty_corpus_answers_empty() -> Result<()> {
        let corpus = RecipeCorpus::build(Vec::new(), Arc::new(CharEmbedder::default()))?;
        assert!(corpus.is_empty());
        assert!(corpus.query("что угодно", 1)?.is_empty());
        Ok(())
    }

    #[test]
    fn long_queries_are_truncated_before_embedding() -> Result<()> {
        let embedder = Arc::new(CharEmbedder::default());
        let corpus = RecipeCorpus::build(vec![raw(Some("Суп"), "https://eda.ru/sup", vec![])], embedder.clone())?;
        embedder.seen.lock().unwrap().clear();

        let long_query = "щ".repeat(MAX_QUERY_CHARS + 100);
        corpus.query(&long_query, 1)?;
        let seen = embedder.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].chars().count(), MAX_QUERY_CHARS);
        Ok(())
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate_chars("борщ", 2), "бо");
        assert_eq!(truncate_chars("борщ", 10), "борщ");
        assert_eq!(truncate_chars("", 3), "");
    }

    #[test]
    fn load_or_build_writes_and_reuses_snapshot() -> Result<()> {
        let dir = tempdir()?;
        let snapshot = dir.path().join("corpus.json");
        let source = StaticRecipeSource(vec![raw(Some("Плов"), "https://eda.ru/plov", vec!["Рис: 300 г"])]);

        let built = RecipeCorpus::load_or_build(&snapshot, &source, Arc::new(CharEmbedder::default()))?;
        assert_eq!(built.len(), 1);
        assert!(snapshot.exists());

        let empty_source = StaticRecipeSource(Vec::new());
        let reloaded = RecipeCorpus::load_or_build(&snapshot, &empty_source, Arc::new(CharEmbedder::default()))?;
        assert_eq!(reloaded.len(), 1);
        assert_eq!(reloaded.records()[0].title, "Плов");
        Ok(())
    }

    struct FailingSource;

    impl RecipeSource for FailingSource {
        fn load(&self) -> Result<Vec<Option<RawRecipe>>> {
            Err(anyhow::anyhow!("scraper exhausted its retries"))
        }
    }

    #[test]
    fn failing_source_yields_empty_corpus() -> Result<()> {
        let corpus = RecipeCorpus::from_source(&FailingSource, Arc::new(CharEmbedder::default()))?;
        assert!(corpus.is_empty());
        Ok(())
    }
}
