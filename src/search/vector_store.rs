//! A small in-process cosine-similarity index over recipe documents.
#![forbid(unsafe_code)]

use anyhow::{Context, Result};
use base64::{engine::general_purpose, Engine as _};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};
use std::fs;
use std::path::Path;
use std::sync::Arc;

use crate::persistence::write_json_atomic;
use crate::recipe::RecipeRecord;

type Float = f32;

/// On-disk layout. Records are stored alongside a flat row-major matrix of
/// normalized vectors, base64 of little-endian f32.
#[derive(Serialize)]
struct SnapshotOut<'a> {
    embedding_dim: usize,
    entries: Vec<&'a RecipeRecord>,
    #[serde(serialize_with = "base64_floats::serialize")]
    matrix: &'a [Float],
}

#[derive(Deserialize)]
struct SnapshotIn {
    embedding_dim: usize,
    entries: Vec<RecipeRecord>,
    #[serde(deserialize_with = "base64_floats::deserialize")]
    matrix: Vec<Float>,
}

mod base64_floats {
    use super::*;
    use bytemuck::cast_slice;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(vec: &&[Float], serializer: S) -> Result<S::Ok, S::Error> {
        let bytes: &[u8] = cast_slice(vec);
        serializer.serialize_str(&general_purpose::STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<Float>, D::Error> {
        let s = String::deserialize(deserializer)?;
        let bytes = general_purpose::STANDARD
            .decode(s)
            .map_err(serde::de::Error::custom)?;
        if bytes.len() % 4 != 0 {
            return Err(serde::de::Error::custom("matrix byte length is not a multiple of 4"));
        }
        Ok(bytes
            .chunks_exact(4)
            .map(|chunk| Float::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect())
    }
}

#[derive(PartialEq)]
struct ScoredIndex {
    score: Float,
    index: usize,
}

impl Eq for ScoredIndex {}

impl PartialOrd for ScoredIndex {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredIndex {
    // Reversed so the BinaryHeap pops the lowest score first; NaN sorts lowest.
    fn cmp(&self, other: &Self) -> Ordering {
        other.score.partial_cmp(&self.score).unwrap_or_else(|| {
            match (self.score.is_nan(), other.score.is_nan()) {
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                _ => Ordering::Equal,
            }
        })
        // Stable order between equal scores: earlier insertion wins.
        .then_with(|| self.index.cmp(&other.index))
    }
}

#[derive(Debug)]
pub struct RecipeVectorStore {
    embedding_dim: usize,
    entries: Vec<Arc<RecipeRecord>>,
    by_url: HashMap<String, usize>,
    matrix: Vec<Float>,
}

impl RecipeVectorStore {
    pub fn new(embedding_dim: usize) -> Self {
        Self {
            embedding_dim,
            entries: Vec::new(),
            by_url: HashMap::new(),
            matrix: Vec::new(),
        }
    }

    pub fn embedding_dim(&self) -> usize {
        self.embedding_dim
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn records(&self) -> &[Arc<RecipeRecord>] {
        &self.entries
    }

    /// Inserts new records and overwrites the vector of any record whose url
    /// is already present. Returns `(updated, inserted)` urls.
    pub fn upsert(&mut self, items: Vec<(RecipeRecord, Vec<Float>)>) -> Result<(Vec<String>, Vec<String>)> {
        let mut updates = Vec::new();
        let mut inserts = Vec::new();

        for (record, vector) in items {
            if vector.len() != self.embedding_dim {
                anyhow::bail!(
                    "Embedding dimension mismatch for '{}': expected {}, got {}",
                    record.url,
                    self.embedding_dim,
                    vector.len()
                );
            }
            let norm_vec = normalize(&vector);
            match self.by_url.get(&record.url) {
                Some(&pos) => {
                    let start = pos * self.embedding_dim;
                    self.matrix[start..start + self.embedding_dim].copy_from_slice(&norm_vec);
                    updates.push(record.url.clone());
                    self.entries[pos] = Arc::new(record);
                }
                None => {
                    self.by_url.insert(record.url.clone(), self.entries.len());
                    self.matrix.extend_from_slice(&norm_vec);
                    inserts.push(record.url.clone());
                    self.entries.push(Arc::new(record));
                }
            }
        }

        Ok((updates, inserts))
    }

    /// Top `top_k` entries by cosine similarity, best first.
    pub fn query(&self, query: &[Float], top_k: usize) -> Vec<(Arc<RecipeRecord>, Float)> {
        if self.entries.is_empty() || top_k == 0 || query.len() != self.embedding_dim {
            return Vec::new();
        }
        let query_norm = normalize(query);

        let scores: Vec<Float> = self
            .matrix
            .par_chunks_exact(self.embedding_dim)
            .map(|row| dot_product(row, &query_norm))
            .collect();

        let mut heap = BinaryHeap::with_capacity(top_k + 1);
        for (index, score) in scores.into_iter().enumerate() {
            heap.push(ScoredIndex { score, index });
            if heap.len() > top_k {
                heap.pop();
            }
        }

        heap.into_sorted_vec()
            .into_iter()
            .map(|si| (Arc::clone(&self.entries[si.index]), si.score))
            .collect()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let snapshot = SnapshotOut {
            embedding_dim: self.embedding_dim,
            entries: self.entries.iter().map(|e| e.as_ref()).collect(),
            matrix: &self.matrix,
        };
        write_json_atomic(path, &snapshot).with_context(|| format!("Failed to write corpus snapshot {:?}", path))
    }

    pub fn load(path: &Path, embedding_dim: usize) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read corpus snapshot {:?}", path))?;
        let snapshot: SnapshotIn = serde_json::from_str(&contents)
            .with_context(|| format!("Corpus snapshot {:?} is malformed", path))?;

        if snapshot.embedding_dim != embedding_dim {
            anyhow::bail!(
                "Embedding dimension mismatch: snapshot has {}, expected {}",
                snapshot.embedding_dim,
                embedding_dim
            );
        }
        let expected_len = snapshot.entries.len() * snapshot.embedding_dim;
        if snapshot.matrix.len() != expected_len {
            anyhow::bail!(
                "Matrix size mismatch: expected {}, got {}",
                expected_len,
                snapshot.matrix.len()
            );
        }

        let mut by_url = HashMap::with_capacity(snapshot.entries.len());
        for (pos, record) in snapshot.entries.iter().enumerate() {
            if by_url.insert(record.url.clone(), pos).is_some() {
                anyhow::bail!("Duplicate url in corpus snapshot: {}", record.url);
            }
        }

        Ok(Self {
            embedding_dim,
            entries: snapshot.entries.into_iter().map(Arc::new).collect(),
            by_url,
            matrix: snapshot.matrix,
        })
    }
}

#[inline]
fn dot_product(a: &[Float], b: &[Float]) -> Float {
    a.iter().zip(b.iter()).map(|(x, y)| x * y).sum()
}

/// Scales a vector to unit length. The zero vector is returned unchanged.
pub fn normalize(vector: &[Float]) -> Vec<Float> {
    let norm_sq: Float = vector.iter().map(|&x| x * x).sum();
    if norm_sq == 0.0 {
        return vec![0.0; vector.len()];
    }
    let inv_norm = 1.0 / norm_sq.sqrt();
    vector.iter().map(|&x| x * inv_norm).collect()
}
