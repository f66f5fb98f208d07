use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::errors::{Result, TaxotagError};
use crate::utils::similarity::cosine_similarity;

/// Minimum word-vector similarity for a neighbor to be considered.
pub const WORD_SIMILARITY_THRESHOLD: f64 = 0.7;

/// How many similar words a live vector query returns.
pub const TOP_SIMILAR_WORDS: usize = 10;

/// One entry of the cached neighbor model: a vocabulary word `wet` close to
/// the queried word (similarity `sim_w`), mapped to an underscore-form topic
/// with a precomputed string similarity `sim_t`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NeighborTopic {
    pub topic: String,
    pub sim_t: f64,
    pub wet: String,
    pub sim_w: f64,
}

pub type NeighborCache = FxHashMap<String, Vec<NeighborTopic>>;

#[derive(Debug, Default)]
pub struct EmbeddingStore {
    cache: NeighborCache,
    vectors: FxHashMap<String, Vec<f32>>,
    embedding_size: usize,
}

impl EmbeddingStore {
    /// Loads the cached neighbor model, and the full vector store when a
    /// path for it is given.
    pub fn load(cache_path: impl AsRef<Path>, vectors_path: Option<&Path>) -> Result<Self> {
        let cache_path = cache_path.as_ref();
        if !cache_path.exists() {
            return Err(TaxotagError::AssetMissing(cache_path.to_path_buf()));
        }
        let cache: NeighborCache =
            serde_json::from_reader(BufReader::new(File::open(cache_path)?))?;

        let vectors = match vectors_path {
            Some(path) => {
                if !path.exists() {
                    return Err(TaxotagError::AssetMissing(path.to_path_buf()));
                }
                serde_json::from_reader(BufReader::new(File::open(path)?))?
            }
            None => FxHashMap::default(),
        };

        Ok(Self::from_parts(cache, vectors))
    }

    pub fn from_parts(cache: NeighborCache, vectors: FxHashMap<String, Vec<f32>>) -> Self {
        let embedding_size = vectors.values().map(Vec::len).max().unwrap_or(0);
        Self {
            cache,
            vectors,
            embedding_size,
        }
    }

    pub fn has_cached(&self, word: &str) -> bool {
        self.cache.contains_key(word)
    }

    pub fn neighbors(&self, word: &str) -> &[NeighborTopic] {
        self.cache.get(word).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_vector(&self, word: &str) -> bool {
        self.vectors.contains_key(word)
    }

    pub fn embedding_size(&self) -> usize {
        self.embedding_size
    }

    /// Vector of an underscore-form topic label: the label's own vector when
    /// present, otherwise the sum of its token vectors. Missing tokens
    /// contribute nothing; a label with no known token yields all zeros.
    pub fn label_vector(&self, label_wu: &str) -> Vec<f32> {
        if let Some(vector) = self.vectors.get(label_wu) {
            return vector.clone();
        }
        let mut summed = vec![0.0f32; self.embedding_size];
        for token in label_wu.split('_') {
            if let Some(vector) = self.vectors.get(token) {
                for (slot, value) in summed.iter_mut().zip(vector.iter()) {
                    *slot += value;
                }
            }
        }
        summed
    }

    /// Top-k vocabulary words by cosine similarity to the query tokens,
    /// filtered by the word-similarity threshold. The query vector is the
    /// sum of the available token vectors; query tokens themselves are
    /// excluded from the result.
    pub fn similar_words(&self, query_tokens: &[&str], limit: usize) -> Vec<(String, f64)> {
        let mut query = vec![0.0f32; self.embedding_size];
        let mut any = false;
        for token in query_tokens {
            if let Some(vector) = self.vectors.get(*token) {
                any = true;
                for (slot, value) in query.iter_mut().zip(vector.iter()) {
                    *slot += value;
                }
            }
        }
        if !any {
            return Vec::new();
        }

        let mut scored: Vec<(String, f64)> = self
            .vectors
            .iter()
            .filter(|(word, _)| !query_tokens.contains(&word.as_str()))
            .map(|(word, vector)| (word.clone(), cosine_similarity(&query, vector)))
            .filter(|(_, similarity)| *similarity >= WORD_SIMILARITY_THRESHOLD)
            .collect();
        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(limit);
        scored
    }
}
