//! Deterministic hashed bag-of-words embeddings.
//!
//! Needs no model download and no network, which makes it the provider of
//! choice for tests and air-gapped machines. Quality is lexical only: texts
//! score as similar when they share words.

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::Result;

/// Words too common to carry meaning; ignored when hashing.
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "do", "does", "for", "from", "how", "in",
    "is", "it", "of", "on", "or", "that", "the", "this", "to", "was", "what", "when", "where",
    "which", "who", "why", "with",
];

/// An [`EmbeddingProvider`] that hashes lowercase terms into a fixed number of buckets.
#[derive(Debug, Clone)]
pub struct HashEmbeddingProvider {
    dimensions: usize,
    model_id: String,
}

impl HashEmbeddingProvider {
    /// Create a provider producing `dimensions`-sized vectors.
    pub fn new(dimensions: usize) -> Self {
        let dimensions = dimensions.max(1);
        Self { dimensions, model_id: format!("docchat/hash-bow-{dimensions}") }
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut vector = vec![0.0f32; self.dimensions];
        let lowered = text.to_lowercase();

        for term in lowered
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty() && !STOPWORDS.contains(w))
        {
            vector[djb2(term) % self.dimensions] += 1.0;
        }

        let norm: f32 = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            vector.iter_mut().for_each(|x| *x /= norm);
        }
        vector
    }
}

impl Default for HashEmbeddingProvider {
    fn default() -> Self {
        Self::new(384)
    }
}

fn djb2(term: &str) -> usize {
    term.bytes().fold(5381usize, |hash, b| hash.wrapping_mul(33).wrapping_add(b as usize))
}

#[async_trait]
impl EmbeddingProvider for HashEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        Ok(self.vectorize(text))
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
