//! Embedding provider trait for generating vector embeddings from text.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that generates vector embeddings from text input.
///
/// The same provider (same [`model_id`](EmbeddingProvider::model_id)) must be
/// used to build an index and to query it. The model id is written into the
/// index manifest and checked on load.
///
/// The default [`embed_batch`](EmbeddingProvider::embed_batch) implementation
/// calls [`embed`](EmbeddingProvider::embed) sequentially; backends that
/// support native batching should override it.
///
/// # Example
///
/// ```rust,ignore
/// use docchat_rag::EmbeddingProvider;
///
/// let provider = HashEmbeddingProvider::new(384);
/// let embedding = provider.embed("hello world").await?;
/// assert_eq!(embedding.len(), provider.dimensions());
/// ```
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding vector for a single text input.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embedding vectors for a batch of text inputs.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of embeddings produced by this provider.
    fn dimensions(&self) -> usize;

    /// Stable identifier of the embedding model, e.g.
    /// `sentence-transformers/all-MiniLM-L6-v2`.
    fn model_id(&self) -> &str;
}
