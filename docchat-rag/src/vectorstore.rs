//! Vector store trait for storing and searching vector embeddings.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::document::{Chunk, SearchResult};
use crate::error::Result;

/// What a collection's vectors are: their size and the model that produced them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSpec {
    /// Length of every stored embedding.
    pub dimensions: usize,
    /// [`EmbeddingProvider::model_id`](crate::EmbeddingProvider::model_id) of the producer.
    pub embedding_model: String,
}

/// A storage backend for vector embeddings with similarity search.
///
/// Implementations manage named collections of [`Chunk`]s and support
/// upserting and searching by cosine similarity.
///
/// # Example
///
/// ```rust,ignore
/// use docchat_rag::{CollectionSpec, InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// let spec = CollectionSpec { dimensions: 384, embedding_model: "m".into() };
/// store.create_collection("docs", &spec).await?;
/// store.upsert("docs", &chunks).await?;
/// let results = store.search("docs", &query_embedding, 4).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Create a named collection. No-op if it already exists with the same spec.
    ///
    /// Fails with [`RagError::ModelMismatch`](crate::RagError::ModelMismatch) if the
    /// collection exists and was built with a different embedding model.
    async fn create_collection(&self, name: &str, spec: &CollectionSpec) -> Result<()>;

    /// Delete a named collection and all its data. No-op if it does not exist.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Return the spec of a collection, or `None` if it does not exist.
    async fn collection_spec(&self, name: &str) -> Result<Option<CollectionSpec>>;

    /// Replace the contents of a collection, creating it if needed.
    ///
    /// Persistent backends override this so that a failed replace leaves
    /// the previous contents in place. The default deletes, recreates and
    /// upserts.
    async fn replace_collection(
        &self,
        name: &str,
        spec: &CollectionSpec,
        chunks: &[Chunk],
    ) -> Result<()> {
        self.delete_collection(name).await?;
        self.create_collection(name, spec).await?;
        self.upsert(name, chunks).await
    }

    /// Upsert chunks into a collection. Chunks must have embeddings set.
    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()>;

    /// Number of chunks stored in a collection.
    async fn count(&self, collection: &str) -> Result<usize>;

    /// Search for the `top_k` most similar chunks to the given embedding.
    ///
    /// Returns results ordered by descending similarity score. Equal scores
    /// keep insertion order.
    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>>;
}
