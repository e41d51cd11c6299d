//! In-memory vector store using cosine similarity.
//!
//! [`InMemoryVectorStore`] keeps every collection in insertion order behind a
//! `tokio::sync::RwLock`. It backs the directory-based
//! [`LocalVectorStore`](crate::LocalVectorStore) and is handy on its own for tests.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{Chunk, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionSpec, VectorStore};

const BACKEND: &str = "InMemory";

/// One collection: chunks in insertion order plus an id → position index.
#[derive(Debug, Clone)]
struct Collection {
    spec: CollectionSpec,
    chunks: Vec<Chunk>,
    positions: HashMap<String, usize>,
}

impl Collection {
    fn new(spec: CollectionSpec) -> Self {
        Self { spec, chunks: Vec::new(), positions: HashMap::new() }
    }

    fn upsert(&mut self, chunk: Chunk) {
        match self.positions.get(&chunk.id) {
            Some(&pos) => self.chunks[pos] = chunk,
            None => {
                self.positions.insert(chunk.id.clone(), self.chunks.len());
                self.chunks.push(chunk);
            }
        }
    }
}

/// An in-memory vector store using cosine similarity for search.
///
/// # Example
///
/// ```rust,ignore
/// use docchat_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new();
/// store.create_collection("docs", &spec).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryVectorStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl InMemoryVectorStore {
    /// Create a new empty in-memory vector store.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn missing(collection: &str) -> RagError {
    RagError::VectorStoreError {
        backend: BACKEND.to_string(),
        message: format!("collection '{collection}' does not exist"),
    }
}

/// Check that `spec` is compatible with an existing collection's spec.
pub(crate) fn ensure_compatible(existing: &CollectionSpec, requested: &CollectionSpec) -> Result<()> {
    if existing.embedding_model != requested.embedding_model {
        return Err(RagError::ModelMismatch {
            expected: existing.embedding_model.clone(),
            found: requested.embedding_model.clone(),
        });
    }
    if existing.dimensions != requested.dimensions {
        return Err(RagError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: format!(
                "collection has {} dimensions, requested {}",
                existing.dimensions, requested.dimensions
            ),
        });
    }
    Ok(())
}

/// Check that every chunk's embedding has the collection's length.
pub(crate) fn check_dimensions(spec: &CollectionSpec, chunks: &[Chunk]) -> Result<()> {
    match chunks.iter().find(|c| c.embedding.len() != spec.dimensions) {
        Some(bad) => Err(RagError::VectorStoreError {
            backend: BACKEND.to_string(),
            message: format!(
                "chunk '{}' has {} dimensions, collection expects {}",
                bad.id,
                bad.embedding.len(),
                spec.dimensions
            ),
        }),
        None => Ok(()),
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn create_collection(&self, name: &str, spec: &CollectionSpec) -> Result<()> {
        let mut collections = self.collections.write().await;
        match collections.get(name) {
            Some(existing) => ensure_compatible(&existing.spec, spec),
            None => {
                collections.insert(name.to_string(), Collection::new(spec.clone()));
                Ok(())
            }
        }
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        let mut collections = self.collections.write().await;
        collections.remove(name);
        Ok(())
    }

    async fn collection_spec(&self, name: &str) -> Result<Option<CollectionSpec>> {
        let collections = self.collections.read().await;
        Ok(collections.get(name).map(|c| c.spec.clone()))
    }

    async fn replace_collection(
        &self,
        name: &str,
        spec: &CollectionSpec,
        chunks: &[Chunk],
    ) -> Result<()> {
        check_dimensions(spec, chunks)?;
        let mut fresh = Collection::new(spec.clone());
        for chunk in chunks {
            fresh.upsert(chunk.clone());
        }
        self.collections.write().await.insert(name.to_string(), fresh);
        Ok(())
    }

    async fn upsert(&self, collection: &str, chunks: &[Chunk]) -> Result<()> {
        let mut collections = self.collections.write().await;
        let store = collections.get_mut(collection).ok_or_else(|| missing(collection))?;

        check_dimensions(&store.spec, chunks)?;
        for chunk in chunks {
            store.upsert(chunk.clone());
        }
        Ok(())
    }

    async fn count(&self, collection: &str) -> Result<usize> {
        let collections = self.collections.read().await;
        collections.get(collection).map(|c| c.chunks.len()).ok_or_else(|| missing(collection))
    }

    async fn search(
        &self,
        collection: &str,
        embedding: &[f32],
        top_k: usize,
    ) -> Result<Vec<SearchResult>> {
        let collections = self.collections.read().await;
        let store = collections.get(collection).ok_or_else(|| missing(collection))?;

        if embedding.len() != store.spec.dimensions {
            return Err(RagError::VectorStoreError {
                backend: BACKEND.to_string(),
                message: format!(
                    "query has {} dimensions, collection expects {}",
                    embedding.len(),
                    store.spec.dimensions
                ),
            });
        }

        let mut scored: Vec<SearchResult> = store
            .chunks
            .iter()
            .map(|chunk| SearchResult {
                score: cosine_similarity(&chunk.embedding, embedding),
                chunk: chunk.clone(),
            })
            .collect();

        // Stable sort: ties stay in insertion order.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(model: &str, dimensions: usize) -> CollectionSpec {
        CollectionSpec { dimensions, embedding_model: model.into() }
    }

    fn chunk(id: &str, embedding: Vec<f32>) -> Chunk {
        Chunk {
            id: id.into(),
            text: id.into(),
            embedding,
            metadata: HashMap::new(),
            document_id: "doc".into(),
        }
    }

    #[tokio::test]
    async fn ties_keep_insertion_order() {
        let store = InMemoryVectorStore::new();
        store.create_collection("c", &spec("m", 2)).await.unwrap();
        store
            .upsert(
                "c",
                &[chunk("b", vec![1.0, 0.0]), chunk("a", vec![1.0, 0.0]), chunk("z", vec![0.0, 1.0])],
            )
            .await
            .unwrap();

        let results = store.search("c", &[1.0, 0.0], 3).await.unwrap();
        let ids: Vec<&str> = results.iter().map(|r| r.chunk.id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "z"]);
    }

    #[tokio::test]
    async fn upsert_replaces_in_place() {
        let store = InMemoryVectorStore::new();
        store.create_collection("c", &spec("m", 2)).await.unwrap();
        store.upsert("c", &[chunk("a", vec![1.0, 0.0]), chunk("b", vec![0.0, 1.0])]).await.unwrap();
        store.upsert("c", &[chunk("a", vec![0.0, 1.0])]).await.unwrap();

        assert_eq!(store.count("c").await.unwrap(), 2);
        let results = store.search("c", &[0.0, 1.0], 2).await.unwrap();
        assert_eq!(results[0].chunk.id, "a");
    }

    #[tokio::test]
    async fn recreating_with_another_model_is_rejected() {
        let store = InMemoryVectorStore::new();
        store.create_collection("c", &spec("m1", 2)).await.unwrap();
        store.create_collection("c", &spec("m1", 2)).await.unwrap();
        let err = store.create_collection("c", &spec("m2", 2)).await.unwrap_err();
        assert!(matches!(err, RagError::ModelMismatch { .. }));
    }

    #[tokio::test]
    async fn replace_keeps_old_contents_on_bad_chunks() {
        let store = InMemoryVectorStore::new();
        store.create_collection("c", &spec("m", 2)).await.unwrap();
        store.upsert("c", &[chunk("a", vec![1.0, 0.0])]).await.unwrap();

        let bad = [chunk("b", vec![0.0, 1.0]), chunk("c", vec![1.0])];
        assert!(store.replace_collection("c", &spec("m", 2), &bad).await.is_err());
        assert_eq!(store.count("c").await.unwrap(), 1);

        store.replace_collection("c", &spec("m2", 2), &[chunk("b", vec![0.0, 1.0])]).await.unwrap();
        assert_eq!(store.count("c").await.unwrap(), 1);
        assert_eq!(store.collection_spec("c").await.unwrap().unwrap().embedding_model, "m2");
    }

    #[tokio::test]
    async fn wrong_dimension_chunks_are_rejected() {
        let store = InMemoryVectorStore::new();
        store.create_collection("c", &spec("m", 3)).await.unwrap();
        assert!(store.upsert("c", &[chunk("a", vec![1.0])]).await.is_err());
    }
}
