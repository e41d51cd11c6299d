//! Ingestion and retrieval orchestrator.
//!
//! The [`RagPipeline`] composes an [`EmbeddingProvider`], a [`VectorStore`]
//! and a [`Chunker`] into the two workflows the application needs:
//! building an index (chunk → embed → store) and retrieving context for a
//! question (embed → search → optional threshold).
//!
//! # Example
//!
//! ```rust,ignore
//! use docchat_rag::{RagPipeline, RagConfig, LocalVectorStore, RecursiveChunker};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(embedder))
//!     .vector_store(Arc::new(LocalVectorStore::create("db").await?))
//!     .chunker(Arc::new(RecursiveChunker::new(1000, 200)))
//!     .build()?;
//!
//! let report = pipeline.build_index(DEFAULT_COLLECTION, &documents, IndexWriteMode::Overwrite).await?;
//! let results = pipeline.query(DEFAULT_COLLECTION, "What is the capital of France?").await?;
//! ```

use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, error, info};

use crate::chunking::Chunker;
use crate::config::RagConfig;
use crate::document::{Chunk, Document, SearchResult};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::vectorstore::{CollectionSpec, VectorStore};

/// Collection that holds the ingested documents.
pub const DEFAULT_COLLECTION: &str = "documents";

/// What happens to an existing collection when an index is built again.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexWriteMode {
    /// Drop the collection and rebuild it from the new chunks.
    #[default]
    Overwrite,
    /// Keep existing chunks; new chunks with the same id replace old ones.
    Append,
}

impl FromStr for IndexWriteMode {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "overwrite" => Ok(Self::Overwrite),
            "append" => Ok(Self::Append),
            other => Err(RagError::ConfigError(format!(
                "unknown index write mode '{other}' (expected 'overwrite' or 'append')"
            ))),
        }
    }
}

/// Outcome of [`RagPipeline::build_index`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    /// Documents that contributed at least one chunk.
    pub documents: usize,
    /// Chunks embedded and stored by this build.
    pub chunks: usize,
    /// Chunks in the collection afterwards.
    pub total: usize,
}

/// The ingestion and retrieval pipeline.
///
/// Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    vector_store: Arc<dyn VectorStore>,
    chunker: Arc<dyn Chunker>,
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("config", &self.config)
            .field("embedding_model", &self.embedding_provider.model_id())
            .finish_non_exhaustive()
    }
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the vector store.
    pub fn vector_store(&self) -> &Arc<dyn VectorStore> {
        &self.vector_store
    }

    /// The collection spec implied by the embedding provider.
    pub fn collection_spec(&self) -> CollectionSpec {
        CollectionSpec {
            dimensions: self.embedding_provider.dimensions(),
            embedding_model: self.embedding_provider.model_id().to_string(),
        }
    }

    /// Create a named collection for this pipeline's embedding model.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ModelMismatch`] if the collection already exists
    /// with another model, [`RagError::PipelineError`] for other store failures.
    pub async fn create_collection(&self, name: &str) -> Result<()> {
        self.vector_store.create_collection(name, &self.collection_spec()).await.map_err(|e| {
            error!(collection = name, error = %e, "failed to create collection");
            wrap(e, || format!("failed to create collection '{name}'"))
        })
    }

    /// Check that `name` exists and was built with this pipeline's model.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ModelMismatch`] on a different model and
    /// [`RagError::PipelineError`] if the collection does not exist.
    pub async fn verify_collection(&self, name: &str) -> Result<CollectionSpec> {
        let stored = self.vector_store.collection_spec(name).await?.ok_or_else(|| {
            RagError::PipelineError(format!("collection '{name}' does not exist"))
        })?;
        let expected = self.collection_spec();
        if stored.embedding_model != expected.embedding_model {
            return Err(RagError::ModelMismatch {
                expected: stored.embedding_model,
                found: expected.embedding_model,
            });
        }
        if stored.dimensions != expected.dimensions {
            return Err(RagError::PipelineError(format!(
                "collection '{name}' stores {}-dimensional vectors, embedder produces {}",
                stored.dimensions, expected.dimensions
            )));
        }
        Ok(stored)
    }

    /// Split documents into chunks, preserving document order.
    pub fn chunk_documents(&self, documents: &[Document]) -> Vec<Chunk> {
        let chunks: Vec<Chunk> = documents.iter().flat_map(|d| self.chunker.chunk(d)).collect();
        info!(documents = documents.len(), chunks = chunks.len(), "split documents into chunks");
        chunks
    }

    /// Build (or extend) `collection` from `documents`.
    ///
    /// # Errors
    ///
    /// See [`index_chunks`](RagPipeline::index_chunks).
    pub async fn build_index(
        &self,
        collection: &str,
        documents: &[Document],
        mode: IndexWriteMode,
    ) -> Result<IndexReport> {
        let chunks = self.chunk_documents(documents);
        self.index_chunks(collection, chunks, mode).await
    }

    /// Embed and store already split `chunks` into `collection`.
    ///
    /// Every chunk is embedded before the store is touched. With
    /// [`IndexWriteMode::Overwrite`] the collection is then replaced in one
    /// step, so a failed rebuild leaves the previous index as it was.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if there are no chunks or
    /// embedding/storage fails, and [`RagError::ModelMismatch`] when
    /// appending to a collection built with another model.
    pub async fn index_chunks(
        &self,
        collection: &str,
        chunks: Vec<Chunk>,
        mode: IndexWriteMode,
    ) -> Result<IndexReport> {
        if chunks.is_empty() {
            return Err(RagError::PipelineError("no chunks to index".into()));
        }
        let documents = chunks.iter().map(|c| c.document_id.as_str()).collect::<HashSet<_>>().len();

        if mode == IndexWriteMode::Append {
            self.create_collection(collection).await?;
        }
        let chunks = self.embed_chunks(chunks).await?;

        let written = match mode {
            IndexWriteMode::Overwrite => {
                self.vector_store.replace_collection(collection, &self.collection_spec(), &chunks).await
            }
            IndexWriteMode::Append => self.vector_store.upsert(collection, &chunks).await,
        };
        written.map_err(|e| {
            error!(collection, error = %e, "failed to write index");
            wrap(e, || format!("failed to write collection '{collection}'"))
        })?;

        let total = self.vector_store.count(collection).await?;
        info!(collection, chunks = chunks.len(), total, ?mode, "index built");

        Ok(IndexReport { documents, chunks: chunks.len(), total })
    }

    /// Attach embeddings to `chunks`, `embed_batch_size` texts per request.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if a batch fails to embed or the
    /// provider returns the wrong number of vectors.
    pub async fn embed_chunks(&self, chunks: Vec<Chunk>) -> Result<Vec<Chunk>> {
        let total = chunks.len();
        let mut embedded = Vec::with_capacity(total);

        for mut batch in chunks_into_batches(chunks, self.config.embed_batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
                error!(error = %e, "embedding failed during ingestion");
                RagError::PipelineError(format!("embedding failed: {e}"))
            })?;
            if embeddings.len() != batch.len() {
                return Err(RagError::PipelineError(format!(
                    "embedding provider returned {} vectors for {} chunks",
                    embeddings.len(),
                    batch.len()
                )));
            }
            for (chunk, embedding) in batch.iter_mut().zip(embeddings) {
                chunk.embedding = embedding;
            }
            embedded.extend(batch);
            debug!(done = embedded.len(), total, "embedded batch");
        }

        Ok(embedded)
    }

    /// Retrieve the `top_k` chunks most similar to `query`.
    ///
    /// Results are ordered by descending score. When a similarity threshold
    /// is configured, results below it are dropped.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] if embedding or search fails.
    pub async fn query(&self, collection: &str, query: &str) -> Result<Vec<SearchResult>> {
        let query_embedding = self.embedding_provider.embed(query).await.map_err(|e| {
            error!(error = %e, "embedding failed during query");
            RagError::PipelineError(format!("query embedding failed: {e}"))
        })?;

        let results = self
            .vector_store
            .search(collection, &query_embedding, self.config.top_k)
            .await
            .map_err(|e| {
                error!(collection, error = %e, "vector store search failed");
                RagError::PipelineError(format!("search failed in collection '{collection}': {e}"))
            })?;

        let results: Vec<SearchResult> = match self.config.similarity_threshold {
            Some(threshold) => results.into_iter().filter(|r| r.score >= threshold).collect(),
            None => results,
        };

        info!(result_count = results.len(), "query completed");
        Ok(results)
    }
}

fn chunks_into_batches(chunks: Vec<Chunk>, size: usize) -> Vec<Vec<Chunk>> {
    let size = size.max(1);
    let mut batches = Vec::with_capacity(chunks.len().div_ceil(size));
    let mut iter = chunks.into_iter().peekable();
    while iter.peek().is_some() {
        batches.push(iter.by_ref().take(size).collect());
    }
    batches
}

/// Keep model mismatches as they are; wrap everything else with context.
fn wrap(e: RagError, context: impl FnOnce() -> String) -> RagError {
    match e {
        RagError::ModelMismatch { .. } => e,
        other => RagError::PipelineError(format!("{}: {other}", context())),
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// Every field is required. Call [`build()`](RagPipelineBuilder::build)
/// to validate and produce the pipeline.
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    vector_store: Option<Arc<dyn VectorStore>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the vector store backend.
    pub fn vector_store(mut self, store: Arc<dyn VectorStore>) -> Self {
        self.vector_store = Some(store);
        self
    }

    /// Set the document chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`RagPipeline`], validating that all required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any required field is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let vector_store = self
            .vector_store
            .ok_or_else(|| RagError::ConfigError("vector_store is required".to_string()))?;
        let chunker =
            self.chunker.ok_or_else(|| RagError::ConfigError("chunker is required".to_string()))?;

        Ok(RagPipeline { config, embedding_provider, vector_store, chunker })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{HashEmbeddingProvider, InMemoryVectorStore, RecursiveChunker};
    use std::collections::HashMap;
    use std::path::PathBuf;

    fn pipeline(store: Arc<InMemoryVectorStore>, batch: usize) -> RagPipeline {
        RagPipeline::builder()
            .config(RagConfig::builder().embed_batch_size(batch).build().unwrap())
            .embedding_provider(Arc::new(HashEmbeddingProvider::new(64)))
            .vector_store(store)
            .chunker(Arc::new(RecursiveChunker::new(1000, 200)))
            .build()
            .unwrap()
    }

    fn doc(id: &str, text: &str) -> Document {
        Document {
            id: id.into(),
            source_path: PathBuf::from(id),
            text: text.into(),
            metadata: HashMap::new(),
        }
    }

    #[test]
    fn builder_requires_every_part() {
        let err = RagPipeline::builder().config(RagConfig::default()).build().unwrap_err();
        assert!(matches!(err, RagError::ConfigError(_)));
    }

    #[test]
    fn write_mode_parses_case_insensitively() {
        assert_eq!("Append".parse::<IndexWriteMode>().unwrap(), IndexWriteMode::Append);
        assert!("merge".parse::<IndexWriteMode>().is_err());
    }

    #[test]
    fn batches_keep_order_and_remainder() {
        let chunks: Vec<Chunk> = (0..5)
            .map(|i| Chunk {
                id: i.to_string(),
                text: String::new(),
                embedding: Vec::new(),
                metadata: HashMap::new(),
                document_id: "d".into(),
            })
            .collect();
        let sizes: Vec<usize> = chunks_into_batches(chunks, 2).iter().map(Vec::len).collect();
        assert_eq!(sizes, [2, 2, 1]);
    }

    #[tokio::test]
    async fn overwrite_replaces_and_append_accumulates() {
        let store = Arc::new(InMemoryVectorStore::new());
        let pipeline = pipeline(store.clone(), 1);

        let first = [doc("a.txt", "alpha"), doc("b.txt", "beta")];
        let report = pipeline.build_index("c", &first, IndexWriteMode::Overwrite).await.unwrap();
        assert_eq!(report, IndexReport { documents: 2, chunks: 2, total: 2 });

        let second = [doc("c.txt", "gamma")];
        let report = pipeline.build_index("c", &second, IndexWriteMode::Append).await.unwrap();
        assert_eq!(report.total, 3);

        let report = pipeline.build_index("c", &second, IndexWriteMode::Overwrite).await.unwrap();
        assert_eq!(report.total, 1);
    }

    #[tokio::test]
    async fn empty_documents_do_not_build_an_index() {
        let store = Arc::new(InMemoryVectorStore::new());
        let pipeline = pipeline(store.clone(), 8);
        let err = pipeline
            .build_index("c", &[doc("blank.txt", "  \n ")], IndexWriteMode::Overwrite)
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::PipelineError(_)));
        assert!(store.collection_spec("c").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn verify_detects_model_drift() {
        let store = Arc::new(InMemoryVectorStore::new());
        let spec = CollectionSpec { dimensions: 64, embedding_model: "other-model".into() };
        store.create_collection("c", &spec).await.unwrap();

        let err = pipeline(store, 8).verify_collection("c").await.unwrap_err();
        assert!(matches!(err, RagError::ModelMismatch { .. }));
    }

    #[tokio::test]
    async fn threshold_filters_low_scores() {
        let store = Arc::new(InMemoryVectorStore::new());
        let pipeline = RagPipeline::builder()
            .config(RagConfig::builder().similarity_threshold(0.5).build().unwrap())
            .embedding_provider(Arc::new(HashEmbeddingProvider::new(4096)))
            .vector_store(store)
            .chunker(Arc::new(RecursiveChunker::new(1000, 200)))
            .build()
            .unwrap();
        pipeline
            .build_index(
                "c",
                &[doc("a.txt", "paris france capital"), doc("b.txt", "zebra")],
                IndexWriteMode::Overwrite,
            )
            .await
            .unwrap();

        let results = pipeline.query("c", "capital france paris").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].chunk.document_id, "a.txt");
    }
}
