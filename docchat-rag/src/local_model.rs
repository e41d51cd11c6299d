//! Local sentence-embedding provider backed by `fastembed` (ONNX Runtime).
//!
//! This module is only available when the `fastembed` feature is enabled.
//! The first construction downloads the model into the fastembed cache.

use std::sync::Arc;

use async_trait::async_trait;
use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
use tracing::{debug, info};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};

/// Model id recorded in the index for the default model.
pub const DEFAULT_MODEL_ID: &str = "sentence-transformers/all-MiniLM-L6-v2";

/// An [`EmbeddingProvider`] running a sentence-transformer model on the CPU.
pub struct FastEmbedProvider {
    model: Arc<TextEmbedding>,
    model_id: String,
    dimensions: usize,
}

impl FastEmbedProvider {
    /// Load `all-MiniLM-L6-v2` (384 dimensions).
    pub fn new() -> Result<Self> {
        Self::with_model(DEFAULT_MODEL_ID)
    }

    /// Load one of the supported models by its sentence-transformers name.
    pub fn with_model(model_id: &str) -> Result<Self> {
        let (model_name, dimensions, canonical) = match model_id {
            "sentence-transformers/all-MiniLM-L6-v2" | "all-MiniLM-L6-v2" => {
                (EmbeddingModel::AllMiniLML6V2, 384, DEFAULT_MODEL_ID)
            }
            "BAAI/bge-small-en-v1.5" | "bge-small-en-v1.5" => {
                (EmbeddingModel::BGESmallENV15, 384, "BAAI/bge-small-en-v1.5")
            }
            "BAAI/bge-base-en-v1.5" | "bge-base-en-v1.5" => {
                (EmbeddingModel::BGEBaseENV15, 768, "BAAI/bge-base-en-v1.5")
            }
            other => {
                return Err(RagError::ConfigError(format!(
                    "unsupported fastembed model '{other}'"
                )));
            }
        };

        info!(model = canonical, "initializing embedding model");
        let model = TextEmbedding::try_new(InitOptions {
            model_name,
            show_download_progress: true,
            ..Default::default()
        })
        .map_err(|e| RagError::EmbeddingError {
            provider: "fastembed".into(),
            message: format!("failed to load '{canonical}': {e}"),
        })?;

        Ok(Self { model: Arc::new(model), model_id: canonical.to_string(), dimensions })
    }
}

#[async_trait]
impl EmbeddingProvider for FastEmbedProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text]).await?.into_iter().next().ok_or_else(|| {
            RagError::EmbeddingError {
                provider: "fastembed".into(),
                message: "model returned no embedding".into(),
            }
        })
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        debug!(provider = "fastembed", batch_size = texts.len(), "embedding batch");

        // Inference is CPU bound; keep it off the async worker threads.
        let model = Arc::clone(&self.model);
        let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        tokio::task::spawn_blocking(move || model.embed(owned, None))
            .await
            .map_err(|e| RagError::EmbeddingError {
                provider: "fastembed".into(),
                message: format!("embedding task failed: {e}"),
            })?
            .map_err(|e| RagError::EmbeddingError {
                provider: "fastembed".into(),
                message: e.to_string(),
            })
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
