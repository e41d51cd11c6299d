//! Error types for the `docchat-rag` crate.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur while ingesting, indexing, retrieving or answering.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// A single file could not be turned into text.
    #[error("Failed to extract text from {}: {message}", path.display())]
    ExtractionError {
        /// The file being extracted.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// The OCR engine could not be initialised or failed on an image.
    #[error("OCR error: {0}")]
    OcrError(String),

    /// An error occurred during document chunking.
    #[error("Chunking error: {0}")]
    ChunkingError(String),

    /// A configuration validation error, including missing credentials.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// The persisted index exists but cannot be read.
    #[error("Index at {} is corrupt: {message}", path.display())]
    IndexCorrupt {
        /// The file or directory that failed to load.
        path: PathBuf,
        /// A description of the failure.
        message: String,
    },

    /// The index was built with a different embedding model than the one in use.
    #[error("Embedding model mismatch: index was built with '{expected}', current provider is '{found}'")]
    ModelMismatch {
        /// Model recorded in the index manifest.
        expected: String,
        /// Model of the provider attempting to use the index.
        found: String,
    },

    /// The hosted language model rejected or failed the request.
    #[error("LLM error ({provider}): {message}")]
    LlmError {
        /// The LLM provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An operation exceeded its deadline.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        /// The operation that timed out.
        operation: String,
        /// The configured deadline.
        after: Duration,
    },

    /// An error in the RAG pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),

    /// Filesystem error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
