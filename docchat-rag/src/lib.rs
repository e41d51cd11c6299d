//! Retrieval-augmented question answering over a folder of documents.
//!
//! This crate provides:
//! - Text extraction from PDF, Word, plain text and images (OCR)
//! - Recursive and fixed-size character chunking with overlap
//! - Embedding providers and a directory-backed vector index
//! - Top-k cosine retrieval and LLM answer synthesis with conversation memory
//!
//! # Feature flags
//!
//! - `anthropic` (default): [`AnthropicChatModel`] over the Anthropic Messages API
//! - `fastembed`: [`FastEmbedProvider`], a local sentence-transformer embedder

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod extract;
pub mod hashing;
pub mod inmemory;
pub mod llm;
pub mod local;
pub mod memory;
pub mod mock;
pub mod pipeline;
pub mod session;
pub mod synthesizer;
pub mod vectorstore;

#[cfg(feature = "anthropic")]
pub mod anthropic;
#[cfg(feature = "fastembed")]
pub mod local_model;

pub use chunking::{Chunker, DEFAULT_SEPARATORS, FixedSizeChunker, RecursiveChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Chunk, Document, SearchResult};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use extract::{DocumentLoader, Extraction, ExtractionSummary, FileKind, OcrEngine, OcrRuntime};
pub use hashing::HashEmbeddingProvider;
pub use inmemory::InMemoryVectorStore;
pub use llm::{ChatModel, ChatRequest};
pub use local::{IndexManifest, LocalVectorStore};
pub use memory::{ConversationMemory, ConversationTurn, Role};
pub use mock::MockChatModel;
pub use pipeline::{
    DEFAULT_COLLECTION, IndexReport, IndexWriteMode, RagPipeline, RagPipelineBuilder,
};
pub use session::{Answer, ChatSession};
pub use synthesizer::{AnswerSynthesizer, NOT_FOUND_REPLY, SynthesizerConfig};
pub use vectorstore::{CollectionSpec, VectorStore};

#[cfg(feature = "anthropic")]
pub use anthropic::{AnthropicChatModel, AnthropicConfig};
#[cfg(feature = "fastembed")]
pub use local_model::FastEmbedProvider;
