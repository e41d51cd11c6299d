//! Chat sessions over the indexed documents.

use std::sync::Arc;

use tracing::info;

use crate::document::SearchResult;
use crate::error::{RagError, Result};
use crate::memory::ConversationMemory;
use crate::pipeline::{DEFAULT_COLLECTION, RagPipeline};
use crate::synthesizer::AnswerSynthesizer;

/// The reply to one question.
#[derive(Debug, Clone)]
pub struct Answer {
    /// The model's answer text.
    pub text: String,
    /// The question used for retrieval (condensed when there was history).
    pub retrieval_query: String,
    /// Retrieved excerpts the answer was grounded on, best first.
    pub sources: Vec<SearchResult>,
}

impl Answer {
    /// Distinct citations of the sources, in retrieval order.
    pub fn citations(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for source in &self.sources {
            let citation = source.chunk.citation();
            if !seen.contains(&citation) {
                seen.push(citation);
            }
        }
        seen
    }
}

/// One user's conversation with the indexed documents.
///
/// History lives only as long as the session.
#[derive(Debug)]
pub struct ChatSession {
    pipeline: Arc<RagPipeline>,
    synthesizer: AnswerSynthesizer,
    collection: String,
    memory: ConversationMemory,
}

impl ChatSession {
    pub fn new(pipeline: Arc<RagPipeline>, synthesizer: AnswerSynthesizer) -> Self {
        Self {
            pipeline,
            synthesizer,
            collection: DEFAULT_COLLECTION.to_string(),
            memory: ConversationMemory::new(),
        }
    }

    /// Query `collection` instead of the default one.
    pub fn with_collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn memory(&self) -> &ConversationMemory {
        &self.memory
    }

    pub fn clear_history(&mut self) {
        self.memory.clear();
    }

    /// Answer `question` from the indexed documents.
    ///
    /// The question and answer are appended to the memory only when the
    /// whole turn succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] for a blank question, and otherwise
    /// propagates retrieval and model errors unchanged.
    pub async fn ask(&mut self, question: &str) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::ConfigError("question must not be empty".into()));
        }

        let retrieval_query = self.synthesizer.condense(question, &self.memory).await?;
        let sources = self.pipeline.query(&self.collection, &retrieval_query).await?;
        let text = self.synthesizer.answer(question, &sources, &self.memory).await?;

        self.memory.record_exchange(question, text.clone());
        info!(
            sources = sources.len(),
            history = self.memory.len(),
            "answered question"
        );
        Ok(Answer { text, retrieval_query, sources })
    }
}
