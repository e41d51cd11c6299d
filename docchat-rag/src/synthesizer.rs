//! Prompt construction and answer generation over retrieved excerpts.

use std::fmt::Write as _;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::document::SearchResult;
use crate::error::{RagError, Result};
use crate::llm::{ChatModel, ChatRequest};
use crate::memory::{ConversationMemory, ConversationTurn};

/// What the model is told to say when the excerpts lack the answer.
pub const NOT_FOUND_REPLY: &str = "I don't find information about that in the documents";

/// System prompt for answer synthesis.
pub const SYSTEM_PROMPT: &str = "You are a helpful assistant that answers questions about the user's documents.

For each question:
1. Answer using only the information in the provided document excerpts. Do not use outside knowledge.
2. If the excerpts contain the answer, give it clearly and concisely.
3. If the excerpts do not contain the answer, say \"I don't find information about that in the documents\". Never make up an answer.
4. Use bullet points for answers with several parts.
5. Quote the excerpts when it helps.

Use the earlier conversation to understand follow-up questions. Keep your responses friendly and helpful.";

const CONDENSE_PROMPT: &str = "Given the conversation so far and a follow-up question, rephrase the follow-up question as a standalone question that can be understood without the conversation. Reply with the standalone question only.";

/// Settings for [`AnswerSynthesizer`].
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesizerConfig {
    /// Upper bound on one model call, on top of any transport timeout.
    pub answer_timeout: Duration,
    /// Rewrite follow-up questions into standalone ones before retrieval.
    pub condense_questions: bool,
}

impl Default for SynthesizerConfig {
    fn default() -> Self {
        Self { answer_timeout: Duration::from_secs(120), condense_questions: true }
    }
}

/// Turns a question, its retrieved excerpts and the conversation so far
/// into a grounded answer from a [`ChatModel`].
pub struct AnswerSynthesizer {
    model: Arc<dyn ChatModel>,
    config: SynthesizerConfig,
}

impl std::fmt::Debug for AnswerSynthesizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnswerSynthesizer")
            .field("model", &self.model.name())
            .field("config", &self.config)
            .finish()
    }
}

impl AnswerSynthesizer {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model, config: SynthesizerConfig::default() }
    }

    pub fn with_config(mut self, config: SynthesizerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &SynthesizerConfig {
        &self.config
    }

    /// Build the chat request: system instructions, the prior turns, then a
    /// user message holding the numbered excerpts and the question.
    pub fn build_request(
        &self,
        question: &str,
        context: &[SearchResult],
        memory: &ConversationMemory,
    ) -> ChatRequest {
        let mut prompt = String::from("Document excerpts:\n");
        if context.is_empty() {
            prompt.push_str("\n(no excerpts were retrieved)\n");
        }
        for (i, result) in context.iter().enumerate() {
            let _ = write!(prompt, "\n[{}] ({})\n{}\n", i + 1, result.chunk.citation(), result.chunk.text.trim());
        }
        let _ = write!(prompt, "\nQuestion: {}", question.trim());

        let mut messages: Vec<ConversationTurn> = memory.turns().to_vec();
        messages.push(ConversationTurn::user(prompt));
        ChatRequest { system: Some(SYSTEM_PROMPT.to_string()), messages }
    }

    /// Ask the model to answer `question` from `context`.
    ///
    /// # Errors
    ///
    /// Propagates model errors unchanged and returns [`RagError::Timeout`]
    /// when the call exceeds `answer_timeout`. Nothing is retried.
    pub async fn answer(
        &self,
        question: &str,
        context: &[SearchResult],
        memory: &ConversationMemory,
    ) -> Result<String> {
        let request = self.build_request(question, context, memory);
        debug!(
            model = self.model.name(),
            excerpts = context.len(),
            history = memory.len(),
            "synthesizing answer"
        );
        let answer = self.bounded("answer synthesis", self.model.complete(&request)).await?;
        info!(model = self.model.name(), answer_len = answer.len(), "answer received");
        Ok(answer.trim().to_string())
    }

    /// Rewrite a follow-up question into a standalone one.
    ///
    /// Returns `question` unchanged when the memory is empty, condensing is
    /// disabled, or the model replies with nothing.
    pub async fn condense(&self, question: &str, memory: &ConversationMemory) -> Result<String> {
        if memory.is_empty() || !self.config.condense_questions {
            return Ok(question.to_string());
        }

        let request = ChatRequest::user(format!(
            "Conversation so far:\n{}\n\nFollow-up question: {}\n\nStandalone question:",
            memory.transcript(),
            question.trim()
        ))
        .with_system(CONDENSE_PROMPT);

        let standalone = self.bounded("question condensing", self.model.complete(&request)).await?;
        let standalone = standalone.trim();
        if standalone.is_empty() {
            warn!("condensed question was empty, retrieving with the original");
            return Ok(question.to_string());
        }
        debug!(original = question, standalone, "condensed follow-up question");
        Ok(standalone.to_string())
    }

    async fn bounded<F>(&self, operation: &str, call: F) -> Result<String>
    where
        F: Future<Output = Result<String>>,
    {
        let after = self.config.answer_timeout;
        tokio::time::timeout(after, call).await.map_err(|_| {
            warn!(operation, timeout_secs = after.as_secs_f64(), "model call timed out");
            RagError::Timeout { operation: operation.to_string(), after }
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{Chunk, META_FILE_NAME};
    use crate::mock::MockChatModel;
    use std::collections::HashMap;

    fn excerpt(text: &str) -> SearchResult {
        let mut metadata = HashMap::new();
        metadata.insert(META_FILE_NAME.to_string(), "facts.txt".to_string());
        SearchResult {
            chunk: Chunk {
                id: "facts.txt_0".into(),
                text: text.into(),
                embedding: Vec::new(),
                metadata,
                document_id: "facts.txt".into(),
            },
            score: 0.9,
        }
    }

    #[test]
    fn request_carries_instructions_history_and_excerpts() {
        let synth = AnswerSynthesizer::new(Arc::new(MockChatModel::new()));
        let mut memory = ConversationMemory::new();
        memory.record_exchange("Hi", "Hello!");

        let request = synth.build_request(
            "What is the capital of France?",
            &[excerpt("The capital of France is Paris.")],
            &memory,
        );

        let system = request.system.as_deref().unwrap();
        assert!(system.contains("only the information in the provided document excerpts"));
        assert!(system.contains(NOT_FOUND_REPLY));
        assert!(system.contains("bullet points"));

        assert_eq!(request.messages.len(), 3);
        assert_eq!(request.messages[0], ConversationTurn::user("Hi"));
        let last = &request.messages[2].content;
        assert!(last.contains("[1] (facts.txt)\nThe capital of France is Paris."));
        assert!(last.ends_with("Question: What is the capital of France?"));
    }

    #[tokio::test]
    async fn condense_skips_the_model_without_history() {
        let model = Arc::new(MockChatModel::with_replies(["unused"]));
        let synth = AnswerSynthesizer::new(model.clone());
        let q = synth.condense("And Germany?", &ConversationMemory::new()).await.unwrap();
        assert_eq!(q, "And Germany?");
        assert!(model.requests().is_empty());
    }

    #[tokio::test]
    async fn condense_uses_the_model_reply() {
        let model = Arc::new(MockChatModel::with_replies(["What is the capital of Germany?"]));
        let synth = AnswerSynthesizer::new(model.clone());
        let mut memory = ConversationMemory::new();
        memory.record_exchange("What is the capital of France?", "Paris.");

        let q = synth.condense("And Germany?", &memory).await.unwrap();
        assert_eq!(q, "What is the capital of Germany?");
        assert!(model.requests()[0].messages[0].content.contains("Human: What is the capital of France?"));
    }
}
