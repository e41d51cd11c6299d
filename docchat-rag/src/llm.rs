//! Chat model trait used for answer synthesis.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::memory::ConversationTurn;

/// A single chat completion request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Instructions sent as the system prompt.
    pub system: Option<String>,
    /// Conversation, oldest first, ending with the user turn to answer.
    pub messages: Vec<ConversationTurn>,
}

impl ChatRequest {
    /// A request with one user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self { system: None, messages: vec![ConversationTurn::user(content)] }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }
}

/// A hosted or local large language model that completes a conversation.
#[async_trait]
pub trait ChatModel: Send + Sync {
    /// Provider and model name, for logs.
    fn name(&self) -> &str;

    /// Return the assistant's reply text.
    async fn complete(&self, request: &ChatRequest) -> Result<String>;
}
