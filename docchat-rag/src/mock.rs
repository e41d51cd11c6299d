//! Scriptable [`ChatModel`] for tests and offline runs.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{RagError, Result};
use crate::llm::{ChatModel, ChatRequest};

/// A [`ChatModel`] that replays scripted replies.
///
/// Once the script is exhausted it echoes the last user message back,
/// which contains the retrieved excerpts when driven by the synthesizer.
/// Every request is recorded for inspection.
#[derive(Debug, Default)]
pub struct MockChatModel {
    script: Mutex<VecDeque<String>>,
    failure: Option<String>,
    delay: Option<Duration>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl MockChatModel {
    /// A model that echoes the last user message.
    pub fn new() -> Self {
        Self::default()
    }

    /// A model that answers with `replies` in order, then echoes.
    pub fn with_replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { script: Mutex::new(replies.into_iter().map(Into::into).collect()), ..Self::default() }
    }

    /// A model whose every call fails with an [`RagError::LlmError`].
    pub fn failing(message: impl Into<String>) -> Self {
        Self { failure: Some(message.into()), ..Self::default() }
    }

    /// Sleep for `delay` (on the tokio clock) before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatModel for MockChatModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(message) = &self.failure {
            return Err(RagError::LlmError { provider: "mock".into(), message: message.clone() });
        }

        let scripted = self.script.lock().ok().and_then(|mut script| script.pop_front());
        Ok(scripted.unwrap_or_else(|| {
            request.messages.last().map(|m| m.content.clone()).unwrap_or_default()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn replays_script_then_echoes() {
        let model = MockChatModel::with_replies(["first"]);
        assert_eq!(model.complete(&ChatRequest::user("a")).await.unwrap(), "first");
        assert_eq!(model.complete(&ChatRequest::user("b")).await.unwrap(), "b");
        assert_eq!(model.requests().len(), 2);
    }
}
