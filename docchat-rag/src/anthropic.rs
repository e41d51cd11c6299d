//! Anthropic Messages API chat model.
//!
//! This module is only available when the `anthropic` feature is enabled.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::error::{RagError, Result};
use crate::llm::{ChatModel, ChatRequest};

const PROVIDER: &str = "Anthropic";

/// Default API base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Default model.
pub const DEFAULT_MODEL: &str = "claude-3-7-sonnet-20250219";

const API_VERSION: &str = "2023-06-01";

/// Connection and sampling settings for [`AnthropicChatModel`].
#[derive(Clone)]
pub struct AnthropicConfig {
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub base_url: String,
    /// Per-request HTTP timeout.
    pub timeout: Duration,
}

impl std::fmt::Debug for AnthropicConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnthropicConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("base_url", &self.base_url)
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl AnthropicConfig {
    /// Settings with the given key and default everything else.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: 1024,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(60),
        }
    }

    /// Read `ANTHROPIC_API_KEY` and, if set, `ANTHROPIC_MODEL`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] when the key is unset or empty.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("ANTHROPIC_API_KEY").unwrap_or_default();
        let mut config = Self::new(api_key);
        if let Ok(model) = std::env::var("ANTHROPIC_MODEL") {
            if !model.trim().is_empty() {
                config.model = model;
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(RagError::ConfigError(
                "ANTHROPIC_API_KEY is not set; add it to the environment or a .env file".into(),
            ));
        }
        if self.max_tokens == 0 {
            return Err(RagError::ConfigError("max_tokens must be greater than zero".into()));
        }
        Ok(())
    }
}

/// A [`ChatModel`] backed by the Anthropic Messages API.
///
/// # Example
///
/// ```rust,ignore
/// use docchat_rag::anthropic::{AnthropicChatModel, AnthropicConfig};
///
/// let model = AnthropicChatModel::new(AnthropicConfig::from_env()?)?;
/// let reply = model.complete(&ChatRequest::user("Hello")).await?;
/// ```
#[derive(Debug)]
pub struct AnthropicChatModel {
    client: reqwest::Client,
    config: AnthropicConfig,
    name: String,
}

impl AnthropicChatModel {
    /// Create a model client. Fails before any network call if the key is missing.
    pub fn new(config: AnthropicConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder().timeout(config.timeout).build().map_err(|e| {
            RagError::LlmError { provider: PROVIDER.into(), message: format!("client setup: {e}") }
        })?;
        let name = format!("anthropic/{}", config.model);
        Ok(Self { client, config, name })
    }

    pub fn config(&self) -> &AnthropicConfig {
        &self.config
    }

    /// Map a reqwest failure, keeping timeouts distinct.
    fn transport_error(&self, context: &str, e: reqwest::Error) -> RagError {
        if e.is_timeout() {
            RagError::Timeout { operation: "Anthropic request".into(), after: self.config.timeout }
        } else {
            llm_error(format!("{context}: {e}"))
        }
    }
}

// ── Messages API request/response types ────────────────────────────

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    messages: Vec<Message<'a>>,
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}

fn llm_error(message: String) -> RagError {
    RagError::LlmError { provider: PROVIDER.into(), message }
}

// ── ChatModel implementation ───────────────────────────────────────

#[async_trait]
impl ChatModel for AnthropicChatModel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            system: request.system.as_deref(),
            messages: request
                .messages
                .iter()
                .map(|m| Message { role: m.role.as_str(), content: &m.content })
                .collect(),
        };

        debug!(
            provider = PROVIDER,
            model = %self.config.model,
            messages = body.messages.len(),
            "sending messages request"
        );

        let url = format!("{}/v1/messages", self.config.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(url)
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", API_VERSION)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!(provider = PROVIDER, error = %e, "request failed");
                self.transport_error("request failed", e)
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);

            error!(provider = PROVIDER, %status, "API error");
            return Err(llm_error(format!("API returned {status}: {detail}")));
        }

        let parsed: MessagesResponse = response.json().await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "failed to read response");
            self.transport_error("failed to read response", e)
        })?;

        let text: String = parsed
            .content
            .into_iter()
            .filter(|block| block.kind == "text")
            .map(|block| block.text)
            .collect();
        if text.is_empty() {
            return Err(llm_error("response contained no text".into()));
        }
        Ok(text)
    }
}
