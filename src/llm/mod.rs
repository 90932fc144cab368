//! LLM gateway module for talking to the chat-completion backend.
//!
//! This module provides a trait-based abstraction over the two model variants
//! the pipeline uses, with CLOVA Studio as the production implementation:
//! - **Fast**: accepts a JSON Schema constraint (`response_schema`), used for repairs
//! - **Reasoning**: accepts a thinking effort, cannot be schema-constrained
//!
//! Streaming responses are reassembled into a single content string by
//! [`SseAssembler`] before they reach the caller.

mod clova;
mod error;
mod sse;

pub use clova::ClovaGateway;
pub use error::{classify_http_status, LlmError, LlmErrorKind, RetryConfig};
pub use sse::SseAssembler;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Role in a chat conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in a chat conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    /// Create a simple text message.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        ChatMessage {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }
}

/// Which model a call goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelVariant {
    /// Low-latency model that honours `response_schema`.
    Fast,
    /// Deliberate model that honours `thinking_effort` but never a schema.
    Reasoning,
}

impl std::fmt::Display for ModelVariant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelVariant::Fast => write!(f, "fast"),
            ModelVariant::Reasoning => write!(f, "reasoning"),
        }
    }
}

/// How much deliberation the reasoning variant should spend.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingEffort {
    None,
    Low,
    Medium,
    High,
}

impl std::str::FromStr for ThinkingEffort {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(ThinkingEffort::None),
            "low" => Ok(ThinkingEffort::Low),
            "medium" => Ok(ThinkingEffort::Medium),
            "high" => Ok(ThinkingEffort::High),
            other => Err(format!(
                "expected one of none, low, medium, high; got '{}'",
                other
            )),
        }
    }
}

/// Parameters for one chat-completion call.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub messages: Vec<ChatMessage>,
    /// Maximum output tokens to generate.
    pub max_tokens: u32,
    /// Sequences that end generation early. Empty means none.
    pub stop_sequences: Vec<String>,
    /// Only meaningful for [`ModelVariant::Reasoning`].
    pub thinking_effort: Option<ThinkingEffort>,
    /// JSON Schema the output must satisfy. Only meaningful for [`ModelVariant::Fast`].
    pub response_schema: Option<serde_json::Value>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>, max_tokens: u32) -> Self {
        Self {
            messages,
            max_tokens,
            stop_sequences: Vec::new(),
            thinking_effort: None,
            response_schema: None,
        }
    }

    pub fn with_stop_sequences(mut self, stop_sequences: Vec<String>) -> Self {
        self.stop_sequences = stop_sequences;
        self
    }

    pub fn with_thinking_effort(mut self, effort: ThinkingEffort) -> Self {
        self.thinking_effort = Some(effort);
        self
    }

    pub fn with_response_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

/// Raw text produced by a model, tagged with the variant that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawModelOutput {
    pub content: String,
    pub variant: ModelVariant,
}

/// Trait for chat-completion gateways.
///
/// # Invariants
/// - Returns `Ok` only with the fully reassembled text of one response
/// - Any non-success status, connection failure or timeout is an `Err`
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Send a chat completion request to the given model variant.
    async fn chat(&self, variant: ModelVariant, request: ChatRequest) -> Result<String, LlmError>;

    /// Like [`LlmGateway::chat`], keeping track of which variant answered.
    async fn chat_raw(
        &self,
        variant: ModelVariant,
        request: ChatRequest,
    ) -> Result<RawModelOutput, LlmError> {
        let content = self.chat(variant, request).await?;
        Ok(RawModelOutput { content, variant })
    }
}


#[cfg(test)]
mod tests {
    use super::testing::ScriptedGateway;
    use super::*;

    #[test]
    fn thinking_effort_parses_case_insensitively() {
        assert_eq!("LOW".parse::<ThinkingEffort>(), Ok(ThinkingEffort::Low));
        assert_eq!(" high ".parse::<ThinkingEffort>(), Ok(ThinkingEffort::High));
        assert!("extreme".parse::<ThinkingEffort>().is_err());
    }

    #[test]
    fn chat_request_builders_fill_optional_fields() {
        let request = ChatRequest::new(vec![ChatMessage::user("hi")], 128)
            .with_stop_sequences(vec!["END".to_string()])
            .with_thinking_effort(ThinkingEffort::Medium)
            .with_response_schema(serde_json::json!({"type": "object"}));

        assert_eq!(request.max_tokens, 128);
        assert_eq!(request.stop_sequences, vec!["END".to_string()]);
        assert_eq!(request.thinking_effort, Some(ThinkingEffort::Medium));
        assert!(request.response_schema.is_some());
    }

    #[tokio::test]
    async fn chat_raw_tags_the_variant() {
        let gateway = ScriptedGateway::replying(&["hello"]);
        let raw = gateway
            .chat_raw(
                ModelVariant::Reasoning,
                ChatRequest::new(vec![ChatMessage::user("hi")], 16),
            )
            .await
            .unwrap();

        assert_eq!(raw.content, "hello");
        assert_eq!(raw.variant, ModelVariant::Reasoning);
        assert_eq!(gateway.call_count(ModelVariant::Reasoning), 1);
    }

    #[test]
    fn scripted_gateway_fails_once_exhausted() {
        let gateway = ScriptedGateway::replying(&["only"]);
        let request = ChatRequest::new(vec![ChatMessage::user("hi")], 16);

        let first = tokio_test::block_on(gateway.chat(ModelVariant::Fast, request.clone()));
        assert_eq!(first.unwrap(), "only");

        let second = tokio_test::block_on(gateway.chat(ModelVariant::Fast, request)).unwrap_err();
        assert_eq!(second.kind, LlmErrorKind::NetworkError);
        assert_eq!(gateway.call_count(ModelVariant::Fast), 2);
    }
}
