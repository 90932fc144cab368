//! CLOVA Studio chat-completions client with automatic retry for transient errors.
//!
//! Both model variants stream their answer as server-sent events; the body is
//! fed chunk by chunk into an [`SseAssembler`]. The whole call, retries and
//! stream included, is bounded by the configured timeout.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::Serialize;
use std::time::{Duration, Instant};

use super::error::{classify_http_status, LlmError, LlmErrorKind, RetryConfig};
use super::{ChatRequest, LlmGateway, ModelVariant, Role, SseAssembler, ThinkingEffort};
use crate::config::{Config, ConfigError};

/// Gateway to the CLOVA Studio v3 chat-completions API.
#[derive(Clone)]
pub struct ClovaGateway {
    client: Client,
    api_key: String,
    base_url: String,
    fast_model: String,
    reasoning_model: String,
    timeout: Duration,
    retry_config: RetryConfig,
}

impl ClovaGateway {
    /// Create a gateway with default models, a 60 second timeout and default retries.
    pub fn new(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        let timeout = Duration::from_secs(60);
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url,
            fast_model: "HCX-005".to_string(),
            reasoning_model: "HCX-007".to_string(),
            timeout,
            retry_config: RetryConfig {
                max_retry_duration: timeout,
                ..RetryConfig::default()
            },
        }
    }

    /// Build a gateway from loaded configuration.
    ///
    /// # Errors
    /// Returns `ConfigError::MissingEnvVar` if no API key is configured.
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ConfigError::MissingEnvVar("HYPERCLOVA_API_KEY".to_string()))?;

        Ok(Self::new(api_key, config.base_url.clone())
            .with_models(config.fast_model.clone(), config.reasoning_model.clone())
            .with_timeout(config.timeout))
    }

    /// Override the model names used for each variant.
    pub fn with_models(mut self, fast: impl Into<String>, reasoning: impl Into<String>) -> Self {
        self.fast_model = fast.into();
        self.reasoning_model = reasoning.into();
        self
    }

    /// Set the per-call deadline. Retries never run past it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self.retry_config.max_retry_duration = timeout;
        self
    }

    /// Replace the retry policy (its duration is still capped by the timeout).
    pub fn with_retry_config(mut self, retry_config: RetryConfig) -> Self {
        let cap = self.timeout;
        self.retry_config = RetryConfig {
            max_retry_duration: retry_config.max_retry_duration.min(cap),
            ..retry_config
        };
        self
    }

    fn model_for(&self, variant: ModelVariant) -> &str {
        match variant {
            ModelVariant::Fast => &self.fast_model,
            ModelVariant::Reasoning => &self.reasoning_model,
        }
    }

    fn endpoint(&self, variant: ModelVariant) -> String {
        format!(
            "{}/v3/chat-completions/{}",
            self.base_url,
            self.model_for(variant)
        )
    }

    /// Parse Retry-After header if present.
    fn parse_retry_after(headers: &reqwest::header::HeaderMap) -> Option<Duration> {
        headers
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
    }

    /// Create an LlmError from HTTP response status and body.
    fn create_error(
        status: reqwest::StatusCode,
        body: &str,
        retry_after: Option<Duration>,
    ) -> LlmError {
        let status_code = status.as_u16();
        match classify_http_status(status_code) {
            LlmErrorKind::RateLimited => LlmError::rate_limited(body.to_string(), retry_after),
            LlmErrorKind::ClientError => LlmError::client_error(status_code, body.to_string()),
            _ => LlmError::server_error(status_code, body.to_string()),
        }
    }

    /// Execute a single request without retry.
    async fn execute_request(
        &self,
        variant: ModelVariant,
        request: &ClovaRequest,
    ) -> Result<String, LlmError> {
        let response = self
            .client
            .post(self.endpoint(variant))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header(
                "X-NCP-CLOVASTUDIO-REQUEST-ID",
                uuid::Uuid::new_v4().to_string(),
            )
            .header("Accept", "text/event-stream")
            .json(request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    LlmError::network_error(format!("Connection failed: {}", e))
                } else {
                    LlmError::network_error(format!("Request failed: {}", e))
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = Self::parse_retry_after(response.headers());
            let body = response.text().await.unwrap_or_default();
            return Err(Self::create_error(status, &body, retry_after));
        }

        let mut assembler = SseAssembler::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk =
                chunk.map_err(|e| LlmError::network_error(format!("Stream interrupted: {}", e)))?;
            assembler.push(&chunk);
            if assembler.is_finished() {
                break;
            }
        }

        assembler.finish()
    }

    /// Execute a request with automatic retry for transient errors.
    async fn execute_with_retry(
        &self,
        variant: ModelVariant,
        request: &ClovaRequest,
    ) -> Result<String, LlmError> {
        let start = Instant::now();
        let mut attempt = 0;

        loop {
            let error = match self.execute_request(variant, request).await {
                Ok(content) => {
                    if attempt > 0 {
                        tracing::info!(
                            %variant,
                            retries = attempt,
                            elapsed = ?start.elapsed(),
                            "Model call succeeded after retries"
                        );
                    }
                    return Ok(content);
                }
                Err(error) => error,
            };

            let remaining = self
                .retry_config
                .max_retry_duration
                .saturating_sub(start.elapsed());
            let should_retry = self.retry_config.should_retry(&error)
                && attempt < self.retry_config.max_retries
                && !remaining.is_zero();

            if !should_retry {
                if attempt > 0 {
                    tracing::error!(%variant, retries = attempt, "Model call failed after retries: {}", error);
                } else {
                    tracing::error!(%variant, "Model call failed: {}", error);
                }
                return Err(error);
            }

            let delay = error.suggested_delay(attempt).min(remaining);
            tracing::warn!(
                %variant,
                attempt = attempt + 1,
                delay = ?delay,
                "Retrying after {}: {}",
                error.kind,
                error.message
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[async_trait]
impl LlmGateway for ClovaGateway {
    async fn chat(&self, variant: ModelVariant, request: ChatRequest) -> Result<String, LlmError> {
        let payload = ClovaRequest::build(variant, request);
        tracing::debug!(
            %variant,
            model = self.model_for(variant),
            messages = payload.messages.len(),
            "Sending chat completion"
        );

        match tokio::time::timeout(self.timeout, self.execute_with_retry(variant, &payload)).await
        {
            Ok(result) => result,
            Err(_) => {
                tracing::error!(%variant, timeout = ?self.timeout, "Model call timed out");
                Err(LlmError::timeout(self.timeout))
            }
        }
    }
}

/// CLOVA Studio v3 request body.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClovaRequest {
    messages: Vec<ClovaMessage>,
    include_ai_filters: bool,
    temperature: f64,
    top_p: f64,
    top_k: u32,
    repetition_penalty: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_completion_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking: Option<Thinking>,
    #[serde(rename = "response_format", skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stop: Vec<String>,
}

impl ClovaRequest {
    /// Map a variant-neutral request onto the parameters each model accepts.
    fn build(variant: ModelVariant, request: ChatRequest) -> Self {
        let ChatRequest {
            messages,
            max_tokens,
            stop_sequences,
            thinking_effort,
            response_schema,
        } = request;

        let messages = messages
            .into_iter()
            .map(|m| ClovaMessage {
                role: m.role,
                content: vec![ContentPart::Text { text: m.content }],
            })
            .collect();

        let mut body = Self {
            messages,
            include_ai_filters: true,
            temperature: 0.5,
            top_p: 0.8,
            top_k: 0,
            repetition_penalty: 1.1,
            max_tokens: None,
            max_completion_tokens: None,
            thinking: None,
            response_format: None,
            stop: stop_sequences,
        };

        match variant {
            ModelVariant::Fast => {
                body.max_tokens = Some(max_tokens);
                if thinking_effort.is_some() {
                    tracing::warn!("Fast model does not think; dropping thinking effort");
                }
                body.response_format = response_schema.map(|schema| {
                    serde_json::json!({
                        "type": "json_schema",
                        "schema": schema,
                    })
                });
            }
            ModelVariant::Reasoning => {
                body.max_completion_tokens = Some(max_tokens);
                if response_schema.is_some() {
                    tracing::warn!("Reasoning model cannot be schema-constrained; dropping schema");
                }
                body.thinking = thinking_effort.map(|effort| Thinking { effort });
            }
        }

        body
    }
}

#[derive(Debug, Serialize)]
struct ClovaMessage {
    role: Role,
    content: Vec<ContentPart>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
}

#[derive(Debug, Serialize)]
struct Thinking {
    effort: ThinkingEffort,
}
