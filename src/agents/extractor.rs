//! The extraction pipeline.
//!
//! ```text
//! INIT -> PROMPTING -> AWAITING_MODEL -> VALIDATING -> NORMALIZING -> DONE
//!   \________________________\_______________\______________\-> FALLBACK
//! ```
//!
//! Every failure on the model path is absorbed and answered with the
//! rule-based fallback, so [`Extractor::extract`] always yields tasks.

use std::fmt;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use tracing::{debug, info, warn};

use super::error::ExtractionError;
use super::fallback;
use super::normalizer::normalize_tasks;
use super::prompt::{PromptBuilder, EXPECTED_SHAPE};
use super::validator::{JsonValidatorAgent, DEFAULT_MAX_ATTEMPTS};
use crate::config::Config;
use crate::llm::{ChatRequest, ClovaGateway, LlmGateway, ModelVariant, ThinkingEffort};
use crate::task::{CandidateTask, UserProfile};

/// Pipeline state, reported when an extraction falls back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractionStage {
    Init,
    Prompting,
    AwaitingModel,
    Validating,
    Normalizing,
    Done,
    Fallback,
}

impl fmt::Display for ExtractionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ExtractionStage::Init => "init",
            ExtractionStage::Prompting => "prompting",
            ExtractionStage::AwaitingModel => "awaiting_model",
            ExtractionStage::Validating => "validating",
            ExtractionStage::Normalizing => "normalizing",
            ExtractionStage::Done => "done",
            ExtractionStage::Fallback => "fallback",
        };
        f.write_str(name)
    }
}

/// Where the tasks of an [`Extraction`] came from.
#[derive(Debug, Clone)]
pub enum TaskSource {
    Model { repair_calls: u32 },
    /// The model path gave up at `stage` because of `reason`.
    Fallback {
        stage: ExtractionStage,
        reason: ExtractionError,
    },
}

/// Tasks from one run plus how they were produced.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub tasks: Vec<CandidateTask>,
    pub source: TaskSource,
}

impl Extraction {
    pub fn is_fallback(&self) -> bool {
        matches!(self.source, TaskSource::Fallback { .. })
    }
}

/// Model-call parameters for the extraction pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractorSettings {
    pub max_tokens: u32,
    pub thinking_effort: ThinkingEffort,
    /// Parse attempts per validation run.
    pub max_attempts: u32,
}

impl Default for ExtractorSettings {
    fn default() -> Self {
        Self {
            max_tokens: 4096,
            thinking_effort: ThinkingEffort::Low,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }
}

impl ExtractorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            max_tokens: config.max_tokens,
            thinking_effort: config.thinking_effort,
            max_attempts: config.max_repair_attempts,
        }
    }
}

/// Turns free-form text into candidate tasks.
///
/// Cheap to clone; concurrent runs share only the gateway handle.
#[derive(Clone)]
pub struct Extractor {
    gateway: Option<Arc<dyn LlmGateway>>,
    settings: ExtractorSettings,
}

impl Extractor {
    pub fn new(gateway: Arc<dyn LlmGateway>, settings: ExtractorSettings) -> Self {
        Self {
            gateway: Some(gateway),
            settings,
        }
    }

    /// An extractor without credentials. Every run uses the fallback.
    pub fn offline() -> Self {
        Self {
            gateway: None,
            settings: ExtractorSettings::default(),
        }
    }

    /// Build from configuration, going offline when no API key is set.
    pub fn from_config(config: &Config) -> Self {
        let settings = ExtractorSettings::from_config(config);
        if !config.is_online() {
            info!("No API key configured, extraction will use rule-based fallback only");
            return Self {
                gateway: None,
                settings,
            };
        }

        match ClovaGateway::from_config(config) {
            Ok(gateway) => Self::new(Arc::new(gateway), settings),
            Err(e) => {
                warn!(error = %e, "Could not build model gateway, running offline");
                Self {
                    gateway: None,
                    settings,
                }
            }
        }
    }

    pub fn is_online(&self) -> bool {
        self.gateway.is_some()
    }

    /// Extract tasks using today's local date. Always returns at least one task.
    pub async fn extract(&self, text: &str, profile: Option<&UserProfile>) -> Vec<CandidateTask> {
        self.extract_on(text, profile, Local::now().date_naive())
            .await
            .tasks
    }

    /// Extract tasks relative to `today`, reporting how they were produced.
    pub async fn extract_on(
        &self,
        text: &str,
        profile: Option<&UserProfile>,
        today: NaiveDate,
    ) -> Extraction {
        let mut stage = ExtractionStage::Init;

        match self.run_model_path(text, profile, today, &mut stage).await {
            Ok((tasks, repair_calls)) => {
                info!(tasks = tasks.len(), repair_calls, "Extracted tasks from model output");
                Extraction {
                    tasks,
                    source: TaskSource::Model { repair_calls },
                }
            }
            Err(reason) => {
                warn!(stage = %stage, reason = %reason, "Falling back to rule-based extraction");
                let failed_at = stage;
                advance(&mut stage, ExtractionStage::Fallback);
                Extraction {
                    tasks: fallback::generate(text),
                    source: TaskSource::Fallback {
                        stage: failed_at,
                        reason,
                    },
                }
            }
        }
    }

    async fn run_model_path(
        &self,
        text: &str,
        profile: Option<&UserProfile>,
        today: NaiveDate,
        stage: &mut ExtractionStage,
    ) -> Result<(Vec<CandidateTask>, u32), ExtractionError> {
        if text.trim().is_empty() {
            return Err(ExtractionError::EmptyInput);
        }
        let gateway = self
            .gateway
            .as_ref()
            .ok_or(ExtractionError::Configuration)?;

        advance(stage, ExtractionStage::Prompting);
        let prompt = PromptBuilder::build(text, profile, today);
        let request = ChatRequest::new(prompt.into_messages(), self.settings.max_tokens)
            .with_thinking_effort(self.settings.thinking_effort);

        advance(stage, ExtractionStage::AwaitingModel);
        let raw = gateway.chat_raw(ModelVariant::Reasoning, request).await?;
        debug!(variant = %raw.variant, chars = raw.content.len(), "Received model output");

        advance(stage, ExtractionStage::Validating);
        let outcome = JsonValidatorAgent::new(gateway.clone())
            .with_max_attempts(self.settings.max_attempts)
            .with_max_tokens(self.settings.max_tokens)
            .ensure_valid_json(&raw.content, EXPECTED_SHAPE)
            .await;
        let repair_calls = outcome.repair_calls;
        let document = outcome.into_result()?;

        advance(stage, ExtractionStage::Normalizing);
        let tasks = normalize_tasks(&document);
        if tasks.is_empty() {
            return Err(ExtractionError::NoTasks);
        }

        advance(stage, ExtractionStage::Done);
        Ok((tasks, repair_calls))
    }
}

fn advance(stage: &mut ExtractionStage, next: ExtractionStage) {
    debug!(from = %stage, to = %next, "Extraction stage transition");
    *stage = next;
}
