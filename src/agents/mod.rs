//! Agents module - the task extraction pipeline.
//!
//! # Components
//! - **Extractor**: Runs one extraction, falling back on any failure
//! - **PromptBuilder**: Builds the extraction and JSON-repair prompts
//! - **JsonValidatorAgent**: Cleans model output and repairs it through the fast model
//! - **normalize_tasks**: Coerces a validated document into canonical tasks
//! - **fallback::generate**: Keyword rules used when the model path fails
//!
//! # Design Principles
//! - `extract()` never fails; every path yields at least one task
//! - The gateway is injected, so the pipeline runs against scripted responses in tests
//! - Local cleanup is pure and tried before any repair call

mod cleanup;
mod error;
mod extractor;
pub mod fallback;
mod normalizer;
mod prompt;
mod validator;

pub use cleanup::{clean_json_text, remove_trailing_commas, strip_code_fence};
pub use error::ExtractionError;
pub use extractor::{Extraction, ExtractionStage, Extractor, ExtractorSettings, TaskSource};
pub use fallback::{FallbackRule, FALLBACK_RULES};
pub use normalizer::{
    normalize_due_date, normalize_reference, normalize_task, normalize_tasks, parse_minutes,
};
pub use prompt::{Prompt, PromptBuilder, RelativeDeadlines, EXPECTED_SHAPE};
pub use validator::{
    task_document_schema, JsonValidatorAgent, ValidationOutcome, DEFAULT_MAX_ATTEMPTS,
};
