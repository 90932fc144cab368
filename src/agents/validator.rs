//! JSON validation with model-assisted repair.
//!
//! Model output is first cleaned locally. When it still does not parse into a
//! task document, the fast model is asked to rewrite it under a JSON Schema
//! constraint, and the result is checked again.

use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::cleanup::clean_json_text;
use super::error::ExtractionError;
use super::prompt::PromptBuilder;
use crate::llm::{ChatRequest, LlmGateway, ModelVariant};

/// Default number of parse attempts per validation run.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Token budget for a repair call.
const REPAIR_MAX_TOKENS: u32 = 4096;

/// Result of one validation run. Never an error: failure is reported here.
#[derive(Debug, Clone)]
pub struct ValidationOutcome {
    pub success: bool,
    /// The parsed document when `success` is true.
    pub value: Option<Value>,
    /// Best-effort cleaned content from the last attempt.
    pub content: String,
    pub repair_calls: u32,
    pub last_error: Option<ExtractionError>,
}

impl ValidationOutcome {
    fn succeeded(value: Value, content: String, repair_calls: u32) -> Self {
        Self {
            success: true,
            value: Some(value),
            content,
            repair_calls,
            last_error: None,
        }
    }

    /// Convert into the parsed document or the last error seen.
    pub fn into_result(self) -> Result<Value, ExtractionError> {
        match self.value {
            Some(value) if self.success => Ok(value),
            _ => Err(self.last_error.unwrap_or_else(|| {
                ExtractionError::JsonMalformed("validation produced no value".to_string())
            })),
        }
    }
}

/// Turns raw model text into a parsed task document.
///
/// # Invariants
/// - performs at most `max_attempts` parse attempts
/// - makes at most `max_attempts - 1` repair calls, one between consecutive attempts
#[derive(Clone)]
pub struct JsonValidatorAgent {
    gateway: Arc<dyn LlmGateway>,
    max_attempts: u32,
    max_tokens: u32,
}

impl JsonValidatorAgent {
    pub fn new(gateway: Arc<dyn LlmGateway>) -> Self {
        Self {
            gateway,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            max_tokens: REPAIR_MAX_TOKENS,
        }
    }

    /// Set the number of parse attempts. Values below 1 are raised to 1.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Clean, parse and shape-check `content` without any model call.
    pub fn validate(content: &str) -> Result<Value, ExtractionError> {
        let cleaned = clean_json_text(content);
        let value: Value = serde_json::from_str(&cleaned)?;
        check_task_document(&value)?;
        Ok(value)
    }

    /// Run the validation loop, repairing through the fast model as needed.
    pub async fn ensure_valid_json(&self, content: &str, expected_shape: &str) -> ValidationOutcome {
        let mut current = content.to_string();
        let mut repair_calls = 0;

        for attempt in 1..self.max_attempts {
            let err = match Self::validate(&current) {
                Ok(value) => {
                    return self.finish(value, &current, repair_calls);
                }
                Err(err) => err,
            };
            if !err.is_repairable() {
                break;
            }
            debug!(attempt, error = %err, "Model output failed validation, requesting repair");

            repair_calls += 1;
            match self.request_repair(&current, &err, expected_shape).await {
                Ok(repaired) => current = repaired,
                Err(call_err) => {
                    warn!(attempt, error = %call_err, "Repair call failed, keeping previous content");
                }
            }
        }

        match Self::validate(&current) {
            Ok(value) => self.finish(value, &current, repair_calls),
            Err(err) => {
                warn!(
                    attempts = self.max_attempts,
                    repair_calls,
                    error = %err,
                    "JSON validation exhausted"
                );
                ValidationOutcome {
                    success: false,
                    value: None,
                    content: clean_json_text(&current),
                    repair_calls,
                    last_error: Some(err),
                }
            }
        }
    }

    fn finish(&self, value: Value, content: &str, repair_calls: u32) -> ValidationOutcome {
        if repair_calls > 0 {
            info!(repair_calls, "Model output repaired into valid JSON");
        }
        ValidationOutcome::succeeded(value, clean_json_text(content), repair_calls)
    }

    async fn request_repair(
        &self,
        content: &str,
        err: &ExtractionError,
        expected_shape: &str,
    ) -> Result<String, ExtractionError> {
        let prompt = PromptBuilder::repair(content, &err.to_string(), expected_shape);
        let request = ChatRequest::new(prompt.into_messages(), self.max_tokens)
            .with_response_schema(task_document_schema());

        let repaired = self.gateway.chat(ModelVariant::Fast, request).await?;
        Ok(repaired)
    }
}

/// The top level must be an object holding a `tasks` array. A non-empty array
/// must contain at least one task object.
fn check_task_document(value: &Value) -> Result<(), ExtractionError> {
    let Some(object) = value.as_object() else {
        return Err(ExtractionError::SchemaMismatch(format!(
            "expected an object with a `tasks` array, found {}",
            json_type_name(value)
        )));
    };
    match object.get("tasks") {
        Some(Value::Array(tasks)) if !tasks.is_empty() && !tasks.iter().any(Value::is_object) => Err(
            ExtractionError::SchemaMismatch("`tasks` holds no task objects".to_string()),
        ),
        Some(Value::Array(_)) => Ok(()),
        Some(other) => Err(ExtractionError::SchemaMismatch(format!(
            "`tasks` must be an array, found {}",
            json_type_name(other)
        ))),
        None => Err(ExtractionError::SchemaMismatch(
            "missing `tasks` array".to_string(),
        )),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// JSON Schema sent with every repair call.
pub fn task_document_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "tasks": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "title": {"type": "string"},
                        "description": {"type": "string"},
                        "priority": {"type": "string", "enum": ["LOW", "MID", "HIGH", "URGENT"]},
                        "dueDate": {"type": ["string", "null"]},
                        "isCompleted": {"type": "boolean"},
                        "references": {"type": ["string", "null"]},
                        "subTasks": {
                            "type": "array",
                            "items": {
                                "type": "object",
                                "properties": {
                                    "title": {"type": "string"},
                                    "estimatedMin": {"type": "integer"},
                                    "isChecked": {"type": "boolean"}
                                },
                                "required": ["title", "estimatedMin", "isChecked"]
                            }
                        }
                    },
                    "required": ["title", "priority", "isCompleted", "subTasks"]
                }
            }
        },
        "required": ["tasks"]
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::prompt::EXPECTED_SHAPE;
    use crate::llm::testing::ScriptedGateway;
    use crate::llm::LlmError;

    const VALID: &str = r#"{"tasks": [{"title": "Write report", "priority": "HIGH", "subTasks": []}]}"#;

    fn agent(gateway: &Arc<ScriptedGateway>) -> JsonValidatorAgent {
        JsonValidatorAgent::new(gateway.clone())
    }

    #[tokio::test]
    async fn clean_json_needs_no_repair() {
        let gateway = Arc::new(ScriptedGateway::default());
        let outcome = agent(&gateway).ensure_valid_json(VALID, EXPECTED_SHAPE).await;

        assert!(outcome.success);
        assert_eq!(outcome.repair_calls, 0);
        assert_eq!(outcome.value.unwrap()["tasks"][0]["title"], "Write report");
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn local_cleanup_fixes_trailing_comma() {
        let gateway = Arc::new(ScriptedGateway::default());
        let raw = r#"{"tasks": [{"title": "a", "subTasks": [],},],}"#;
        let outcome = agent(&gateway).ensure_valid_json(raw, EXPECTED_SHAPE).await;

        assert!(outcome.success);
        assert_eq!(outcome.repair_calls, 0);
        assert!(gateway.calls().is_empty());
    }

    #[tokio::test]
    async fn fenced_output_is_unwrapped_locally() {
        let gateway = Arc::new(ScriptedGateway::default());
        let raw = format!("Sure!\n```json\n{}\n```", VALID);
        let outcome = agent(&gateway).ensure_valid_json(&raw, EXPECTED_SHAPE).await;

        assert!(outcome.success);
        assert_eq!(outcome.content, VALID);
    }

    #[tokio::test]
    async fn repair_call_recovers_malformed_output() {
        let gateway = Arc::new(ScriptedGateway::replying(&[VALID]));
        let outcome = agent(&gateway)
            .ensure_valid_json("{\"tasks\": [{\"title\": ", EXPECTED_SHAPE)
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.repair_calls, 1);

        let calls = gateway.calls();
        assert_eq!(calls.len(), 1);
        let (variant, request) = &calls[0];
        assert_eq!(*variant, ModelVariant::Fast);
        assert_eq!(request.response_schema, Some(task_document_schema()));
        assert!(request.messages[1].content.contains("{\"tasks\": [{\"title\": "));
        assert!(request.messages[1].content.contains("\"subTasks\""));
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let gateway = Arc::new(ScriptedGateway::replying(&["still broken", "nope", "never"]));
        let outcome = agent(&gateway).ensure_valid_json("broken", EXPECTED_SHAPE).await;

        assert!(!outcome.success);
        assert!(outcome.value.is_none());
        assert_eq!(outcome.repair_calls, DEFAULT_MAX_ATTEMPTS - 1);
        assert_eq!(gateway.calls().len(), (DEFAULT_MAX_ATTEMPTS - 1) as usize);
        assert_eq!(outcome.content, "nope");
        assert!(matches!(
            outcome.last_error,
            Some(ExtractionError::JsonMalformed(_))
        ));
    }

    #[tokio::test]
    async fn wrong_shape_counts_as_a_failure() {
        let gateway = Arc::new(ScriptedGateway::replying(&[VALID]));
        let outcome = agent(&gateway)
            .ensure_valid_json(r#"[{"title": "a"}]"#, EXPECTED_SHAPE)
            .await;

        assert!(outcome.success);
        assert_eq!(outcome.repair_calls, 1);
        assert!(gateway.calls()[0].1.messages[1]
            .content
            .contains("expected an object with a `tasks` array, found an array"));
    }

    #[tokio::test]
    async fn task_list_without_objects_is_repaired() {
        let gateway = Arc::new(ScriptedGateway::replying(&[VALID]));
        let raw = r#"{"tasks": ["Write the report", "Book the room"]}"#;
        let outcome = agent(&gateway).ensure_valid_json(raw, EXPECTED_SHAPE).await;

        assert!(outcome.success);
        assert_eq!(outcome.repair_calls, 1);
        assert_eq!(gateway.call_count(ModelVariant::Fast), 1);
        assert!(gateway.calls()[0].1.messages[1]
            .content
            .contains("`tasks` holds no task objects"));
    }

    #[tokio::test]
    async fn failed_repair_call_consumes_an_attempt() {
        let gateway = Arc::new(ScriptedGateway::new(vec![
            Err(LlmError::network_error("connection refused".to_string())),
            Ok(VALID.to_string()),
        ]));
        let outcome = agent(&gateway).ensure_valid_json("{oops", EXPECTED_SHAPE).await;

        assert!(outcome.success);
        assert_eq!(outcome.repair_calls, 2);
        // the second repair still sees the original content
        assert!(gateway.calls()[1].1.messages[1].content.contains("{oops"));
    }

    #[tokio::test]
    async fn single_attempt_never_calls_the_model() {
        let gateway = Arc::new(ScriptedGateway::replying(&[VALID]));
        let outcome = agent(&gateway)
            .with_max_attempts(1)
            .ensure_valid_json("broken", EXPECTED_SHAPE)
            .await;

        assert!(!outcome.success);
        assert_eq!(outcome.repair_calls, 0);
        assert!(gateway.calls().is_empty());
        assert!(outcome.into_result().is_err());
    }

    #[test]
    fn validate_reports_shape_problems() {
        assert!(JsonValidatorAgent::validate(VALID).is_ok());

        let err = JsonValidatorAgent::validate(r#"{"items": []}"#).unwrap_err();
        assert_eq!(err.to_string(), "unexpected JSON shape: missing `tasks` array");

        let err = JsonValidatorAgent::validate(r#"{"tasks": "none"}"#).unwrap_err();
        assert!(matches!(err, ExtractionError::SchemaMismatch(ref m) if m.contains("a string")));

        let err = JsonValidatorAgent::validate(r#"{"tasks": ["a", 1]}"#).unwrap_err();
        assert_eq!(err.to_string(), "unexpected JSON shape: `tasks` holds no task objects");

        assert!(JsonValidatorAgent::validate(r#"{"tasks": []}"#).is_ok());
        assert!(JsonValidatorAgent::validate(r#"{"tasks": ["a", {"title": "b"}]}"#).is_ok());

        let err = JsonValidatorAgent::validate("not json").unwrap_err();
        assert!(matches!(err, ExtractionError::JsonMalformed(_)));
    }

    #[test]
    fn zero_attempts_is_raised_to_one() {
        let gateway = Arc::new(ScriptedGateway::default());
        assert_eq!(agent(&gateway).with_max_attempts(0).max_attempts(), 1);
    }
}
