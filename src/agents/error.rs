//! Failure taxonomy of one extraction run.

use thiserror::Error;

use crate::llm::LlmError;

/// Why the model path of an extraction did not produce tasks.
///
/// None of these reach the caller of `Extractor::extract`; they are carried in
/// the extraction report and drive the fallback.
#[derive(Debug, Clone, Error)]
pub enum ExtractionError {
    #[error("no API credential configured")]
    Configuration,

    #[error("input text is empty")]
    EmptyInput,

    #[error("model call failed: {0}")]
    ModelCall(#[from] LlmError),

    #[error("malformed JSON: {0}")]
    JsonMalformed(String),

    #[error("unexpected JSON shape: {0}")]
    SchemaMismatch(String),

    #[error("model returned no usable tasks")]
    NoTasks,
}

impl ExtractionError {
    /// Errors the repair loop can try to fix by asking the model again.
    pub fn is_repairable(&self) -> bool {
        matches!(
            self,
            ExtractionError::JsonMalformed(_) | ExtractionError::SchemaMismatch(_)
        )
    }
}

impl From<serde_json::Error> for ExtractionError {
    fn from(err: serde_json::Error) -> Self {
        ExtractionError::JsonMalformed(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_errors_become_malformed() {
        let err: ExtractionError = serde_json::from_str::<serde_json::Value>("{")
            .unwrap_err()
            .into();
        assert!(matches!(err, ExtractionError::JsonMalformed(_)));
        assert!(err.is_repairable());
        assert!(err.to_string().starts_with("malformed JSON: EOF"));
    }

    #[test]
    fn call_errors_are_not_repairable() {
        let err: ExtractionError = LlmError::network_error("refused".to_string()).into();
        assert!(!err.is_repairable());
        assert!(!ExtractionError::Configuration.is_repairable());
    }
}
