//! Subtask records attached to a candidate task.

use serde::Serialize;

/// Minutes assumed when a subtask carries no usable estimate.
pub const DEFAULT_SUBTASK_MINUTES: u32 = 30;

/// One step of a candidate task.
///
/// # Invariants
/// - `is_checked` is `false` for every subtask the pipeline produces
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CandidateSubtask {
    title: String,

    #[serde(rename = "estimatedMin")]
    estimated_min: u32,

    #[serde(rename = "isChecked")]
    is_checked: bool,
}

impl CandidateSubtask {
    /// Create an unchecked subtask.
    pub fn new(title: impl Into<String>, estimated_min: u32) -> Self {
        Self {
            title: title.into(),
            estimated_min,
            is_checked: false,
        }
    }

    /// Create an unchecked subtask with the default estimate.
    pub fn with_default_estimate(title: impl Into<String>) -> Self {
        Self::new(title, DEFAULT_SUBTASK_MINUTES)
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn estimated_min(&self) -> u32 {
        self.estimated_min
    }

    pub fn is_checked(&self) -> bool {
        self.is_checked
    }
}
