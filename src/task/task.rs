//! Candidate task records produced by one extraction.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::CandidateSubtask;

/// Task priority, in its canonical four-value form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Urgent,
    High,
    Mid,
    Low,
}

impl Priority {
    /// Map any spelling a model might produce onto a canonical priority.
    ///
    /// Matching is case-insensitive. `medium` and `normal` are aliases of
    /// `mid`; anything unrecognised is `mid` as well.
    pub fn normalize(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "urgent" => Priority::Urgent,
            "high" => Priority::High,
            "low" => Priority::Low,
            _ => Priority::Mid,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Urgent => "urgent",
            Priority::High => "high",
            Priority::Mid => "mid",
            Priority::Low => "low",
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Mid
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A task extracted from free-form text, ready to hand to the persistence layer.
///
/// # Invariants
/// - `reference` is never null; "no link" is the empty string
/// - a candidate is never completed
/// - the total estimate is derived from the subtasks, never stored
///
/// Serializes with exactly `title`, `description`, `dueDate`, `priority`,
/// `reference` and `subTasks`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateTask {
    title: String,
    description: String,
    due_date: Option<String>,
    priority: Priority,
    reference: String,
    #[serde(rename = "subTasks")]
    subtasks: Vec<CandidateSubtask>,
}

impl CandidateTask {
    /// Create a task with no description, due date, reference or subtasks.
    pub fn new(title: impl Into<String>, priority: Priority) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            due_date: None,
            priority,
            reference: String::new(),
            subtasks: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the due date. Callers are responsible for passing an ISO-8601 string.
    pub fn with_due_date(mut self, due_date: Option<String>) -> Self {
        self.due_date = due_date;
        self
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = reference.into();
        self
    }

    pub fn with_subtasks(mut self, subtasks: Vec<CandidateSubtask>) -> Self {
        self.subtasks = subtasks;
        self
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn due_date(&self) -> Option<&str> {
        self.due_date.as_deref()
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }

    pub fn reference(&self) -> &str {
        &self.reference
    }

    pub fn subtasks(&self) -> &[CandidateSubtask] {
        &self.subtasks
    }

    /// Sum of the subtask estimates.
    pub fn total_estimated_minutes(&self) -> u64 {
        self.subtasks
            .iter()
            .map(|s| u64::from(s.estimated_min()))
            .sum()
    }

    /// Candidates are fresh work; completion is tracked downstream.
    pub fn is_completed(&self) -> bool {
        false
    }
}
