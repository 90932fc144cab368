//! Task module - defines the canonical records an extraction produces.
//!
//! This module is designed around invariants enforced in constructors:
//! - Fields are private; records are built once and only read afterwards
//! - Completion flags cannot be set to `true`
//! - Time totals are derived from subtasks, never stored

pub mod task;
mod profile;
mod subtask;

pub use profile::UserProfile;
pub use subtask::{CandidateSubtask, DEFAULT_SUBTASK_MINUTES};
pub use task::{CandidateTask, Priority};
