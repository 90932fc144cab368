//! # Task Extractor
//!
//! Turns free-form text (notes, meeting minutes, chat logs) into structured
//! candidate tasks using a hosted chat-completion model.
//!
//! This library provides:
//! - A two-variant LLM gateway over CLOVA Studio with streaming reassembly
//! - A JSON validation loop that repairs malformed model output
//! - A deterministic keyword fallback, so extraction always returns tasks
//!
//! ## Architecture
//!
//! ```text
//!        ┌──────────────────────────────────┐
//!        │            Extractor             │
//!        │  prompt → model → validate →     │
//!        │  normalize        (or fallback)  │
//!        └────────────────┬─────────────────┘
//!                         │
//!              ┌──────────┴──────────┐
//!              ▼                     ▼
//!     ┌─────────────────┐   ┌─────────────────┐
//!     │ Reasoning model │   │   Fast model    │
//!     │  (extraction)   │   │ (JSON repairs)  │
//!     └─────────────────┘   └─────────────────┘
//! ```
//!
//! ## Task Flow
//! 1. Build the prompt from text, profile and today's date
//! 2. Call the reasoning model
//! 3. Clean and parse the output, repairing it through the fast model if needed
//! 4. Normalize into canonical tasks, or fall back to keyword rules
//!
//! ## Modules
//! - `agents`: The extraction pipeline
//! - `llm`: Gateway trait and the CLOVA Studio client
//! - `task`: Candidate task, subtask and profile records
//! - `config`: Environment-based configuration

pub mod agents;
pub mod config;
pub mod llm;
pub mod task;

pub use agents::{Extraction, ExtractionError, Extractor, TaskSource};
pub use config::Config;
pub use task::{CandidateSubtask, CandidateTask, Priority, UserProfile};
