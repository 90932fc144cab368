//! Coerces a validated model document into canonical candidate tasks.
//!
//! The model speaks a looser dialect than the task contract: upper-case
//! priorities, `"null"` strings, minutes written as text, and a `references`
//! key. Everything is mapped onto [`CandidateTask`] here, and nothing in this
//! module can fail.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::task::{CandidateSubtask, CandidateTask, Priority, DEFAULT_SUBTASK_MINUTES};

const DEFAULT_TASK_TITLE: &str = "Untitled task";
const DEFAULT_SUBTASK_TITLE: &str = "Subtask";

const REFERENCE_KEYS: &[&str] = &["reference", "references"];
const SUBTASK_KEYS: &[&str] = &["subTasks", "subtasks"];
const MINUTES_KEYS: &[&str] = &["estimatedMin", "estimatedMinutes", "estimated_min"];

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_SEPARATORS: &[char] = &['T', ' '];
const TIME_FORMATS: &[&str] = &["%H:%M:%S%.f", "%H:%M:%S", "%H:%M"];
const OFFSET_FORMATS: &[&str] = &["%:z", "%z"];

fn digit_run() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\d+").expect("static regex is valid"))
}

/// Normalize every task in a `{"tasks": [...]}` document.
///
/// Entries of `tasks` that are not objects are skipped. A document without a
/// `tasks` array yields an empty list.
pub fn normalize_tasks(document: &Value) -> Vec<CandidateTask> {
    document
        .get("tasks")
        .and_then(Value::as_array)
        .map(|tasks| {
            tasks
                .iter()
                .filter_map(Value::as_object)
                .map(normalize_task)
                .collect()
        })
        .unwrap_or_default()
}

/// Normalize one task object. The reference is read from this object only.
pub fn normalize_task(raw: &Map<String, Value>) -> CandidateTask {
    let title = text_field(raw.get("title")).unwrap_or_else(|| DEFAULT_TASK_TITLE.to_string());
    let description = raw
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let priority = raw
        .get("priority")
        .and_then(Value::as_str)
        .map(Priority::normalize)
        .unwrap_or_default();
    let due_date = raw.get("dueDate").and_then(normalize_due_date);

    let subtasks = SUBTASK_KEYS
        .iter()
        .find_map(|key| raw.get(*key).and_then(Value::as_array))
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .map(normalize_subtask)
                .collect()
        })
        .unwrap_or_default();

    CandidateTask::new(title, priority)
        .with_description(description)
        .with_due_date(due_date)
        .with_reference(normalize_reference(raw))
        .with_subtasks(subtasks)
}

fn normalize_subtask(raw: &Map<String, Value>) -> CandidateSubtask {
    let title =
        text_field(raw.get("title")).unwrap_or_else(|| DEFAULT_SUBTASK_TITLE.to_string());
    match MINUTES_KEYS.iter().find_map(|key| raw.get(*key)) {
        Some(minutes) => CandidateSubtask::new(title, parse_minutes(minutes)),
        None => CandidateSubtask::with_default_estimate(title),
    }
}

/// Keep a due date only when it is a strict ISO-8601 date or date-time.
///
/// Times may carry seconds, minutes or only the hour, with an optional offset
/// (`Z`, `+09:00` or `+0900`). The accepted string is returned trimmed but
/// otherwise verbatim.
pub fn normalize_due_date(value: &Value) -> Option<String> {
    let raw = value.as_str()?.trim();
    if raw.is_empty() {
        return None;
    }

    is_iso_date_or_time(raw).then(|| raw.to_string())
}

fn is_iso_date_or_time(raw: &str) -> bool {
    let utc = raw
        .strip_suffix('Z')
        .or_else(|| raw.strip_suffix('z'))
        .map(|rest| format!("{}+00:00", rest));
    let candidate = utc.as_deref().unwrap_or(raw);

    if DateTime::parse_from_rfc3339(candidate).is_ok()
        || NaiveDate::parse_from_str(candidate, DATE_FORMAT).is_ok()
    {
        return true;
    }

    DATE_TIME_SEPARATORS.iter().any(|separator| {
        // chrono needs minutes, so an hour-only time is checked with ":00" appended
        let hour_only = format!("{}{}%H:%M", DATE_FORMAT, separator);
        if utc.is_none()
            && NaiveDateTime::parse_from_str(&format!("{}:00", candidate), &hour_only).is_ok()
        {
            return true;
        }

        TIME_FORMATS.iter().any(|time| {
            let local = format!("{}{}{}", DATE_FORMAT, separator, time);
            NaiveDateTime::parse_from_str(candidate, &local).is_ok()
                || OFFSET_FORMATS.iter().any(|offset| {
                    DateTime::parse_from_str(candidate, &format!("{}{}", local, offset)).is_ok()
                })
        })
    })
}

/// Read the task's own link. Null, absent and the string `"null"` become `""`.
pub fn normalize_reference(raw: &Map<String, Value>) -> String {
    REFERENCE_KEYS
        .iter()
        .filter_map(|key| raw.get(*key))
        .find_map(reference_text)
        .unwrap_or_default()
}

fn reference_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty() && !s.eq_ignore_ascii_case("null")).then(|| s.to_string())
        }
        Value::Array(items) => items.iter().find_map(reference_text),
        _ => None,
    }
}

/// Interpret an estimate in minutes.
///
/// Non-negative numbers are truncated to whole minutes; text yields its first
/// run of digits. Anything else is worth [`DEFAULT_SUBTASK_MINUTES`].
pub fn parse_minutes(value: &Value) -> u32 {
    let minutes = match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.is_finite() && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => digit_run()
            .find(s)
            .and_then(|m| m.as_str().parse::<u64>().ok()),
        _ => None,
    };

    minutes
        .and_then(|m| u32::try_from(m).ok())
        .unwrap_or(DEFAULT_SUBTASK_MINUTES)
}

fn text_field(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
