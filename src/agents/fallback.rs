//! Rule-based task generation used when the model path is unavailable.
//!
//! Output depends only on the input text: the same text always produces the
//! same tasks, in the same order, with the same serialization.

use regex::Regex;
use std::sync::OnceLock;
use url::Url;

use crate::task::{CandidateSubtask, CandidateTask, Priority};

/// A keyword that, when present in the text, yields one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackRule {
    pub keyword: &'static str,
    pub title: &'static str,
    pub category: &'static str,
    pub default_minutes: u32,
}

const fn rule(keyword: &'static str, title: &'static str, category: &'static str) -> FallbackRule {
    FallbackRule {
        keyword,
        title,
        category,
        default_minutes: 60,
    }
}

/// Keyword table, matched in order against the lowercased text.
pub const FALLBACK_RULES: &[FallbackRule] = &[
    rule("meeting", "Meeting preparation", "Meeting"),
    rule("report", "Report writing", "Documentation"),
    rule("develop", "Development task", "Development"),
    rule("code", "Code writing", "Development"),
    rule("review", "Review task", "Development"),
    rule("test", "Testing", "Development"),
    rule("deploy", "Deployment", "Development"),
];

const GENERIC_TITLE: &str = "Review required";
const GENERIC_DESCRIPTION_CHARS: usize = 200;
const GENERIC_WORK_MINUTES: u32 = 60;

const TRAILING_URL_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}', '>', '"', '\''];

fn url_candidate() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"https?://[^\s]+").expect("static regex is valid"))
}

/// Produce at least one task from `text` without any model call.
///
/// One `mid` task per matching keyword, in table order. With no match, a
/// single `low` generic review task whose description is the first 200
/// characters of `text`.
pub fn generate(text: &str) -> Vec<CandidateTask> {
    let lowered = text.to_lowercase();

    let tasks: Vec<CandidateTask> = FALLBACK_RULES
        .iter()
        .filter(|rule| lowered.contains(rule.keyword))
        .map(|rule| keyword_task(rule, text))
        .collect();

    if tasks.is_empty() {
        vec![generic_task(text)]
    } else {
        tasks
    }
}

fn keyword_task(rule: &FallbackRule, text: &str) -> CandidateTask {
    let reference = text
        .lines()
        .find(|line| line.to_lowercase().contains(rule.keyword))
        .and_then(first_url)
        .unwrap_or_default();

    CandidateTask::new(rule.title, Priority::Mid)
        .with_description(format!("{}: {} related task", rule.category, rule.keyword))
        .with_reference(reference)
        .with_subtasks(generic_subtasks(rule.default_minutes))
}

fn generic_task(text: &str) -> CandidateTask {
    let description: String = text.chars().take(GENERIC_DESCRIPTION_CHARS).collect();

    CandidateTask::new(GENERIC_TITLE, Priority::Low)
        .with_description(description)
        .with_reference(first_url(text).unwrap_or_default())
        .with_subtasks(generic_subtasks(GENERIC_WORK_MINUTES))
}

fn generic_subtasks(work_minutes: u32) -> Vec<CandidateSubtask> {
    vec![
        CandidateSubtask::new("Review content", 30),
        CandidateSubtask::new("Perform work", work_minutes),
        CandidateSubtask::new("Confirm completion", 15),
    ]
}

/// First well-formed `http(s)` URL in `text`, without trailing punctuation.
pub fn first_url(text: &str) -> Option<String> {
    url_candidate().find_iter(text).find_map(|m| {
        let candidate = m.as_str().trim_end_matches(TRAILING_URL_PUNCTUATION);
        Url::parse(candidate)
            .ok()
            .filter(|url| url.host_str().is_some())
            .map(|_| candidate.to_string())
    })
}
