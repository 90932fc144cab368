//! Prompt construction for extraction and JSON repair.
//!
//! Every prompt the pipeline sends is built here. Builders are pure: the same
//! text, profile and date always yield the same prompt.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime};

use crate::llm::ChatMessage;
use crate::task::UserProfile;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// Literal example of the document the model must return.
pub const EXPECTED_SHAPE: &str = r#"{
  "tasks": [
    {
      "title": "Prepare presentation",
      "description": "Slides for the quarterly review",
      "priority": "HIGH",
      "dueDate": "2025-08-11T23:59:59",
      "isCompleted": false,
      "subTasks": [
        {"title": "Collect figures", "estimatedMin": 30, "isChecked": false}
      ],
      "references": null
    }
  ]
}"#;

/// A system/user prompt pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub user: String,
}

impl Prompt {
    pub fn into_messages(self) -> Vec<ChatMessage> {
        vec![ChatMessage::system(self.system), ChatMessage::user(self.user)]
    }
}

/// Concrete deadlines for the relative phrases the prompt teaches.
///
/// All of them fall at the end of their day (`23:59:59`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelativeDeadlines {
    pub tomorrow: NaiveDateTime,
    pub next_week: NaiveDateTime,
    pub end_of_month: NaiveDateTime,
}

impl RelativeDeadlines {
    pub fn from_date(today: NaiveDate) -> Self {
        Self {
            tomorrow: end_of_day(add_days(today, 1)),
            next_week: end_of_day(add_days(today, 7)),
            end_of_month: end_of_day(last_day_of_month(today)),
        }
    }
}

fn add_days(date: NaiveDate, days: u64) -> NaiveDate {
    date.checked_add_days(chrono::Days::new(days))
        .unwrap_or(date)
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_time(NaiveTime::from_hms_opt(23, 59, 59).unwrap_or_default())
}

fn last_day_of_month(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|first_of_next| first_of_next.pred_opt())
        .unwrap_or(date)
}

/// Builds the prompts for both model calls.
pub struct PromptBuilder;

impl PromptBuilder {
    /// Build the extraction prompt.
    ///
    /// # Postconditions
    /// - the system prompt names `today` and the resolved relative deadlines
    /// - the system prompt states that a link belongs only to its own task
    /// - the user prompt ends with `text` verbatim
    pub fn build(text: &str, profile: Option<&UserProfile>, today: NaiveDate) -> Prompt {
        let deadlines = RelativeDeadlines::from_date(today);
        let profile_block = profile
            .filter(|p| !p.is_empty())
            .map(profile_context)
            .unwrap_or_default();

        let system = format!(
            r#"You are a task extraction expert.
Extract the tasks and subtasks contained in the given text and answer ONLY with JSON in exactly this format.

Today's date: {today}
{profile_block}
Answer with this JSON and nothing else:
{{
  "tasks": [
    {{
      "title": "task title",
      "description": "task details",
      "priority": "one of URGENT/HIGH/MID/LOW",
      "dueDate": "YYYY-MM-DDTHH:mm:ss or null",
      "isCompleted": false,
      "subTasks": [
        {{
          "title": "subtask title",
          "estimatedMin": minutes as an integer,
          "isChecked": false
        }}
      ],
      "references": "reference link or null"
    }}
  ]
}}

Priority:
- URGENT: must happen immediately or is explicitly called urgent
- HIGH: important, or due today or tomorrow
- MID: ordinary importance
- LOW: relaxed, optional or for reference only

Due dates:
- "tomorrow": {tomorrow}
- "next week": {next_week}
- "end of month" / "end of this month": {end_of_month}
- any other phrase: the end of that day (23:59:59) when it names one unambiguous day
- no date, or a phrase you cannot resolve: null

Reference links:
- A URL mentioned next to a task belongs in that task's "references" only
- Never copy a link into a different task's "references", even if both tasks are similar
- Example: "slides reference: https://a.example" -> only the slides task gets https://a.example
- No link for a task: null

Rules:
1. Every new task has "isCompleted": false and every subtask has "isChecked": false
2. Create 3-5 concrete subtasks for each task
3. Take the user's expertise and preferences into account
4. Estimate realistically, between 15 and 240 minutes per subtask
5. Match each reference link to exactly the task it was mentioned with
6. Pure JSON only, no markdown code fences such as ```json"#,
            today = today.format("%Y-%m-%d"),
            profile_block = profile_block,
            tomorrow = deadlines.tomorrow.format(TIMESTAMP_FORMAT),
            next_week = deadlines.next_week.format(TIMESTAMP_FORMAT),
            end_of_month = deadlines.end_of_month.format(TIMESTAMP_FORMAT),
        );

        let user = format!(
            "Extract the tasks from the text below.\n\
             Important: if a link relates to a task, put it only in that task's references.\n\
             e.g. \"presentation reference: https://A.com\" -> only the presentation task gets https://A.com\n\
             e.g. \"report reference: https://B.com\" -> only the report task gets https://B.com\n\
             \n\
             Text:\n{}",
            text
        );

        Prompt { system, user }
    }

    /// Build the prompt asking the fast model to repair malformed output.
    pub fn repair(malformed: &str, error_message: &str, expected_shape: &str) -> Prompt {
        let system = "You validate and fix JSON.\n\
             Rewrite the given text as valid JSON.\n\
             \n\
             Rules:\n\
             1. Answer with pure JSON only (no explanations, no markdown)\n\
             2. Produce syntactically valid JSON\n\
             3. Use double quotes for every string\n\
             4. Remove trailing commas\n\
             5. Use the right data types (string, number, boolean, null)"
            .to_string();

        let user = format!(
            "Fix the following JSON.\n\
             \n\
             Error message: {error_message}\n\
             \n\
             Malformed JSON:\n{malformed}\n\
             \n\
             Example of the correct format:\n{expected_shape}\n\
             \n\
             Answer only with the corrected JSON, following the structure of the example."
        );

        Prompt { system, user }
    }
}

fn profile_context(profile: &UserProfile) -> String {
    let mut lines = vec!["User profile:".to_string()];

    let mut push_value = |label: &str, value: Option<&str>| {
        if let Some(v) = value.map(str::trim).filter(|v| !v.is_empty()) {
            lines.push(format!("- {}: {}", label, v));
        }
    };
    push_value("Name", profile.name.as_deref());
    push_value("Role", profile.role.as_deref());
    push_value("Skills", Some(&join_list(&profile.skills)));
    push_value("Interests", Some(&join_list(&profile.interests)));
    push_value("Work style", profile.work_style.as_deref());
    push_value(
        "Preferred task types",
        Some(&join_list(&profile.preferred_task_types)),
    );

    lines.push(String::new());
    lines.push(
        "Extract tasks and create subtasks that fit this user's expertise and preferences."
            .to_string(),
    );
    format!("\n{}\n", lines.join("\n"))
}

fn join_list(items: &[String]) -> String {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn deadlines_resolve_relative_phrases() {
        let deadlines = RelativeDeadlines::from_date(date(2025, 8, 4));
        assert_eq!(deadlines.tomorrow.to_string(), "2025-08-05 23:59:59");
        assert_eq!(deadlines.next_week.to_string(), "2025-08-11 23:59:59");
        assert_eq!(deadlines.end_of_month.to_string(), "2025-08-31 23:59:59");
    }

    #[test]
    fn deadlines_cross_month_and_year_boundaries() {
        let deadlines = RelativeDeadlines::from_date(date(2025, 12, 28));
        assert_eq!(deadlines.tomorrow.to_string(), "2025-12-29 23:59:59");
        assert_eq!(deadlines.next_week.to_string(), "2026-01-04 23:59:59");
        assert_eq!(deadlines.end_of_month.to_string(), "2025-12-31 23:59:59");

        let leap = RelativeDeadlines::from_date(date(2024, 2, 10));
        assert_eq!(leap.end_of_month.to_string(), "2024-02-29 23:59:59");
    }

    #[test]
    fn extraction_prompt_embeds_date_rules_and_text() {
        let prompt = PromptBuilder::build("Finish the report", None, date(2025, 8, 4));

        assert!(prompt.system.contains("Today's date: 2025-08-04"));
        assert!(prompt.system.contains("\"tomorrow\": 2025-08-05T23:59:59"));
        assert!(prompt.system.contains("\"next week\": 2025-08-11T23:59:59"));
        assert!(prompt.system.contains("2025-08-31T23:59:59"));
        assert!(prompt.system.contains("null"));
        assert!(prompt.user.ends_with("Text:\nFinish the report"));
        assert!(!prompt.system.contains("User profile:"));
    }

    #[test]
    fn extraction_prompt_states_reference_isolation() {
        let prompt = PromptBuilder::build("x", None, date(2025, 8, 4));
        assert!(prompt
            .system
            .contains("Never copy a link into a different task's \"references\""));
        assert!(prompt.user.contains("only in that task's references"));
    }

    #[test]
    fn extraction_prompt_is_deterministic() {
        let a = PromptBuilder::build("same", None, date(2025, 1, 1));
        let b = PromptBuilder::build("same", None, date(2025, 1, 1));
        assert_eq!(a, b);
    }

    #[test]
    fn profile_block_lists_non_empty_fields() {
        let profile = UserProfile {
            name: Some("Kim".to_string()),
            role: Some("Backend developer".to_string()),
            skills: vec!["Rust".to_string(), " ".to_string(), "SQL".to_string()],
            ..UserProfile::default()
        };
        let prompt = PromptBuilder::build("x", Some(&profile), date(2025, 8, 4));

        assert!(prompt.system.contains("User profile:"));
        assert!(prompt.system.contains("- Name: Kim"));
        assert!(prompt.system.contains("- Role: Backend developer"));
        assert!(prompt.system.contains("- Skills: Rust, SQL"));
        assert!(!prompt.system.contains("- Interests"));
        assert!(!prompt.system.contains("- Work style"));
    }

    #[test]
    fn empty_profile_is_omitted() {
        let prompt = PromptBuilder::build("x", Some(&UserProfile::default()), date(2025, 8, 4));
        assert!(!prompt.system.contains("User profile:"));
    }

    #[test]
    fn repair_prompt_carries_content_error_and_shape() {
        let prompt = PromptBuilder::repair("{\"tasks\": [", "EOF while parsing", EXPECTED_SHAPE);
        assert!(prompt.user.contains("Error message: EOF while parsing"));
        assert!(prompt.user.contains("Malformed JSON:\n{\"tasks\": ["));
        assert!(prompt.user.contains("\"subTasks\""));
        assert!(prompt.system.contains("pure JSON only"));

        let messages = prompt.into_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, crate::llm::Role::System);
    }
}
