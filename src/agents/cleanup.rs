//! Local cleanup of model output before JSON parsing.
//!
//! The rules, applied in order:
//! 1. trim surrounding whitespace
//! 2. unwrap a fenced code block, preferring a fence tagged with the word
//!    `json` in any case; for any other fence, drop a leading language tag word
//! 3. remove commas that directly precede `}` or `]`
//! 4. trim again
//!
//! Rule 3 is textual: a `,}` sequence inside a string literal is rewritten too.

use regex::Regex;
use std::sync::OnceLock;

const FENCE: &str = "```";

fn json_fence() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)```json\b").expect("static regex is valid"))
}

fn trailing_comma() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r",(\s*[}\]])").expect("static regex is valid"))
}

/// Apply every cleanup rule to `content`.
pub fn clean_json_text(content: &str) -> String {
    let unfenced = strip_code_fence(content.trim());
    remove_trailing_commas(unfenced).trim().to_string()
}

/// Return the body of the first fenced block, or the input when there is none.
pub fn strip_code_fence(content: &str) -> &str {
    if let Some(tag) = json_fence().find(content) {
        let body = &content[tag.end()..];
        let end = body.find(FENCE).unwrap_or(body.len());
        return body[..end].trim();
    }

    let Some(start) = content.find(FENCE) else {
        return content;
    };
    let body = &content[start + FENCE.len()..];
    let end = body.find(FENCE).unwrap_or(body.len());
    drop_language_tag(body[..end].trim())
}

/// Remove commas sitting right before a closing brace or bracket.
pub fn remove_trailing_commas(content: &str) -> String {
    trailing_comma().replace_all(content, "$1").into_owned()
}

/// Drop a leading word such as `JSON` or `javascript` left over from a fence tag.
fn drop_language_tag(body: &str) -> &str {
    let tag_len = body
        .char_indices()
        .find(|(_, c)| !c.is_ascii_alphanumeric())
        .map_or(body.len(), |(i, _)| i);

    if tag_len == 0 || !body[..tag_len].starts_with(|c: char| c.is_ascii_alphabetic()) {
        return body;
    }
    body[tag_len..].trim_start()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn leaves_plain_json_alone() {
        assert_eq!(clean_json_text("  {\"tasks\": []}\n"), "{\"tasks\": []}");
    }

    #[test]
    fn strips_json_tagged_fence() {
        let raw = "Here you go:\n```json\n{\"tasks\": []}\n```\nAnything else?";
        assert_eq!(clean_json_text(raw), "{\"tasks\": []}");
    }

    #[test]
    fn prefers_json_fence_over_earlier_bare_fence() {
        let raw = "```\nnot this\n```\n```json\n{\"a\": 1}\n```";
        assert_eq!(clean_json_text(raw), "{\"a\": 1}");
    }

    #[test]
    fn strips_bare_fence_and_language_tag() {
        assert_eq!(clean_json_text("```\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(clean_json_text("```JSON\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(clean_json_text("```javascript {\"a\": 1}```"), "{\"a\": 1}");
    }

    #[test]
    fn json_tag_matches_whole_word_in_any_case() {
        assert_eq!(clean_json_text("```jsonc\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(clean_json_text("```JSON{\"a\": 1}```"), "{\"a\": 1}");
        let raw = "```\nnot this\n```\n```Json\n{\"b\": 2}\n```";
        assert_eq!(clean_json_text(raw), "{\"b\": 2}");
    }

    #[test]
    fn unterminated_fence_keeps_the_rest() {
        assert_eq!(clean_json_text("```json\n{\"a\": 1}"), "{\"a\": 1}");
    }

    #[test]
    fn removes_trailing_commas() {
        let raw = "{\"tasks\": [{\"title\": \"a\",}, {\"title\": \"b\"},\n],}";
        assert_eq!(
            clean_json_text(raw),
            "{\"tasks\": [{\"title\": \"a\"}, {\"title\": \"b\"}\n]}"
        );
    }

    #[test]
    fn keeps_commas_between_values() {
        assert_eq!(remove_trailing_commas("[1, 2, 3]"), "[1, 2, 3]");
    }
}
