//! Reassembly of a server-sent event stream into one content string.
//!
//! Framing rules:
//! - bytes are buffered until a full line (`\n` or `\r\n`) is available
//! - `event:` names the current event until the next blank line
//! - every `data:` line is one payload
//! - `[DONE]`, bare or as `{"data":"[DONE]"}`, ends the stream
//!
//! Text deltas are appended strictly in arrival order. A `result` event holds
//! the whole message and is only used when no delta arrived, so the content is
//! never duplicated. Payloads that are not valid JSON are skipped.

use serde_json::Value;

use super::LlmError;

const DONE_SENTINEL: &str = "[DONE]";

/// Incremental SSE decoder.
#[derive(Debug, Default)]
pub struct SseAssembler {
    pending: Vec<u8>,
    event: Option<String>,
    content: String,
    result: Option<String>,
    error: Option<String>,
    finished: bool,
    skipped: usize,
}

impl SseAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of the response body.
    pub fn push(&mut self, chunk: &[u8]) {
        if self.finished {
            return;
        }
        self.pending.extend_from_slice(chunk);

        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            self.handle_line(&line);
            if self.finished {
                self.pending.clear();
                break;
            }
        }
    }

    /// Whether the terminal sentinel has been seen.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Number of frames that could not be decoded.
    pub fn skipped_frames(&self) -> usize {
        self.skipped
    }

    /// Flush any unterminated last line and return the assembled content.
    ///
    /// # Errors
    /// - the stream carried an `error` event
    /// - the stream carried no text at all
    pub fn finish(mut self) -> Result<String, LlmError> {
        if !self.finished && !self.pending.is_empty() {
            let rest = std::mem::take(&mut self.pending);
            self.handle_line(&rest);
        }

        if self.skipped > 0 {
            tracing::warn!(skipped = self.skipped, "Skipped undecodable SSE frames");
        }

        if let Some(message) = self.error {
            return Err(LlmError::stream_error(message));
        }

        let content = if self.content.is_empty() {
            self.result.unwrap_or_default()
        } else {
            self.content
        };

        if content.is_empty() {
            return Err(LlmError::empty_response());
        }
        Ok(content)
    }

    fn handle_line(&mut self, raw: &[u8]) {
        let Ok(text) = std::str::from_utf8(raw) else {
            self.skipped += 1;
            return;
        };
        let line = text.trim_end_matches(['\n', '\r']);

        if line.is_empty() {
            self.event = None;
            return;
        }
        if line.starts_with(':') {
            return;
        }

        if let Some(name) = line.strip_prefix("event:") {
            self.event = Some(name.trim().to_string());
        } else if let Some(data) = line.strip_prefix("data:") {
            self.handle_data(data.trim());
        }
    }

    fn handle_data(&mut self, data: &str) {
        if data.is_empty() {
            return;
        }
        if data == DONE_SENTINEL {
            self.finished = true;
            return;
        }

        let payload: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(e) => {
                tracing::debug!(error = %e, "Skipping malformed SSE frame");
                self.skipped += 1;
                return;
            }
        };

        if payload.get("data").and_then(Value::as_str) == Some(DONE_SENTINEL) {
            self.finished = true;
            return;
        }

        match self.event.as_deref() {
            Some("error") => {
                self.error = Some(error_message(&payload));
                self.finished = true;
            }
            Some("result") => {
                self.result = message_text(&payload).map(str::to_string);
            }
            Some("signal") => {}
            _ => {
                if let Some(delta) = message_text(&payload) {
                    self.content.push_str(delta);
                }
            }
        }
    }
}

/// Text of a payload: CLOVA `message.content`, or OpenAI `choices[0].delta.content`.
fn message_text(payload: &Value) -> Option<&str> {
    payload
        .pointer("/message/content")
        .and_then(Value::as_str)
        .or_else(|| {
            payload
                .pointer("/choices/0/delta/content")
                .and_then(Value::as_str)
        })
}

fn error_message(payload: &Value) -> String {
    payload
        .pointer("/status/message")
        .or_else(|| payload.pointer("/error/message"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| payload.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::LlmErrorKind;

    fn assemble(body: &str) -> Result<String, LlmError> {
        let mut sse = SseAssembler::new();
        sse.push(body.as_bytes());
        sse.finish()
    }

    #[test]
    fn concatenates_token_events_in_order() {
        let body = "event: token\ndata: {\"message\":{\"role\":\"assistant\",\"content\":\"{\\\"ta\"}}\n\n\
                    event: token\ndata: {\"message\":{\"role\":\"assistant\",\"content\":\"sks\\\": []}\"}}\n\n";
        assert_eq!(assemble(body).unwrap(), "{\"tasks\": []}");
    }

    #[test]
    fn result_event_does_not_duplicate_deltas() {
        let body = "event: token\ndata: {\"message\":{\"content\":\"Hel\"}}\n\n\
                    event: token\ndata: {\"message\":{\"content\":\"lo\"}}\n\n\
                    event: result\ndata: {\"message\":{\"content\":\"Hello\"}}\n\n\
                    event: signal\ndata: {\"data\":\"[DONE]\"}\n\n";
        assert_eq!(assemble(body).unwrap(), "Hello");
    }

    #[test]
    fn result_event_used_when_no_deltas() {
        let body = "event: result\ndata: {\"message\":{\"content\":\"whole\"}}\n\n";
        assert_eq!(assemble(body).unwrap(), "whole");
    }

    #[test]
    fn skips_malformed_frames() {
        let mut sse = SseAssembler::new();
        sse.push(b"data: {\"message\":{\"content\":\"a\"}}\n");
        sse.push(b"data: {not json\n");
        sse.push(b"data: {\"message\":{\"content\":\"b\"}}\n");
        assert_eq!(sse.skipped_frames(), 1);
        assert_eq!(sse.finish().unwrap(), "ab");
    }

    #[test]
    fn stops_at_done_sentinel() {
        let mut sse = SseAssembler::new();
        sse.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\n\ndata: [DONE]\n\n");
        assert!(sse.is_finished());
        sse.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n");
        assert_eq!(sse.finish().unwrap(), "x");
    }

    #[test]
    fn handles_lines_split_across_chunks() {
        let mut sse = SseAssembler::new();
        sse.push(b"data: {\"message\":{\"con");
        sse.push(b"tent\":\"split\"}}\r");
        sse.push(b"\n\r\n");
        assert_eq!(sse.finish().unwrap(), "split");
    }

    #[test]
    fn handles_multibyte_text_split_across_chunks() {
        let body = "data: {\"message\":{\"content\":\"보고서\"}}\n".as_bytes();
        let (head, tail) = body.split_at(30);
        let mut sse = SseAssembler::new();
        sse.push(head);
        sse.push(tail);
        assert_eq!(sse.finish().unwrap(), "보고서");
    }

    #[test]
    fn flushes_unterminated_last_line() {
        assert_eq!(
            assemble("data: {\"message\":{\"content\":\"tail\"}}").unwrap(),
            "tail"
        );
    }

    #[test]
    fn error_event_becomes_stream_error() {
        let body = "event: error\ndata: {\"status\":{\"code\":\"40001\",\"message\":\"bad request\"}}\n\n";
        let err = assemble(body).unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::StreamError);
        assert!(err.message.contains("bad request"));
    }

    #[test]
    fn empty_stream_is_an_error() {
        let err = assemble("event: signal\ndata: {\"data\":\"[DONE]\"}\n\n").unwrap_err();
        assert_eq!(err.kind, LlmErrorKind::EmptyResponse);
    }

    #[test]
    fn ignores_comments_and_ids() {
        let body = ": keep-alive\nid: 1\ndata: {\"message\":{\"content\":\"ok\"}}\n\n";
        assert_eq!(assemble(body).unwrap(), "ok");
    }
}
