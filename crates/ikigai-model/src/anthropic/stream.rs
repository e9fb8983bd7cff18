// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde_json::Value;

use crate::{ErrorKind, FinishReason, StreamEvent, Usage};

/// Map an Anthropic `stop_reason` string to the normalised finish reason.
pub(crate) fn map_finish_reason(stop_reason: Option<&str>) -> FinishReason {
    match stop_reason {
        Some("end_turn") => FinishReason::Stop,
        Some("max_tokens") => FinishReason::Length,
        Some("tool_use") => FinishReason::ToolUse,
        Some("stop_sequence") => FinishReason::Stop,
        Some("refusal") => FinishReason::ContentFilter,
        _ => FinishReason::Unknown,
    }
}

/// Map an Anthropic error `type` string to an error kind.
pub(crate) fn map_error_type(error_type: Option<&str>) -> ErrorKind {
    match error_type {
        Some("authentication_error") => ErrorKind::Auth,
        Some("rate_limit_error") => ErrorKind::RateLimit,
        Some("overloaded_error") => ErrorKind::Server,
        Some("invalid_request_error") => ErrorKind::InvalidArg,
        _ => ErrorKind::Unknown,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BlockKind {
    Text,
    Thinking,
    RedactedThinking,
    ToolCall,
}

/// Incremental parser for the Anthropic SSE stream.
///
/// Feed raw chunks as they arrive; complete `data:` lines are parsed and
/// turned into [`StreamEvent`]s.  Partial lines are carried between feeds.
/// Tool-call accumulation state is intentionally kept after
/// `content_block_stop` — the final assistant message needs it.
pub(crate) struct SseParser {
    line_buf: String,
    model: String,
    usage: Usage,
    finish_reason: FinishReason,
    current_block: Option<BlockKind>,
    current_index: i32,
    tool_id: String,
    tool_name: String,
    tool_args: String,
    thinking_text: String,
    signature: Option<String>,
}

impl SseParser {
    pub fn new() -> Self {
        Self {
            line_buf: String::new(),
            model: String::new(),
            usage: Usage::default(),
            finish_reason: FinishReason::Unknown,
            current_block: None,
            current_index: -1,
            tool_id: String::new(),
            tool_name: String::new(),
            tool_args: String::new(),
            thinking_text: String::new(),
            signature: None,
        }
    }

    /// Consume a raw transport chunk and return the events it completes.
    ///
    /// SSE lines can be split across TCP chunks, so only complete lines
    /// (terminated by '\n') are processed; the remainder is kept for the
    /// next call.
    pub fn feed(&mut self, chunk: &str) -> Vec<StreamEvent> {
        self.line_buf.push_str(chunk);
        let mut events = Vec::new();
        while let Some(pos) = self.line_buf.find('\n') {
            let line = self.line_buf[..pos].trim_end_matches('\r').to_string();
            self.line_buf.drain(..=pos);
            if let Some(data) = line.strip_prefix("data:") {
                events.extend(self.process_data(data.trim()));
            }
        }
        events
    }

    fn process_data(&mut self, data: &str) -> Vec<StreamEvent> {
        let value: Value = match serde_json::from_str(data) {
            Ok(v) => v,
            Err(_) => {
                return vec![StreamEvent::Error {
                    kind: ErrorKind::Unknown,
                    message: "Invalid JSON in SSE event".into(),
                }];
            }
        };
        if !value.is_object() {
            return vec![StreamEvent::Error {
                kind: ErrorKind::Unknown,
                message: "SSE event data is not a JSON object".into(),
            }];
        }
        self.process_event(&value)
    }

    fn process_event(&mut self, v: &Value) -> Vec<StreamEvent> {
        match v["type"].as_str().unwrap_or("") {
            "message_start" => self.on_message_start(v),
            "content_block_start" => self.on_block_start(v),
            "content_block_delta" => self.on_block_delta(v),
            "content_block_stop" => self.on_block_stop(v),
            "message_delta" => self.on_message_delta(v),
            "message_stop" => vec![StreamEvent::Done {
                finish_reason: self.finish_reason,
                usage: self.usage,
            }],
            "error" => self.on_error(v),
            // ping and unknown events are ignored
            _ => vec![],
        }
    }

    fn on_message_start(&mut self, v: &Value) -> Vec<StreamEvent> {
        let message = &v["message"];
        if let Some(model) = message["model"].as_str() {
            self.model = model.to_string();
        }
        if let Some(input) = message["usage"]["input_tokens"].as_i64() {
            self.usage.input_tokens = input as i32;
        }
        vec![StreamEvent::Start { model: self.model.clone() }]
    }

    fn on_block_start(&mut self, v: &Value) -> Vec<StreamEvent> {
        if let Some(index) = v["index"].as_i64() {
            self.current_index = index as i32;
        }
        let block = &v["content_block"];
        match block["type"].as_str() {
            Some("text") => {
                self.current_block = Some(BlockKind::Text);
                vec![]
            }
            Some("thinking") => {
                self.current_block = Some(BlockKind::Thinking);
                vec![]
            }
            Some("redacted_thinking") => {
                self.current_block = Some(BlockKind::RedactedThinking);
                vec![]
            }
            Some("tool_use") => {
                self.current_block = Some(BlockKind::ToolCall);
                self.tool_id = block["id"].as_str().unwrap_or("").to_string();
                self.tool_name = block["name"].as_str().unwrap_or("").to_string();
                vec![StreamEvent::ToolCallStart {
                    id: self.tool_id.clone(),
                    name: self.tool_name.clone(),
                    index: self.current_index,
                }]
            }
            _ => vec![],
        }
    }

    fn on_block_delta(&mut self, v: &Value) -> Vec<StreamEvent> {
        let index = v["index"].as_i64().unwrap_or(0) as i32;
        let delta = &v["delta"];
        match delta["type"].as_str().unwrap_or("") {
            "text_delta" => match delta["text"].as_str() {
                Some(text) => vec![StreamEvent::TextDelta { text: text.to_string(), index }],
                None => vec![],
            },
            "thinking_delta" => match delta["thinking"].as_str() {
                Some(thinking) => {
                    self.thinking_text.push_str(thinking);
                    vec![StreamEvent::ThinkingDelta { text: thinking.to_string(), index }]
                }
                None => vec![],
            },
            "signature_delta" => {
                if let Some(sig) = delta["signature"].as_str() {
                    self.signature = Some(sig.to_string());
                }
                vec![]
            }
            "input_json_delta" => match delta["partial_json"].as_str() {
                Some(partial) => {
                    self.tool_args.push_str(partial);
                    vec![StreamEvent::ToolCallDelta {
                        arguments: partial.to_string(),
                        index,
                    }]
                }
                None => vec![],
            },
            _ => vec![],
        }
    }

    fn on_block_stop(&mut self, v: &Value) -> Vec<StreamEvent> {
        let index = v["index"].as_i64().unwrap_or(0) as i32;
        let events = if self.current_block == Some(BlockKind::ToolCall) {
            // Tool accumulation state stays intact — the response builder
            // reads it after the stream ends.
            vec![StreamEvent::ToolCallDone { index }]
        } else {
            vec![]
        };
        self.current_index = -1;
        events
    }

    fn on_message_delta(&mut self, v: &Value) -> Vec<StreamEvent> {
        if let Some(stop_reason) = v["delta"]["stop_reason"].as_str() {
            self.finish_reason = map_finish_reason(Some(stop_reason));
        }
        let usage = &v["usage"];
        if let Some(output) = usage["output_tokens"].as_i64() {
            self.usage.output_tokens = output as i32;
        }
        if let Some(thinking) = usage["thinking_tokens"].as_i64() {
            self.usage.thinking_tokens = thinking as i32;
        }
        self.usage.total_tokens =
            self.usage.input_tokens + self.usage.output_tokens + self.usage.thinking_tokens;
        vec![]
    }

    fn on_error(&mut self, v: &Value) -> Vec<StreamEvent> {
        let error = &v["error"];
        if !error.is_object() {
            return vec![StreamEvent::Error {
                kind: ErrorKind::Unknown,
                message: "Unknown error".into(),
            }];
        }
        let kind = map_error_type(error["type"].as_str());
        let message = error["message"].as_str().unwrap_or("Unknown error").to_string();
        vec![StreamEvent::Error { kind, message }]
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn feed_events(parser: &mut SseParser, payloads: &[&str]) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        for p in payloads {
            events.extend(parser.feed(&format!("data: {p}\n")));
        }
        events
    }

    // ── Scenario: minimal run ─────────────────────────────────────────────────

    #[test]
    fn minimal_run_yields_start_delta_done() {
        let mut p = SseParser::new();
        let events = feed_events(
            &mut p,
            &[
                r#"{"type":"message_start","message":{"model":"claude-haiku-4-5","usage":{"input_tokens":10}}}"#,
                r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Hi"}}"#,
                r#"{"type":"content_block_stop","index":0}"#,
                r#"{"type":"message_delta","delta":{"stop_reason":"end_turn"},"usage":{"output_tokens":3}}"#,
                r#"{"type":"message_stop"}"#,
            ],
        );

        assert_eq!(events.len(), 3, "unexpected: {events:?}");
        assert!(matches!(&events[0], StreamEvent::Start { model } if model == "claude-haiku-4-5"));
        assert!(matches!(&events[1], StreamEvent::TextDelta { text, index }
            if text == "Hi" && *index == 0));
        match &events[2] {
            StreamEvent::Done { finish_reason, usage } => {
                assert_eq!(*finish_reason, FinishReason::Stop);
                assert_eq!(usage.input_tokens, 10);
                assert_eq!(usage.output_tokens, 3);
                assert_eq!(usage.total_tokens, 13);
            }
            other => panic!("expected Done, got {other:?}"),
        }
    }

    // ── Line reassembly ───────────────────────────────────────────────────────

    #[test]
    fn partial_lines_are_carried_between_feeds() {
        let mut p = SseParser::new();
        let first = p.feed("data: {\"type\":\"content_block_delta\",\"index\":0,");
        assert!(first.is_empty());
        let second = p.feed("\"delta\":{\"type\":\"text_delta\",\"text\":\"ok\"}}\n");
        assert!(matches!(&second[0], StreamEvent::TextDelta { text, .. } if text == "ok"));
    }

    #[test]
    fn event_name_lines_are_skipped() {
        let mut p = SseParser::new();
        let events = p.feed("event: message_stop\ndata: {\"type\":\"message_stop\"}\n");
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StreamEvent::Done { .. }));
    }

    // ── Tool call accumulation ────────────────────────────────────────────────

    #[test]
    fn tool_use_block_emits_start_deltas_and_done() {
        let mut p = SseParser::new();
        let events = feed_events(
            &mut p,
            &[
                r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_01","name":"glob"}}"#,
                r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"pattern\":"}}"#,
                r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"\"*.c\"}"}}"#,
                r#"{"type":"content_block_stop","index":1}"#,
            ],
        );

        assert!(matches!(&events[0], StreamEvent::ToolCallStart { id, name, index }
            if id == "toolu_01" && name == "glob" && *index == 1));
        assert!(matches!(&events[1], StreamEvent::ToolCallDelta { arguments, .. }
            if arguments == "{\"pattern\":"));
        assert!(matches!(&events[3], StreamEvent::ToolCallDone { index } if *index == 1));
        // Accumulated arguments survive content_block_stop.
        assert_eq!(p.tool_args, "{\"pattern\":\"*.c\"}");
        assert_eq!(p.tool_id, "toolu_01");
    }

    #[test]
    fn text_block_stop_does_not_emit_tool_done() {
        let mut p = SseParser::new();
        let events = feed_events(
            &mut p,
            &[
                r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
                r#"{"type":"content_block_stop","index":0}"#,
            ],
        );
        assert!(events.is_empty());
    }

    // ── Thinking ──────────────────────────────────────────────────────────────

    #[test]
    fn thinking_deltas_accumulate_and_emit() {
        let mut p = SseParser::new();
        let events = feed_events(
            &mut p,
            &[
                r#"{"type":"content_block_start","index":0,"content_block":{"type":"thinking"}}"#,
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"step 1; "}}"#,
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"thinking_delta","thinking":"step 2"}}"#,
            ],
        );
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], StreamEvent::ThinkingDelta { text, .. } if text == "step 1; "));
        assert_eq!(p.thinking_text, "step 1; step 2");
    }

    #[test]
    fn signature_delta_is_stored_not_emitted() {
        let mut p = SseParser::new();
        let events = feed_events(
            &mut p,
            &[r#"{"type":"content_block_delta","index":0,"delta":{"type":"signature_delta","signature":"EqRk=="}}"#],
        );
        assert!(events.is_empty());
        assert_eq!(p.signature.as_deref(), Some("EqRk=="));
    }

    // ── Malformed input ───────────────────────────────────────────────────────

    #[test]
    fn invalid_json_yields_error_and_processing_continues() {
        let mut p = SseParser::new();
        let events = p.feed("data: {broken\ndata: {\"type\":\"message_stop\"}\n");
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], StreamEvent::Error { kind, message }
            if *kind == ErrorKind::Unknown && message == "Invalid JSON in SSE event"));
        assert!(matches!(events[1], StreamEvent::Done { .. }));
    }

    #[test]
    fn non_object_payload_yields_error() {
        let mut p = SseParser::new();
        let events = p.feed("data: [1,2,3]\n");
        assert!(matches!(&events[0], StreamEvent::Error { message, .. }
            if message == "SSE event data is not a JSON object"));
    }

    #[test]
    fn ping_and_unknown_events_are_ignored() {
        let mut p = SseParser::new();
        let events = feed_events(
            &mut p,
            &[r#"{"type":"ping"}"#, r#"{"type":"some_future_event"}"#],
        );
        assert!(events.is_empty());
    }

    // ── Error event mapping ───────────────────────────────────────────────────

    #[test]
    fn error_event_maps_known_types() {
        let cases = [
            ("authentication_error", ErrorKind::Auth),
            ("rate_limit_error", ErrorKind::RateLimit),
            ("overloaded_error", ErrorKind::Server),
            ("invalid_request_error", ErrorKind::InvalidArg),
            ("brand_new_error", ErrorKind::Unknown),
        ];
        for (error_type, expected) in cases {
            let mut p = SseParser::new();
            let payload = format!(
                r#"{{"type":"error","error":{{"type":"{error_type}","message":"nope"}}}}"#
            );
            let events = p.feed(&format!("data: {payload}\n"));
            assert!(matches!(&events[0], StreamEvent::Error { kind, message }
                if *kind == expected && message == "nope"));
        }
    }

    #[test]
    fn error_event_without_message_defaults() {
        let mut p = SseParser::new();
        let events = p.feed("data: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\"}}\n");
        assert!(matches!(&events[0], StreamEvent::Error { message, .. }
            if message == "Unknown error"));
    }

    #[test]
    fn error_event_with_missing_error_object_defaults() {
        let mut p = SseParser::new();
        let events = p.feed("data: {\"type\":\"error\"}\n");
        assert!(matches!(&events[0], StreamEvent::Error { kind, message }
            if *kind == ErrorKind::Unknown && message == "Unknown error"));
    }

    // ── Finish-reason mapping ─────────────────────────────────────────────────

    #[test]
    fn finish_reason_mapping_table() {
        assert_eq!(map_finish_reason(Some("end_turn")), FinishReason::Stop);
        assert_eq!(map_finish_reason(Some("max_tokens")), FinishReason::Length);
        assert_eq!(map_finish_reason(Some("tool_use")), FinishReason::ToolUse);
        assert_eq!(map_finish_reason(Some("stop_sequence")), FinishReason::Stop);
        assert_eq!(map_finish_reason(Some("refusal")), FinishReason::ContentFilter);
        assert_eq!(map_finish_reason(Some("anything_else")), FinishReason::Unknown);
        assert_eq!(map_finish_reason(None), FinishReason::Unknown);
    }

    #[test]
    fn finish_reason_mapping_is_idempotent_over_its_output() {
        for input in ["end_turn", "max_tokens", "tool_use", "refusal", "nope"] {
            let first = map_finish_reason(Some(input));
            // Mapping the canonical name of a mapped reason lands on a fixed point.
            let second = map_finish_reason(Some(first.as_str()));
            assert_eq!(map_finish_reason(Some(second.as_str())), second);
        }
    }
}
