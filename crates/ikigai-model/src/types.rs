// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

// ─── Content blocks ───────────────────────────────────────────────────────────

/// One element of a message body.
///
/// The JSON `type` discriminator drives the parser branch; serialisation is
/// the symmetric match.  Tool-call arguments are carried as the raw JSON
/// string accumulated from the stream, re-parsed only at the wire boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },
    RedactedThinking {
        data: String,
    },
    ToolCall {
        id: String,
        name: String,
        /// JSON-encoded argument object
        arguments: String,
    },
    ToolResult {
        tool_call_id: String,
        content: String,
        is_error: bool,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }
}

// ─── Messages ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    Tool,
}

/// A single wire-level message: a role plus an ordered block sequence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub blocks: Vec<ContentBlock>,
}

impl Message {
    pub fn user(text: impl Into<String>) -> Self {
        Self { role: Role::User, blocks: vec![ContentBlock::text(text)] }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self { role: Role::Assistant, blocks: vec![ContentBlock::text(text)] }
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        content: impl Into<String>,
        is_error: bool,
    ) -> Self {
        Self {
            role: Role::Tool,
            blocks: vec![ContentBlock::ToolResult {
                tool_call_id: tool_call_id.into(),
                content: content.into(),
                is_error,
            }],
        }
    }

    /// Return the plain text when the message is exactly one text block.
    pub fn as_text(&self) -> Option<&str> {
        match self.blocks.as_slice() {
            [ContentBlock::Text { text }] => Some(text),
            _ => None,
        }
    }
}

// ─── Requests ─────────────────────────────────────────────────────────────────

/// Provider-agnostic thinking effort, mapped to provider-specific token
/// budgets by each adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThinkingLevel {
    #[default]
    None,
    Low,
    Med,
    High,
}

impl ThinkingLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThinkingLevel::None => "none",
            ThinkingLevel::Low => "low",
            ThinkingLevel::Med => "med",
            ThinkingLevel::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(ThinkingLevel::None),
            "low" => Some(ThinkingLevel::Low),
            "med" => Some(ThinkingLevel::Med),
            "high" => Some(ThinkingLevel::High),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolChoice {
    #[default]
    Auto,
    None,
    Required,
}

/// A tool definition sent with the request.
#[derive(Debug, Clone)]
pub struct ToolDef {
    pub name: String,
    pub description: String,
    /// JSON Schema of the parameters object
    pub parameters: serde_json::Value,
}

/// Request sent to a model provider.
#[derive(Debug, Clone, Default)]
pub struct Request {
    pub model: String,
    pub messages: Vec<Message>,
    pub system_prompt: Option<String>,
    pub tools: Vec<ToolDef>,
    pub tool_choice: ToolChoice,
    pub max_output_tokens: Option<i32>,
    pub thinking_level: ThinkingLevel,
}

// ─── Responses ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ToolUse,
    ContentFilter,
    Unknown,
}

impl FinishReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::ToolUse => "tool_use",
            FinishReason::ContentFilter => "content_filter",
            FinishReason::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub input_tokens: i32,
    pub output_tokens: i32,
    pub thinking_tokens: i32,
    pub cached_tokens: i32,
    pub total_tokens: i32,
}

/// A complete (non-streaming) model response.
#[derive(Debug, Clone)]
pub struct Response {
    pub model: String,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    pub blocks: Vec<ContentBlock>,
}

// ─── Stream events ────────────────────────────────────────────────────────────

/// Normalised events produced by a streaming adapter, consumed by the agent
/// runtime in the order they arrive.
#[derive(Debug, Clone)]
pub enum StreamEvent {
    Start { model: String },
    TextDelta { text: String, index: i32 },
    ThinkingDelta { text: String, index: i32 },
    ToolCallStart { id: String, name: String, index: i32 },
    ToolCallDelta { arguments: String, index: i32 },
    ToolCallDone { index: i32 },
    Done { finish_reason: FinishReason, usage: Usage },
    Error { kind: ErrorKind, message: String },
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Message construction ──────────────────────────────────────────────────

    #[test]
    fn message_user_sets_role_and_text() {
        let m = Message::user("hello");
        assert_eq!(m.role, Role::User);
        assert_eq!(m.as_text(), Some("hello"));
    }

    #[test]
    fn message_assistant_sets_role_and_text() {
        let m = Message::assistant("reply");
        assert_eq!(m.role, Role::Assistant);
        assert_eq!(m.as_text(), Some("reply"));
    }

    #[test]
    fn message_tool_result_has_no_plain_text() {
        let m = Message::tool_result("tc_1", "{\"success\":true}", false);
        assert_eq!(m.role, Role::Tool);
        assert!(m.as_text().is_none());
        match &m.blocks[0] {
            ContentBlock::ToolResult { tool_call_id, content, is_error } => {
                assert_eq!(tool_call_id, "tc_1");
                assert_eq!(content, "{\"success\":true}");
                assert!(!is_error);
            }
            _ => panic!("wrong block variant"),
        }
    }

    #[test]
    fn as_text_is_none_for_multi_block_messages() {
        let m = Message {
            role: Role::Assistant,
            blocks: vec![ContentBlock::text("a"), ContentBlock::text("b")],
        };
        assert!(m.as_text().is_none());
    }

    // ── Serialisation ─────────────────────────────────────────────────────────

    #[test]
    fn content_block_round_trips_through_json() {
        let b = ContentBlock::ToolCall {
            id: "toolu_01".into(),
            name: "glob".into(),
            arguments: "{\"pattern\":\"*.rs\"}".into(),
        };
        let json = serde_json::to_string(&b).unwrap();
        assert!(json.contains("\"type\":\"tool_call\""));
        let back: ContentBlock = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn thinking_block_omits_absent_signature() {
        let b = ContentBlock::Thinking { text: "hm".into(), signature: None };
        let json = serde_json::to_string(&b).unwrap();
        assert!(!json.contains("signature"));
    }

    // ── Thinking level ────────────────────────────────────────────────────────

    #[test]
    fn thinking_level_round_trips_through_strings() {
        for level in [
            ThinkingLevel::None,
            ThinkingLevel::Low,
            ThinkingLevel::Med,
            ThinkingLevel::High,
        ] {
            assert_eq!(ThinkingLevel::parse(level.as_str()), Some(level));
        }
    }

    #[test]
    fn thinking_level_rejects_unknown_strings() {
        assert_eq!(ThinkingLevel::parse("maximum"), None);
    }
}
