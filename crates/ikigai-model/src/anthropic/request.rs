// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde_json::{json, Value};

use super::thinking::thinking_budget;
use crate::{ContentBlock, Error, Message, Request, Result, Role, ThinkingLevel, ToolChoice};

/// Serialise a [`Request`] into the Anthropic `/v1/messages` body.
///
/// A message holding exactly one text block is serialised as a plain string;
/// anything else becomes an array of typed content objects.  Tool results
/// are sent back under the `user` role, which is how the API models them.
pub(crate) fn serialize_request(req: &Request, stream: bool) -> Result<Value> {
    if req.model.is_empty() {
        return Err(Error::invalid_arg("model must not be empty"));
    }

    let max_tokens = match req.max_output_tokens {
        Some(n) if n > 0 => n,
        _ => 4096,
    };

    let mut body = json!({
        "model": req.model,
        "max_tokens": max_tokens,
        "messages": serialize_messages(&req.messages)?,
    });

    if let Some(system) = &req.system_prompt {
        body["system"] = json!(system);
    }

    if req.thinking_level != ThinkingLevel::None {
        // Silently skipped for models without thinking support; callers that
        // want a hard failure use validate_thinking up front.
        if let Some(budget) = thinking_budget(&req.model, req.thinking_level) {
            body["thinking"] = json!({ "type": "enabled", "budget_tokens": budget });
        }
    }

    if !req.tools.is_empty() {
        let tools: Vec<Value> = req
            .tools
            .iter()
            .map(|t| {
                json!({
                    "name": t.name,
                    "description": t.description,
                    "input_schema": t.parameters,
                })
            })
            .collect();
        body["tools"] = json!(tools);

        let choice = match req.tool_choice {
            ToolChoice::Auto => "auto",
            ToolChoice::None => "none",
            ToolChoice::Required => "any",
        };
        body["tool_choice"] = json!({ "type": choice });
    }

    if stream {
        body["stream"] = json!(true);
    }

    Ok(body)
}

fn serialize_messages(messages: &[Message]) -> Result<Vec<Value>> {
    messages
        .iter()
        .map(|m| {
            let role = match m.role {
                Role::User => "user",
                Role::Assistant => "assistant",
                // Tool results are sent as user messages in Anthropic.
                Role::Tool => "user",
            };
            let content = serialize_content(m)?;
            Ok(json!({ "role": role, "content": content }))
        })
        .collect()
}

fn serialize_content(message: &Message) -> Result<Value> {
    // Single text block uses the simple string format.
    if let Some(text) = message.as_text() {
        return Ok(json!(text));
    }

    let blocks: Vec<Value> = message
        .blocks
        .iter()
        .map(serialize_block)
        .collect::<Result<_>>()?;
    Ok(json!(blocks))
}

fn serialize_block(block: &ContentBlock) -> Result<Value> {
    match block {
        ContentBlock::Text { text } => Ok(json!({ "type": "text", "text": text })),
        ContentBlock::Thinking { text, signature } => {
            let mut obj = json!({ "type": "thinking", "thinking": text });
            if let Some(sig) = signature {
                obj["signature"] = json!(sig);
            }
            Ok(obj)
        }
        ContentBlock::RedactedThinking { data } => {
            Ok(json!({ "type": "redacted_thinking", "data": data }))
        }
        ContentBlock::ToolCall { id, name, arguments } => {
            // The accumulated arguments string is parsed back to a JSON value
            // and embedded under `input`.
            let input: Value = serde_json::from_str(arguments)
                .map_err(|e| Error::parse(format!("invalid tool arguments JSON: {e}")))?;
            Ok(json!({ "type": "tool_use", "id": id, "name": name, "input": input }))
        }
        ContentBlock::ToolResult { tool_call_id, content, is_error } => Ok(json!({
            "type": "tool_result",
            "tool_use_id": tool_call_id,
            "content": content,
            "is_error": is_error,
        })),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ToolDef;

    fn basic_request() -> Request {
        Request {
            model: "claude-sonnet-4-5".into(),
            messages: vec![Message::user("hello")],
            ..Request::default()
        }
    }

    #[test]
    fn single_text_block_serialises_as_plain_string() {
        let body = serialize_request(&basic_request(), false).unwrap();
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");
    }

    #[test]
    fn request_round_trips_single_block_content() {
        // A trivial echo parse of the serialised body must recover the text.
        let body = serialize_request(&basic_request(), false).unwrap();
        let echoed = body["messages"][0]["content"].as_str().unwrap();
        assert_eq!(echoed, "hello");
    }

    #[test]
    fn max_tokens_defaults_to_4096() {
        let body = serialize_request(&basic_request(), false).unwrap();
        assert_eq!(body["max_tokens"], 4096);
    }

    #[test]
    fn non_positive_max_tokens_falls_back_to_default() {
        let mut req = basic_request();
        req.max_output_tokens = Some(0);
        let body = serialize_request(&req, false).unwrap();
        assert_eq!(body["max_tokens"], 4096);
    }

    #[test]
    fn explicit_max_tokens_is_used() {
        let mut req = basic_request();
        req.max_output_tokens = Some(1000);
        let body = serialize_request(&req, false).unwrap();
        assert_eq!(body["max_tokens"], 1000);
    }

    #[test]
    fn system_prompt_omitted_when_absent() {
        let body = serialize_request(&basic_request(), false).unwrap();
        assert!(body.get("system").is_none());
    }

    #[test]
    fn system_prompt_included_when_present() {
        let mut req = basic_request();
        req.system_prompt = Some("be terse".into());
        let body = serialize_request(&req, false).unwrap();
        assert_eq!(body["system"], "be terse");
    }

    #[test]
    fn empty_model_is_invalid_arg() {
        let mut req = basic_request();
        req.model = String::new();
        let err = serialize_request(&req, false).unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::InvalidArg);
    }

    #[test]
    fn stream_flag_only_set_for_streaming() {
        let body = serialize_request(&basic_request(), false).unwrap();
        assert!(body.get("stream").is_none());
        let body = serialize_request(&basic_request(), true).unwrap();
        assert_eq!(body["stream"], true);
    }

    #[test]
    fn tool_role_maps_to_user() {
        let mut req = basic_request();
        req.messages.push(Message::tool_result("tc_1", "{}", false));
        let body = serialize_request(&req, false).unwrap();
        assert_eq!(body["messages"][1]["role"], "user");
        let block = &body["messages"][1]["content"][0];
        assert_eq!(block["type"], "tool_result");
        assert_eq!(block["tool_use_id"], "tc_1");
        assert_eq!(block["is_error"], false);
    }

    #[test]
    fn tool_call_arguments_embed_as_input_object() {
        let mut req = basic_request();
        req.messages.push(Message {
            role: Role::Assistant,
            blocks: vec![ContentBlock::ToolCall {
                id: "toolu_01".into(),
                name: "glob".into(),
                arguments: "{\"pattern\":\"*.c\"}".into(),
            }],
        });
        let body = serialize_request(&req, false).unwrap();
        let block = &body["messages"][1]["content"][0];
        assert_eq!(block["type"], "tool_use");
        assert_eq!(block["input"]["pattern"], "*.c");
    }

    #[test]
    fn invalid_tool_call_arguments_fail_to_serialise() {
        let mut req = basic_request();
        req.messages.push(Message {
            role: Role::Assistant,
            blocks: vec![ContentBlock::ToolCall {
                id: "toolu_01".into(),
                name: "glob".into(),
                arguments: "{not json".into(),
            }],
        });
        let err = serialize_request(&req, false).unwrap_err();
        assert_eq!(err.kind, crate::ErrorKind::Parse);
    }

    #[test]
    fn tools_and_tool_choice_included_together() {
        let mut req = basic_request();
        req.tools = vec![ToolDef {
            name: "bash".into(),
            description: "Execute a shell command".into(),
            parameters: json!({ "type": "object" }),
        }];
        let body = serialize_request(&req, false).unwrap();
        assert_eq!(body["tools"][0]["name"], "bash");
        assert_eq!(body["tools"][0]["input_schema"]["type"], "object");
        assert_eq!(body["tool_choice"]["type"], "auto");
    }

    #[test]
    fn tool_choice_required_maps_to_any() {
        let mut req = basic_request();
        req.tools = vec![ToolDef {
            name: "t".into(),
            description: "d".into(),
            parameters: json!({ "type": "object" }),
        }];
        req.tool_choice = ToolChoice::Required;
        let body = serialize_request(&req, false).unwrap();
        assert_eq!(body["tool_choice"]["type"], "any");
    }

    #[test]
    fn no_tools_means_no_tool_choice() {
        let body = serialize_request(&basic_request(), false).unwrap();
        assert!(body.get("tools").is_none());
        assert!(body.get("tool_choice").is_none());
    }

    #[test]
    fn thinking_included_for_claude_with_level() {
        let mut req = basic_request();
        req.thinking_level = ThinkingLevel::High;
        let body = serialize_request(&req, false).unwrap();
        assert_eq!(body["thinking"]["type"], "enabled");
        assert_eq!(body["thinking"]["budget_tokens"], 64000);
    }

    #[test]
    fn thinking_omitted_for_level_none() {
        let body = serialize_request(&basic_request(), false).unwrap();
        assert!(body.get("thinking").is_none());
    }

    #[test]
    fn thinking_omitted_for_unsupported_model() {
        let mut req = basic_request();
        req.model = "gpt-4o".into();
        req.thinking_level = ThinkingLevel::Med;
        let body = serialize_request(&req, false).unwrap();
        assert!(body.get("thinking").is_none());
    }

    #[test]
    fn thinking_block_with_signature_serialises_both_fields() {
        let mut req = basic_request();
        req.messages.push(Message {
            role: Role::Assistant,
            blocks: vec![ContentBlock::Thinking {
                text: "step 1".into(),
                signature: Some("sig==".into()),
            }],
        });
        let body = serialize_request(&req, false).unwrap();
        let block = &body["messages"][1]["content"][0];
        assert_eq!(block["type"], "thinking");
        assert_eq!(block["thinking"], "step 1");
        assert_eq!(block["signature"], "sig==");
    }
}
