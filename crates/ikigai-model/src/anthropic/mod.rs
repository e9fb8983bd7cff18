// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod request;
mod stream;
mod thinking;

pub use thinking::{supports_thinking, thinking_budget, validate_thinking};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::Value;
use tracing::debug;

use crate::provider::{EventStream, Provider};
use crate::{ContentBlock, Error, ErrorKind, Request, Response, Result, Usage};
use request::serialize_request;
use stream::{map_finish_reason, SseParser};

const ANTHROPIC_VERSION: &str = "2023-06-01";

pub struct AnthropicProvider {
    api_key: Option<String>,
    base_url: String,
    client: reqwest::Client,
    /// Flipped by `cancel()`, polled between stream chunks.  The only field
    /// shared with the cancellation path, by design of the cancel contract.
    cancelled: Arc<AtomicBool>,
}

impl AnthropicProvider {
    pub fn new(api_key: Option<String>, base_url: Option<String>) -> Self {
        Self {
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.anthropic.com".into()),
            client: reqwest::Client::new(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    async fn post(&self, body: &Value) -> Result<reqwest::Response> {
        let key = self
            .api_key
            .as_deref()
            .ok_or_else(|| Error::new(ErrorKind::Auth, "ANTHROPIC_API_KEY not set"))?;

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let text = resp.text().await.unwrap_or_default();
            return Err(parse_http_error(status, &text));
        }
        Ok(resp)
    }
}

#[async_trait]
impl Provider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    async fn start_request(&self, req: &Request) -> Result<Response> {
        let body = serialize_request(req, false)?;
        debug!(model = %req.model, "sending anthropic request");
        let resp = self.post(&body).await?;
        let text = resp.text().await?;
        parse_response(&text)
    }

    async fn start_stream(&self, req: &Request) -> Result<EventStream> {
        let body = serialize_request(req, true)?;
        debug!(model = %req.model, "starting anthropic stream");
        let resp = self.post(&body).await?;

        self.cancelled.store(false, Ordering::Relaxed);
        let cancelled = Arc::clone(&self.cancelled);

        let event_stream = resp
            .bytes_stream()
            .scan(SseParser::new(), move |parser, chunk| {
                // Cancellation ends the stream at the next chunk boundary.
                if cancelled.load(Ordering::Relaxed) {
                    return futures::future::ready(None);
                }
                let events: Vec<Result<crate::StreamEvent>> = match chunk {
                    Ok(bytes) => parser
                        .feed(&String::from_utf8_lossy(&bytes))
                        .into_iter()
                        .map(Ok)
                        .collect(),
                    Err(e) => vec![Err(Error::from(e))],
                };
                futures::future::ready(Some(events))
            })
            .flat_map(futures::stream::iter);

        Ok(Box::pin(event_stream))
    }

    fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }
}

/// Classify an HTTP status into an error kind.
fn classify_status(status: u16) -> ErrorKind {
    match status {
        400 => ErrorKind::InvalidArg,
        401 | 403 => ErrorKind::Auth,
        404 => ErrorKind::NotFound,
        429 => ErrorKind::RateLimit,
        500 | 502 | 503 | 529 => ErrorKind::Server,
        _ => ErrorKind::Unknown,
    }
}

/// Build an error from a non-2xx response.
///
/// When the body parses as `{error:{type,message}}` the human message is
/// `"<type>: <message>"`, falling back to the message alone, then the type
/// alone, then `"HTTP <status>"`.
fn parse_http_error(status: u16, body: &str) -> Error {
    let kind = classify_status(status);

    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            let error = v.get("error")?;
            let error_type = error["type"].as_str();
            let error_message = error["message"].as_str();
            match (error_type, error_message) {
                (Some(t), Some(m)) => Some(format!("{t}: {m}")),
                (None, Some(m)) => Some(m.to_string()),
                (Some(t), None) => Some(t.to_string()),
                (None, None) => None,
            }
        })
        .unwrap_or_else(|| format!("HTTP {status}"));

    Error::new(kind, message)
}

/// Parse a complete (non-streaming) `/v1/messages` response body.
fn parse_response(json: &str) -> Result<Response> {
    let root: Value = serde_json::from_str(json)
        .map_err(|_| Error::parse("Invalid JSON response"))?;
    if !root.is_object() {
        return Err(Error::parse("Response root is not an object"));
    }

    // A 200 body can still carry an error payload.
    if root["type"].as_str() == Some("error") {
        let message = root["error"]["message"].as_str().unwrap_or("Unknown error");
        return Err(Error::provider(format!("API error: {message}")));
    }

    let model = root["model"].as_str().unwrap_or("").to_string();
    let finish_reason = map_finish_reason(root["stop_reason"].as_str());
    let usage = parse_usage(&root["usage"]);

    let blocks = match root["content"].as_array() {
        Some(arr) => parse_content_blocks(arr)?,
        None => Vec::new(),
    };

    Ok(Response { model, finish_reason, usage, blocks })
}

fn parse_usage(usage: &Value) -> Usage {
    let mut out = Usage {
        input_tokens: usage["input_tokens"].as_i64().unwrap_or(0) as i32,
        output_tokens: usage["output_tokens"].as_i64().unwrap_or(0) as i32,
        thinking_tokens: usage["thinking_tokens"].as_i64().unwrap_or(0) as i32,
        cached_tokens: usage["cache_read_input_tokens"].as_i64().unwrap_or(0) as i32,
        total_tokens: 0,
    };
    out.total_tokens = out.input_tokens + out.output_tokens + out.thinking_tokens;
    out
}

fn parse_content_blocks(items: &[Value]) -> Result<Vec<ContentBlock>> {
    items
        .iter()
        .map(|item| {
            let block_type = item["type"]
                .as_str()
                .ok_or_else(|| Error::parse("Content block missing 'type' field"))?;
            match block_type {
                "text" => {
                    let text = item["text"]
                        .as_str()
                        .ok_or_else(|| Error::parse("Text block missing 'text' field"))?;
                    Ok(ContentBlock::Text { text: text.to_string() })
                }
                "thinking" => {
                    let text = item["thinking"]
                        .as_str()
                        .ok_or_else(|| Error::parse("Thinking block missing 'thinking' field"))?;
                    Ok(ContentBlock::Thinking {
                        text: text.to_string(),
                        signature: item["signature"].as_str().map(str::to_string),
                    })
                }
                "redacted_thinking" => Ok(ContentBlock::RedactedThinking {
                    data: item["data"].as_str().unwrap_or("").to_string(),
                }),
                "tool_use" => {
                    let id = item["id"]
                        .as_str()
                        .ok_or_else(|| Error::parse("Tool use block missing 'id' field"))?;
                    let name = item["name"]
                        .as_str()
                        .ok_or_else(|| Error::parse("Tool use block missing 'name' field"))?;
                    let input = item
                        .get("input")
                        .ok_or_else(|| Error::parse("Tool use block missing 'input' field"))?;
                    Ok(ContentBlock::ToolCall {
                        id: id.to_string(),
                        name: name.to_string(),
                        arguments: serde_json::to_string(input)?,
                    })
                }
                other => {
                    // Unknown types are preserved as text markers so parsing
                    // continues across future additions.
                    Ok(ContentBlock::Text {
                        text: format!("[unknown content type: {other}]"),
                    })
                }
            }
        })
        .collect()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FinishReason;

    // ── HTTP status classification ────────────────────────────────────────────

    #[test]
    fn status_classification_table() {
        assert_eq!(classify_status(400), ErrorKind::InvalidArg);
        assert_eq!(classify_status(401), ErrorKind::Auth);
        assert_eq!(classify_status(403), ErrorKind::Auth);
        assert_eq!(classify_status(404), ErrorKind::NotFound);
        assert_eq!(classify_status(429), ErrorKind::RateLimit);
        assert_eq!(classify_status(500), ErrorKind::Server);
        assert_eq!(classify_status(502), ErrorKind::Server);
        assert_eq!(classify_status(503), ErrorKind::Server);
        assert_eq!(classify_status(529), ErrorKind::Server);
        assert_eq!(classify_status(418), ErrorKind::Unknown);
    }

    #[test]
    fn http_error_message_prefers_type_and_message() {
        let err = parse_http_error(
            429,
            r#"{"error":{"type":"rate_limit_error","message":"Too many requests"}}"#,
        );
        assert_eq!(err.kind, ErrorKind::RateLimit);
        assert_eq!(err.message, "rate_limit_error: Too many requests");
    }

    #[test]
    fn http_error_falls_back_to_message_alone() {
        let err = parse_http_error(400, r#"{"error":{"message":"bad field"}}"#);
        assert_eq!(err.message, "bad field");
    }

    #[test]
    fn http_error_falls_back_to_type_alone() {
        let err = parse_http_error(401, r#"{"error":{"type":"authentication_error"}}"#);
        assert_eq!(err.message, "authentication_error");
    }

    #[test]
    fn http_error_falls_back_to_status_line() {
        let err = parse_http_error(503, "upstream exploded");
        assert_eq!(err.message, "HTTP 503");
        assert_eq!(err.kind, ErrorKind::Server);
    }

    // ── Response parsing ──────────────────────────────────────────────────────

    #[test]
    fn parses_text_response() {
        let body = r#"{
            "model": "claude-haiku-4-5",
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 5},
            "content": [{"type": "text", "text": "Hello!"}]
        }"#;
        let resp = parse_response(body).unwrap();
        assert_eq!(resp.model, "claude-haiku-4-5");
        assert_eq!(resp.finish_reason, FinishReason::Stop);
        assert_eq!(resp.usage.total_tokens, 17);
        assert_eq!(resp.blocks, vec![ContentBlock::text("Hello!")]);
    }

    #[test]
    fn parses_tool_use_response() {
        let body = r#"{
            "model": "claude-sonnet-4-5",
            "stop_reason": "tool_use",
            "usage": {"input_tokens": 1, "output_tokens": 1},
            "content": [
                {"type": "text", "text": "Searching."},
                {"type": "tool_use", "id": "toolu_01", "name": "glob",
                 "input": {"pattern": "*.c"}}
            ]
        }"#;
        let resp = parse_response(body).unwrap();
        assert_eq!(resp.finish_reason, FinishReason::ToolUse);
        match &resp.blocks[1] {
            ContentBlock::ToolCall { id, name, arguments } => {
                assert_eq!(id, "toolu_01");
                assert_eq!(name, "glob");
                let args: Value = serde_json::from_str(arguments).unwrap();
                assert_eq!(args["pattern"], "*.c");
            }
            other => panic!("expected tool call, got {other:?}"),
        }
    }

    #[test]
    fn preserves_redacted_thinking_data() {
        let body = r#"{
            "model": "m", "stop_reason": "end_turn", "usage": {},
            "content": [{"type": "redacted_thinking", "data": "opaque=="}]
        }"#;
        let resp = parse_response(body).unwrap();
        assert_eq!(
            resp.blocks,
            vec![ContentBlock::RedactedThinking { data: "opaque==".into() }]
        );
    }

    #[test]
    fn unknown_block_type_becomes_text_marker() {
        let body = r#"{
            "model": "m", "stop_reason": "end_turn", "usage": {},
            "content": [{"type": "holo_projection", "frames": 3}]
        }"#;
        let resp = parse_response(body).unwrap();
        assert_eq!(
            resp.blocks,
            vec![ContentBlock::text("[unknown content type: holo_projection]")]
        );
    }

    #[test]
    fn error_body_with_200_maps_to_provider_error() {
        let body = r#"{"type":"error","error":{"type":"overloaded_error","message":"busy"}}"#;
        let err = parse_response(body).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Provider);
        assert!(err.message.contains("busy"));
    }

    #[test]
    fn invalid_json_body_is_parse_error() {
        let err = parse_response("{nope").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
    }

    #[test]
    fn non_object_body_is_parse_error() {
        let err = parse_response("[1,2]").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Parse);
        assert!(err.message.contains("not an object"));
    }

    #[test]
    fn missing_usage_defaults_to_zero() {
        let body = r#"{"model":"m","stop_reason":null,"content":[]}"#;
        let resp = parse_response(body).unwrap();
        assert_eq!(resp.usage, Usage::default());
        assert_eq!(resp.finish_reason, FinishReason::Unknown);
    }

    // ── Cancellation flag ─────────────────────────────────────────────────────

    #[test]
    fn cancel_flips_the_atomic_flag() {
        let p = AnthropicProvider::new(Some("k".into()), None);
        assert!(!p.cancelled.load(Ordering::Relaxed));
        p.cancel();
        assert!(p.cancelled.load(Ordering::Relaxed));
    }
}
