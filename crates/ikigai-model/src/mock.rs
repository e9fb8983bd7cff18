// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::stream;

use crate::provider::{EventStream, Provider};
use crate::{
    ContentBlock, Error, ErrorKind, FinishReason, Request, Response, Result, StreamEvent, Usage,
};

/// A pre-scripted provider.  Each `start_stream` call pops the next event
/// script from the front of the queue, letting tests specify exact event
/// sequences — including tool calls — without network access.
pub struct ScriptedProvider {
    scripts: Arc<Mutex<Vec<Vec<StreamEvent>>>>,
    /// The last [`Request`] seen, so tests can inspect what was sent.
    pub last_request: Arc<Mutex<Option<Request>>>,
}

impl ScriptedProvider {
    /// The outer `Vec` is the ordered list of calls; the inner `Vec` is the
    /// event sequence emitted for that call.
    pub fn new(scripts: Vec<Vec<StreamEvent>>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts)),
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Convenience: a provider that answers every call with a single text
    /// reply and a stop finish.
    pub fn always_text(reply: impl Into<String>) -> Self {
        Self::new(vec![text_script(reply.into())])
    }

    /// Convenience: one tool-call round followed by a text reply.
    pub fn tool_then_text(
        tool_id: impl Into<String>,
        tool_name: impl Into<String>,
        args_json: impl Into<String>,
        final_text: impl Into<String>,
    ) -> Self {
        Self::new(vec![
            tool_call_script(tool_id.into(), tool_name.into(), args_json.into()),
            text_script(final_text.into()),
        ])
    }
}

/// Script fragment: a complete text turn ending in `Done{Stop}`.
pub fn text_script(text: String) -> Vec<StreamEvent> {
    vec![
        StreamEvent::Start { model: "scripted-model".into() },
        StreamEvent::TextDelta { text, index: 0 },
        StreamEvent::Done {
            finish_reason: FinishReason::Stop,
            usage: Usage { input_tokens: 5, output_tokens: 5, total_tokens: 10, ..Usage::default() },
        },
    ]
}

/// Script fragment: a complete tool-use turn ending in `Done{ToolUse}`.
pub fn tool_call_script(id: String, name: String, args_json: String) -> Vec<StreamEvent> {
    vec![
        StreamEvent::Start { model: "scripted-model".into() },
        StreamEvent::ToolCallStart { id, name, index: 0 },
        StreamEvent::ToolCallDelta { arguments: args_json, index: 0 },
        StreamEvent::ToolCallDone { index: 0 },
        StreamEvent::Done {
            finish_reason: FinishReason::ToolUse,
            usage: Usage { input_tokens: 5, output_tokens: 5, total_tokens: 10, ..Usage::default() },
        },
    ]
}

#[async_trait]
impl Provider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn start_request(&self, req: &Request) -> Result<Response> {
        *self.last_request.lock().unwrap() = Some(req.clone());
        Ok(Response {
            model: "scripted-model".into(),
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
            blocks: vec![ContentBlock::text("[scripted]")],
        })
    }

    async fn start_stream(&self, req: &Request) -> Result<EventStream> {
        *self.last_request.lock().unwrap() = Some(req.clone());
        let events = {
            let mut scripts = self.scripts.lock().unwrap();
            if scripts.is_empty() {
                return Err(Error::new(ErrorKind::Provider, "no more scripts"));
            }
            scripts.remove(0)
        };
        let wrapped: Vec<Result<StreamEvent>> = events.into_iter().map(Ok).collect();
        Ok(Box::pin(stream::iter(wrapped)))
    }

    fn cancel(&self) {}
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
