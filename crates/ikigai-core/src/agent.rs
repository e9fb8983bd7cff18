// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;
use std::sync::Arc;

use futures::StreamExt;
use serde_json::json;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use ikigai_config::Config;
use ikigai_db::{AgentRow, MessageKind, ReplayMessage};
use ikigai_model::{
    generate_uuid, ContentBlock, Error, ErrorKind, FinishReason, Message, Provider, Request,
    Result, StreamEvent, ThinkingLevel, ToolDef, Usage,
};
use ikigai_tools::{add_limit_metadata, definitions, dispatch};

use crate::doc_cache::DocCache;
use crate::events::AgentEvent;
use crate::prompt::resolve_effective_system_prompt;
use crate::template::TemplateVars;
use crate::transcript::TranscriptStore;

/// The three runtime states of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Idle,
    WaitingForLlm,
    ExecutingTool,
}

/// A tool call accumulated from the stream, waiting for its worker.
#[derive(Debug, Clone)]
pub struct PendingToolCall {
    pub id: String,
    pub name: String,
    /// JSON-encoded argument object as streamed
    pub arguments: String,
}

/// How one provider round-trip ended.
enum TurnEnd {
    Finished {
        finish: FinishReason,
        text: String,
        thinking: String,
        tool: Option<PendingToolCall>,
        usage: Usage,
    },
    StreamError {
        kind: ErrorKind,
        message: String,
    },
    Interrupted,
}

/// A long-lived conversational agent: identity, provider configuration,
/// conversation, and tool-execution state.  All mutation happens on the REPL
/// task; tool workers run on blocking threads and hand their result back
/// through the join handle.
pub struct Agent {
    pub uuid: String,
    pub parent_uuid: Option<String>,
    pub name: Option<String>,
    pub created_at: i64,
    pub fork_message_id: i64,
    pub provider_name: String,
    pub model: String,
    pub thinking_level: ThinkingLevel,
    pub pinned_paths: Vec<String>,
    state: AgentState,
    conversation: Vec<Message>,
    doc_cache: DocCache,
    provider: Arc<dyn Provider>,
    config: Arc<Config>,
    data_dir: PathBuf,
    iteration_count: i32,
    pending_tool_call: Option<PendingToolCall>,
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("uuid", &self.uuid)
            .field("parent_uuid", &self.parent_uuid)
            .field("name", &self.name)
            .field("created_at", &self.created_at)
            .field("fork_message_id", &self.fork_message_id)
            .field("provider_name", &self.provider_name)
            .field("model", &self.model)
            .field("thinking_level", &self.thinking_level)
            .field("pinned_paths", &self.pinned_paths)
            .field("state", &self.state)
            .field("iteration_count", &self.iteration_count)
            .finish()
    }
}

impl Agent {
    /// Create a fresh agent.  `parent_uuid` and `fork_message_id` must agree:
    /// a root agent has neither, a forked agent has both.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        provider: Arc<dyn Provider>,
        config: Arc<Config>,
        data_dir: PathBuf,
        parent_uuid: Option<String>,
        fork_message_id: i64,
        model: String,
        thinking_level: ThinkingLevel,
    ) -> Result<Self> {
        if parent_uuid.is_none() != (fork_message_id == 0) {
            return Err(Error::invalid_arg(
                "parent_uuid and fork_message_id must both be set or both be absent",
            ));
        }
        let provider_name = provider.name().to_string();
        Ok(Self {
            uuid: generate_uuid(),
            parent_uuid,
            name: None,
            created_at: chrono::Utc::now().timestamp(),
            fork_message_id,
            provider_name,
            model,
            thinking_level,
            pinned_paths: Vec::new(),
            state: AgentState::Idle,
            conversation: Vec::new(),
            doc_cache: DocCache::new(&data_dir),
            provider,
            config,
            data_dir,
            iteration_count: 0,
            pending_tool_call: None,
        })
    }

    /// Rebuild an agent from its registry row after a restart.
    pub fn restore(
        row: &AgentRow,
        provider: Arc<dyn Provider>,
        config: Arc<Config>,
        data_dir: PathBuf,
    ) -> Self {
        let provider_name = provider.name().to_string();
        Self {
            uuid: row.uuid.clone(),
            parent_uuid: row.parent_uuid.clone(),
            name: row.name.clone(),
            created_at: row.created_at,
            fork_message_id: row.fork_message_id,
            provider_name,
            model: row.model.clone().unwrap_or_default(),
            thinking_level: row
                .thinking_level
                .as_deref()
                .and_then(ThinkingLevel::parse)
                .unwrap_or_default(),
            pinned_paths: Vec::new(),
            state: AgentState::Idle,
            conversation: Vec::new(),
            doc_cache: DocCache::new(&data_dir),
            provider,
            config,
            data_dir,
            iteration_count: 0,
            pending_tool_call: None,
        }
    }

    /// Branch a child agent at `fork_message_id` in this agent's stream.
    ///
    /// The child starts from a copy of the parent's effective conversation
    /// and pins; its own messages append after the branch point.
    pub fn fork(&self, fork_message_id: i64) -> Result<Agent> {
        let mut child = Agent::create(
            Arc::clone(&self.provider),
            Arc::clone(&self.config),
            self.data_dir.clone(),
            Some(self.uuid.clone()),
            fork_message_id,
            self.model.clone(),
            self.thinking_level,
        )?;
        child.conversation = self.conversation.clone();
        child.pinned_paths = self.pinned_paths.clone();
        Ok(child)
    }

    /// Registry row for persisting this agent.
    pub fn registry_row(&self, session_id: i64) -> AgentRow {
        AgentRow {
            uuid: self.uuid.clone(),
            parent_uuid: self.parent_uuid.clone(),
            name: self.name.clone(),
            session_id: Some(session_id),
            status: "running".into(),
            idle: false,
            provider: Some(self.provider_name.clone()),
            model: Some(self.model.clone()),
            thinking_level: Some(self.thinking_level.as_str().to_string()),
            created_at: self.created_at,
            ended_at: 0,
            fork_message_id: self.fork_message_id,
        }
    }

    pub fn state(&self) -> AgentState {
        self.state
    }

    pub fn iteration_count(&self) -> i32 {
        self.iteration_count
    }

    pub fn conversation(&self) -> &[Message] {
        &self.conversation
    }

    pub fn doc_cache_mut(&mut self) -> &mut DocCache {
        &mut self.doc_cache
    }

    /// Load a filtered replay into the in-memory conversation.
    ///
    /// Thinking rows are display-only and are not replayed to the provider;
    /// clear and interrupted markers never survive the replay filter.
    pub fn load_history(&mut self, replay: &[ReplayMessage]) {
        self.conversation.clear();
        for row in replay {
            match row.kind.as_str() {
                "user" => {
                    let text = row.content.clone().unwrap_or_default();
                    self.conversation.push(Message::user(text));
                }
                "assistant" => {
                    let text = row.content.clone().unwrap_or_default();
                    self.conversation.push(Message::assistant(text));
                }
                "tool_call" => {
                    let Some(data) = row
                        .data_json
                        .as_deref()
                        .and_then(|d| serde_json::from_str::<serde_json::Value>(d).ok())
                    else {
                        continue;
                    };
                    let id = data["id"].as_str().unwrap_or("").to_string();
                    let name = data["name"].as_str().unwrap_or("").to_string();
                    let arguments = data["arguments"].as_str().unwrap_or("{}").to_string();
                    if name.is_empty() {
                        continue;
                    }
                    self.conversation.push(Message {
                        role: ikigai_model::Role::Assistant,
                        blocks: vec![ContentBlock::ToolCall { id, name, arguments }],
                    });
                }
                "tool_result" => {
                    let data = row
                        .data_json
                        .as_deref()
                        .and_then(|d| serde_json::from_str::<serde_json::Value>(d).ok());
                    let id = data
                        .as_ref()
                        .and_then(|d| d["tool_call_id"].as_str())
                        .unwrap_or("")
                        .to_string();
                    let content = row.content.clone().unwrap_or_default();
                    self.conversation.push(Message::tool_result(id, content, false));
                }
                _ => {}
            }
        }
    }

    /// Append a `clear` marker and drop the in-memory conversation.  Replay
    /// after this point starts from the marker.
    pub async fn clear<S: TranscriptStore>(&mut self, store: &mut S) -> Result<()> {
        store
            .append(&self.uuid, MessageKind::Clear, None, None)
            .await?;
        self.conversation.clear();
        Ok(())
    }

    /// Drive one user turn: IDLE → WAITING_FOR_LLM → (EXECUTING_TOOL →
    /// WAITING_FOR_LLM)* → IDLE, persisting every transition's message.
    ///
    /// `cancel` resolves when the user requests an interrupt; a dropped
    /// sender counts as a cancellation too.
    pub async fn submit<S: TranscriptStore>(
        &mut self,
        input: &str,
        store: &mut S,
        tx: &mpsc::Sender<AgentEvent>,
        mut cancel: oneshot::Receiver<()>,
    ) -> Result<()> {
        if self.state != AgentState::Idle {
            return Err(Error::invalid_arg("agent is not idle"));
        }

        store
            .append(&self.uuid, MessageKind::User, Some(input), None)
            .await?;
        self.conversation.push(Message::user(input));
        self.state = AgentState::WaitingForLlm;

        loop {
            let turn = self.stream_one_turn(tx, &mut cancel).await?;

            match turn {
                TurnEnd::Interrupted => {
                    self.provider.cancel();
                    store
                        .append(&self.uuid, MessageKind::Interrupted, None, None)
                        .await?;
                    self.to_idle();
                    let _ = tx.send(AgentEvent::Aborted).await;
                    return Ok(());
                }

                TurnEnd::StreamError { kind, message } => {
                    warn!(kind = %kind, message = %message, "provider turn failed");
                    let warning = format!("{kind}: {message}");
                    let data = json!({ "kind": kind.as_str(), "error": message }).to_string();
                    store
                        .append(&self.uuid, MessageKind::Interrupted, None, Some(&data))
                        .await?;
                    self.to_idle();
                    let _ = tx.send(AgentEvent::Warning(warning)).await;
                    let _ = tx.send(AgentEvent::Aborted).await;
                    return Ok(());
                }

                TurnEnd::Finished { finish, text, thinking, tool, usage } => {
                    if !thinking.is_empty() {
                        let _ = tx.send(AgentEvent::ThinkingComplete(thinking.clone())).await;
                        store
                            .append(&self.uuid, MessageKind::Thinking, Some(&thinking), None)
                            .await?;
                    }
                    let _ = tx
                        .send(AgentEvent::TokenUsage {
                            input: usage.input_tokens,
                            output: usage.output_tokens,
                            thinking: usage.thinking_tokens,
                            total: usage.total_tokens,
                        })
                        .await;

                    // Continuation predicate: another tool cycle only for a
                    // tool_use finish with an accumulated call and budget
                    // left.  A request arriving exactly at the budget is
                    // still dispatched — annotated — so the model sees the
                    // limit and produces a terminal message; anything past
                    // that ends the turn.
                    match tool {
                        Some(tool)
                            if finish == FinishReason::ToolUse
                                && self.iteration_count <= self.config.max_tool_turns =>
                        {
                            match self.run_tool_cycle(tool, text, store, tx, &mut cancel).await? {
                                ToolCycle::Continue => continue,
                                ToolCycle::Interrupted => {
                                    store
                                        .append(&self.uuid, MessageKind::Interrupted, None, None)
                                        .await?;
                                    self.to_idle();
                                    let _ = tx.send(AgentEvent::Aborted).await;
                                    return Ok(());
                                }
                            }
                        }
                        _ => {
                            if !text.is_empty() {
                                let _ = tx.send(AgentEvent::TextComplete(text.clone())).await;
                                self.conversation.push(Message::assistant(&text));
                            }
                            let data = json!({
                                "finish_reason": finish.as_str(),
                                "usage": {
                                    "input": usage.input_tokens,
                                    "output": usage.output_tokens,
                                    "thinking": usage.thinking_tokens,
                                    "total": usage.total_tokens,
                                },
                            })
                            .to_string();
                            store
                                .append(&self.uuid, MessageKind::Assistant, Some(&text), Some(&data))
                                .await?;
                            self.to_idle();
                            let _ = tx.send(AgentEvent::TurnComplete).await;
                            return Ok(());
                        }
                    }
                }
            }
        }
    }

    /// One provider round-trip: resolve the prompt, start the stream, and
    /// accumulate deltas until a terminal event, error, or interrupt.
    async fn stream_one_turn(
        &mut self,
        tx: &mpsc::Sender<AgentEvent>,
        cancel: &mut oneshot::Receiver<()>,
    ) -> Result<TurnEnd> {
        let request = match self.build_request(tx).await {
            Ok(req) => req,
            Err(e) => return Ok(TurnEnd::StreamError { kind: e.kind, message: e.message }),
        };

        let stream = tokio::select! {
            biased;
            _ = &mut *cancel => return Ok(TurnEnd::Interrupted),
            result = self.provider.start_stream(&request) => result,
        };
        let mut stream = match stream {
            Ok(s) => s,
            Err(e) => return Ok(TurnEnd::StreamError { kind: e.kind, message: e.message }),
        };

        let mut text = String::new();
        let mut thinking = String::new();
        let mut tool: Option<PendingToolCall> = None;
        let mut usage = Usage::default();

        loop {
            let item = tokio::select! {
                biased;
                _ = &mut *cancel => return Ok(TurnEnd::Interrupted),
                item = stream.next() => item,
            };

            let event = match item {
                None => {
                    return Ok(TurnEnd::StreamError {
                        kind: ErrorKind::Provider,
                        message: "stream ended without a terminal event".into(),
                    })
                }
                Some(Err(e)) => {
                    return Ok(TurnEnd::StreamError { kind: e.kind, message: e.message })
                }
                Some(Ok(event)) => event,
            };

            match event {
                StreamEvent::Start { model } => {
                    debug!(model = %model, "stream started");
                }
                StreamEvent::TextDelta { text: delta, .. } => {
                    text.push_str(&delta);
                    let _ = tx.send(AgentEvent::TextDelta(delta)).await;
                }
                StreamEvent::ThinkingDelta { text: delta, .. } => {
                    thinking.push_str(&delta);
                    let _ = tx.send(AgentEvent::ThinkingDelta(delta)).await;
                }
                StreamEvent::ToolCallStart { id, name, .. } => {
                    tool = Some(PendingToolCall { id, name, arguments: String::new() });
                }
                StreamEvent::ToolCallDelta { arguments, .. } => {
                    if let Some(tool) = tool.as_mut() {
                        tool.arguments.push_str(&arguments);
                    }
                }
                StreamEvent::ToolCallDone { .. } => {}
                StreamEvent::Done { finish_reason, usage: final_usage } => {
                    usage = final_usage;
                    return Ok(TurnEnd::Finished { finish: finish_reason, text, thinking, tool, usage });
                }
                StreamEvent::Error { kind, message } => {
                    return Ok(TurnEnd::StreamError { kind, message });
                }
            }
        }
    }

    /// Execute one pending tool call on a worker thread and record the
    /// result.  WAITING_FOR_LLM → EXECUTING_TOOL → WAITING_FOR_LLM.
    async fn run_tool_cycle<S: TranscriptStore>(
        &mut self,
        tool: PendingToolCall,
        turn_text: String,
        store: &mut S,
        tx: &mpsc::Sender<AgentEvent>,
        cancel: &mut oneshot::Receiver<()>,
    ) -> Result<ToolCycle> {
        // The assistant turn that carried the call goes into the
        // conversation so the next request round-trips it.
        let mut blocks = Vec::new();
        if !turn_text.is_empty() {
            blocks.push(ContentBlock::text(&turn_text));
        }
        blocks.push(ContentBlock::ToolCall {
            id: tool.id.clone(),
            name: tool.name.clone(),
            arguments: tool.arguments.clone(),
        });
        self.conversation.push(Message { role: ikigai_model::Role::Assistant, blocks });

        let summary = format!("{}({})", tool.name, tool.arguments);
        let call_data = json!({
            "id": tool.id,
            "name": tool.name,
            "arguments": tool.arguments,
        })
        .to_string();
        store
            .append(&self.uuid, MessageKind::ToolCall, Some(&summary), Some(&call_data))
            .await?;
        let _ = tx
            .send(AgentEvent::ToolCallStarted {
                id: tool.id.clone(),
                name: tool.name.clone(),
                arguments: tool.arguments.clone(),
            })
            .await;

        self.pending_tool_call = Some(tool.clone());
        self.state = AgentState::ExecutingTool;

        let name = tool.name.clone();
        let arguments = tool.arguments.clone();
        let max_output_size = self.config.max_output_size.max(0) as usize;
        let mut handle = tokio::task::spawn_blocking(move || {
            dispatch(&name, Some(&arguments), max_output_size)
        });

        let result = tokio::select! {
            biased;
            _ = &mut *cancel => {
                // Interrupt latched: there is no forceful termination, so
                // wait for the worker and discard whatever it produced.
                let _ = (&mut handle).await;
                return Ok(ToolCycle::Interrupted);
            }
            result = &mut handle => result,
        };

        let mut result_json = match result {
            Ok(json) => json,
            Err(e) => {
                warn!(tool = %tool.name, "tool worker panicked: {e}");
                json!({ "error": format!("tool execution panicked: {e}") }).to_string()
            }
        };

        self.iteration_count += 1;
        if self.iteration_count >= self.config.max_tool_turns {
            if let Some(annotated) = add_limit_metadata(&result_json, self.config.max_tool_turns) {
                result_json = annotated;
            }
        }

        self.conversation.push(Message::tool_result(&tool.id, &result_json, false));
        let result_data = json!({ "tool_call_id": tool.id, "result": result_json }).to_string();
        store
            .append(&self.uuid, MessageKind::ToolResult, Some(&result_json), Some(&result_data))
            .await?;
        let _ = tx
            .send(AgentEvent::ToolCallFinished {
                id: tool.id.clone(),
                name: tool.name.clone(),
                result_json,
            })
            .await;

        self.pending_tool_call = None;
        self.state = AgentState::WaitingForLlm;
        Ok(ToolCycle::Continue)
    }

    async fn build_request(&mut self, tx: &mpsc::Sender<AgentEvent>) -> Result<Request> {
        let vars = TemplateVars {
            agent_uuid: &self.uuid,
            agent_name: self.name.as_deref(),
            agent_provider: &self.provider_name,
            agent_model: &self.model,
            agent_created_at: self.created_at,
            config: &self.config,
        };
        let (system_prompt, warnings) = resolve_effective_system_prompt(
            &self.pinned_paths,
            &mut self.doc_cache,
            &self.data_dir,
            &vars,
        )?;
        for warning in warnings {
            let _ = tx.send(AgentEvent::Warning(warning)).await;
        }

        let tools: Vec<ToolDef> = definitions()
            .into_iter()
            .map(|spec| ToolDef {
                name: spec.name.to_string(),
                description: spec.description.to_string(),
                parameters: spec.parameters,
            })
            .collect();

        Ok(Request {
            model: self.model.clone(),
            messages: self.conversation.clone(),
            system_prompt: Some(system_prompt),
            tools,
            tool_choice: Default::default(),
            max_output_tokens: Some(self.config.openai_max_completion_tokens),
            thinking_level: self.thinking_level,
        })
    }

    fn to_idle(&mut self) {
        self.state = AgentState::Idle;
        self.pending_tool_call = None;
        self.iteration_count = 0;
    }
}

enum ToolCycle {
    Continue,
    Interrupted,
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
