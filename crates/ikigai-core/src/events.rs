// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0

/// Events emitted by an agent during a single turn.
/// The front-end subscribes to these to drive scrollback output.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A text chunk streamed from the model
    TextDelta(String),
    /// The complete text response (after streaming finishes)
    TextComplete(String),
    /// A thinking/reasoning chunk from the model
    ThinkingDelta(String),
    /// The complete thinking block accumulated over a turn
    ThinkingComplete(String),
    /// The model requested a tool call
    ToolCallStarted {
        id: String,
        name: String,
        arguments: String,
    },
    /// A tool call finished; `result_json` is the envelope persisted to the log
    ToolCallFinished {
        id: String,
        name: String,
        result_json: String,
    },
    /// A warning line for the scrollback (unresolved template variables,
    /// provider errors, …).  Never fails the turn by itself.
    Warning(String),
    /// Token usage reported by the provider at end of turn
    TokenUsage {
        input: i32,
        output: i32,
        thinking: i32,
        total: i32,
    },
    /// The turn was interrupted; state returned to idle
    Aborted,
    /// The agent finished processing the current user turn
    TurnComplete,
}
