// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod agent;
mod doc_cache;
mod events;
mod prompt;
mod template;
mod transcript;

pub use agent::{Agent, AgentState, PendingToolCall};
pub use doc_cache::DocCache;
pub use events::AgentEvent;
pub use prompt::{resolve_effective_system_prompt, DEFAULT_SYSTEM_PROMPT};
pub use template::{process_template, TemplateResult, TemplateVars};
pub use transcript::{MemoryTranscript, TranscriptEntry, TranscriptStore};
