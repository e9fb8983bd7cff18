// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;

use ikigai_db::{message, MessageKind};
use ikigai_model::Result;

/// Where the agent runtime appends its transcript.
///
/// The live implementation writes to the message log through the agent's own
/// database connection; tests capture entries in memory so persistence order
/// can be asserted without a server.
#[async_trait]
pub trait TranscriptStore: Send {
    async fn append(
        &mut self,
        agent_uuid: &str,
        kind: MessageKind,
        content: Option<&str>,
        data_json: Option<&str>,
    ) -> Result<i64>;
}

#[async_trait]
impl TranscriptStore for sqlx::PgConnection {
    async fn append(
        &mut self,
        agent_uuid: &str,
        kind: MessageKind,
        content: Option<&str>,
        data_json: Option<&str>,
    ) -> Result<i64> {
        message::insert(self, agent_uuid, kind, content, data_json).await
    }
}

/// One captured transcript entry.
#[derive(Debug, Clone)]
pub struct TranscriptEntry {
    pub agent_uuid: String,
    pub kind: MessageKind,
    pub content: Option<String>,
    pub data_json: Option<String>,
}

/// In-memory store with sequential ids.
#[derive(Default)]
pub struct MemoryTranscript {
    pub entries: Vec<TranscriptEntry>,
}

impl MemoryTranscript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn kinds(&self) -> Vec<MessageKind> {
        self.entries.iter().map(|e| e.kind).collect()
    }
}

#[async_trait]
impl TranscriptStore for MemoryTranscript {
    async fn append(
        &mut self,
        agent_uuid: &str,
        kind: MessageKind,
        content: Option<&str>,
        data_json: Option<&str>,
    ) -> Result<i64> {
        self.entries.push(TranscriptEntry {
            agent_uuid: agent_uuid.to_string(),
            kind,
            content: content.map(str::to_string),
            data_json: data_json.map(str::to_string),
        });
        Ok(self.entries.len() as i64)
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
