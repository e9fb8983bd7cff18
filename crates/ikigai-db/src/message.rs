// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use sqlx::{PgConnection, Row};

use crate::db_err;
use ikigai_model::Result;

/// Message kinds recorded in the append-only log.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    User,
    Assistant,
    ToolCall,
    ToolResult,
    Thinking,
    Clear,
    Interrupted,
}

impl MessageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageKind::User => "user",
            MessageKind::Assistant => "assistant",
            MessageKind::ToolCall => "tool_call",
            MessageKind::ToolResult => "tool_result",
            MessageKind::Thinking => "thinking",
            MessageKind::Clear => "clear",
            MessageKind::Interrupted => "interrupted",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(MessageKind::User),
            "assistant" => Some(MessageKind::Assistant),
            "tool_call" => Some(MessageKind::ToolCall),
            "tool_result" => Some(MessageKind::ToolResult),
            "thinking" => Some(MessageKind::Thinking),
            "clear" => Some(MessageKind::Clear),
            "interrupted" => Some(MessageKind::Interrupted),
            _ => None,
        }
    }
}

/// One persisted message.  `content` is the human-readable summary rendered
/// to scrollback; `data_json` is the opaque document event renderers use.
#[derive(Debug, Clone)]
pub struct MessageRow {
    pub id: i64,
    pub agent_uuid: String,
    pub kind: String,
    pub content: Option<String>,
    pub data_json: Option<String>,
}

/// Append a message and return its assigned id.  Rows are never updated or
/// deleted; ids are totally ordered per agent.
pub async fn insert(
    conn: &mut PgConnection,
    agent_uuid: &str,
    kind: MessageKind,
    content: Option<&str>,
    data_json: Option<&str>,
) -> Result<i64> {
    let row = sqlx::query(
        "INSERT INTO messages (agent_uuid, kind, content, data) \
         VALUES ($1, $2, $3, $4::jsonb) RETURNING id",
    )
    .bind(agent_uuid)
    .bind(kind.as_str())
    .bind(content)
    .bind(data_json)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| db_err("failed to insert message", e))?;
    row.try_get(0).map_err(|e| db_err("failed to read message id", e))
}

/// Highest message id recorded for an agent, 0 when none exist.
/// Forks use this as the branch point into the parent's stream.
pub async fn last_id(conn: &mut PgConnection, agent_uuid: &str) -> Result<i64> {
    let row = sqlx::query("SELECT MAX(id) FROM messages WHERE agent_uuid = $1")
        .bind(agent_uuid)
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| db_err("failed to find last message id", e))?;
    let max: Option<i64> = row
        .try_get(0)
        .map_err(|e| db_err("failed to read last message id", e))?;
    Ok(max.unwrap_or(0))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
