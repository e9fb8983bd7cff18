// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use async_trait::async_trait;
use sqlx::{PgConnection, Row};

use crate::{agent, agent::AgentRow, db_err};
use ikigai_model::Result;

/// A half-open id interval `(start_id, end_id]` scoped to one agent;
/// `end_id = 0` means "no upper bound".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayRange {
    pub agent_uuid: String,
    pub start_id: i64,
    pub end_id: i64,
}

/// One message of an assembled replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayMessage {
    pub id: i64,
    pub kind: String,
    pub content: Option<String>,
    pub data_json: Option<String>,
}

/// The two lookups the range walk needs.  Implemented for the live
/// connection; tests substitute an in-memory fixture.
#[async_trait]
pub trait ReplaySource: Send {
    /// `MAX(id)` over this agent's `clear` messages, bounded by `max_id`
    /// when it is positive; 0 when none exist.
    async fn find_clear(&mut self, agent_uuid: &str, max_id: i64) -> Result<i64>;

    async fn get_agent(&mut self, uuid: &str) -> Result<AgentRow>;
}

#[async_trait]
impl ReplaySource for PgConnection {
    async fn find_clear(&mut self, agent_uuid: &str, max_id: i64) -> Result<i64> {
        let row = sqlx::query(
            "SELECT MAX(id) FROM messages \
             WHERE agent_uuid = $1 AND kind = 'clear' AND ($2 = 0 OR id <= $2)",
        )
        .bind(agent_uuid)
        .bind(max_id)
        .fetch_one(&mut *self)
        .await
        .map_err(|e| db_err("failed to find clear", e))?;
        let max: Option<i64> = row
            .try_get(0)
            .map_err(|e| db_err("failed to parse clear id", e))?;
        Ok(max.unwrap_or(0))
    }

    async fn get_agent(&mut self, uuid: &str) -> Result<AgentRow> {
        agent::get(self, uuid).await
    }
}

/// Walk backwards from a leaf agent and assemble the chronological list of
/// replay ranges.
///
/// A `clear` terminates the walk without consulting ancestors; otherwise the
/// walk climbs through `parent_uuid`, bounding each parent's range at the
/// child's `fork_message_id`.  A fork id of 0 on a non-root agent is
/// honoured as "no upper bound", keeping the ranges contiguous.
pub async fn build_replay_ranges<S: ReplaySource>(
    source: &mut S,
    leaf_uuid: &str,
) -> Result<Vec<ReplayRange>> {
    let mut ranges = Vec::new();
    let mut current = leaf_uuid.to_string();
    let mut end_id = 0i64;

    loop {
        let clear_id = source.find_clear(&current, end_id).await?;
        if clear_id > 0 {
            ranges.push(ReplayRange { agent_uuid: current, start_id: clear_id, end_id });
            break;
        }

        ranges.push(ReplayRange { agent_uuid: current.clone(), start_id: 0, end_id });

        let row = source.get_agent(&current).await?;
        match row.parent_uuid {
            None => break,
            Some(parent) => {
                end_id = row.fork_message_id;
                current = parent;
            }
        }
    }

    ranges.reverse();
    Ok(ranges)
}

/// Fetch the messages of one range, ordered by creation time.
pub async fn query_range(
    conn: &mut PgConnection,
    range: &ReplayRange,
) -> Result<Vec<ReplayMessage>> {
    let rows = sqlx::query(
        "SELECT id, kind, content, data::text AS data_json FROM messages \
         WHERE agent_uuid = $1 AND id > $2 AND ($3 = 0 OR id <= $3) \
         ORDER BY created_at",
    )
    .bind(&range.agent_uuid)
    .bind(range.start_id)
    .bind(range.end_id)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| db_err("failed to query range", e))?;

    rows.iter()
        .map(|row| {
            let read = |e: sqlx::Error| db_err("failed to read message row", e);
            Ok(ReplayMessage {
                id: row.try_get("id").map_err(read)?,
                kind: row.try_get("kind").map_err(read)?,
                content: row.try_get("content").map_err(read)?,
                data_json: row.try_get("data_json").map_err(read)?,
            })
        })
        .collect()
}

/// Excise interrupted turns from an assembled replay.
///
/// An `interrupted` marker removes everything from the turn's opening `user`
/// message through the marker itself.  `last_user_idx` is reset only on
/// `user` messages, so a second interruption inside the same turn removes
/// both ranges.
pub fn filter_interrupted(messages: &mut Vec<ReplayMessage>) {
    let mut keep = vec![true; messages.len()];
    let mut last_user_idx = 0usize;

    for i in 0..messages.len() {
        match messages[i].kind.as_str() {
            "interrupted" => {
                for flag in keep.iter_mut().take(i + 1).skip(last_user_idx) {
                    *flag = false;
                }
            }
            "user" => last_user_idx = i,
            _ => {}
        }
    }

    let mut index = 0;
    messages.retain(|_| {
        let kept = keep[index];
        index += 1;
        kept
    });
}

/// Reconstruct an agent's effective conversation: build ranges, query each
/// in chronological order, then drop interrupted turns.
pub async fn replay_history(
    conn: &mut PgConnection,
    agent_uuid: &str,
) -> Result<Vec<ReplayMessage>> {
    let ranges = build_replay_ranges(conn, agent_uuid).await?;

    let mut messages = Vec::new();
    for range in &ranges {
        messages.extend(query_range(conn, range).await?);
    }

    filter_interrupted(&mut messages);
    Ok(messages)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
