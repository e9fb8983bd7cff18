// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use sqlx::postgres::PgRow;
use sqlx::{PgConnection, Row};

use crate::db_err;
use ikigai_model::{generate_uuid, Error, ErrorKind, Result};

/// One row of the agent registry.
#[derive(Debug, Clone)]
pub struct AgentRow {
    pub uuid: String,
    pub parent_uuid: Option<String>,
    pub name: Option<String>,
    pub session_id: Option<i64>,
    pub status: String,
    pub idle: bool,
    pub provider: Option<String>,
    pub model: Option<String>,
    pub thinking_level: Option<String>,
    pub created_at: i64,
    pub ended_at: i64,
    pub fork_message_id: i64,
}

const AGENT_COLUMNS: &str =
    "uuid, parent_uuid, name, session_id, status, idle, provider, model, \
     thinking_level, created_at, COALESCE(ended_at, 0) AS ended_at, fork_message_id";

fn row_to_agent(row: &PgRow) -> Result<AgentRow> {
    let read = |e: sqlx::Error| db_err("failed to read agent row", e);
    Ok(AgentRow {
        uuid: row.try_get("uuid").map_err(read)?,
        parent_uuid: row.try_get("parent_uuid").map_err(read)?,
        name: row.try_get("name").map_err(read)?,
        session_id: row.try_get("session_id").map_err(read)?,
        status: row.try_get("status").map_err(read)?,
        idle: row.try_get("idle").map_err(read)?,
        provider: row.try_get("provider").map_err(read)?,
        model: row.try_get("model").map_err(read)?,
        thinking_level: row.try_get("thinking_level").map_err(read)?,
        created_at: row.try_get("created_at").map_err(read)?,
        ended_at: row.try_get("ended_at").map_err(read)?,
        fork_message_id: row.try_get("fork_message_id").map_err(read)?,
    })
}

/// Insert an agent with `status = 'running'`.
pub async fn insert(conn: &mut PgConnection, agent: &AgentRow) -> Result<()> {
    sqlx::query(
        "INSERT INTO agents (uuid, parent_uuid, name, session_id, status, idle, \
         provider, model, thinking_level, created_at, fork_message_id) \
         VALUES ($1, $2, $3, $4, 'running', $5, $6, $7, $8, $9, $10)",
    )
    .bind(&agent.uuid)
    .bind(&agent.parent_uuid)
    .bind(&agent.name)
    .bind(agent.session_id)
    .bind(agent.idle)
    .bind(&agent.provider)
    .bind(&agent.model)
    .bind(&agent.thinking_level)
    .bind(agent.created_at)
    .bind(agent.fork_message_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| db_err("failed to insert agent", e))?;
    Ok(())
}

pub async fn get(conn: &mut PgConnection, uuid: &str) -> Result<AgentRow> {
    let row = sqlx::query(&format!("SELECT {AGENT_COLUMNS} FROM agents WHERE uuid = $1"))
        .bind(uuid)
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| db_err("failed to get agent", e))?;
    match row {
        Some(row) => row_to_agent(&row),
        None => Err(Error::new(ErrorKind::NotFound, format!("agent not found: {uuid}"))),
    }
}

/// The parent row, or `None` for a root agent.
pub async fn get_parent(conn: &mut PgConnection, uuid: &str) -> Result<Option<AgentRow>> {
    let row = sqlx::query(
        "SELECT p.uuid, p.parent_uuid, p.name, p.session_id, p.status, p.idle, \
         p.provider, p.model, p.thinking_level, p.created_at, \
         COALESCE(p.ended_at, 0) AS ended_at, p.fork_message_id \
         FROM agents c JOIN agents p ON c.parent_uuid = p.uuid WHERE c.uuid = $1",
    )
    .bind(uuid)
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| db_err("failed to get parent", e))?;
    row.as_ref().map(row_to_agent).transpose()
}

pub async fn get_children(conn: &mut PgConnection, parent_uuid: &str) -> Result<Vec<AgentRow>> {
    let rows = sqlx::query(&format!(
        "SELECT {AGENT_COLUMNS} FROM agents WHERE parent_uuid = $1 ORDER BY created_at"
    ))
    .bind(parent_uuid)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| db_err("failed to get children", e))?;
    rows.iter().map(row_to_agent).collect()
}

pub async fn list_running(conn: &mut PgConnection) -> Result<Vec<AgentRow>> {
    let rows = sqlx::query(&format!(
        "SELECT {AGENT_COLUMNS} FROM agents WHERE status = 'running' ORDER BY created_at"
    ))
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| db_err("failed to list running agents", e))?;
    rows.iter().map(row_to_agent).collect()
}

/// Running and dead agents — everything the session owner has not yet reaped.
pub async fn list_active(conn: &mut PgConnection) -> Result<Vec<AgentRow>> {
    let rows = sqlx::query(&format!(
        "SELECT {AGENT_COLUMNS} FROM agents WHERE status IN ('running', 'dead') \
         ORDER BY created_at"
    ))
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| db_err("failed to list active agents", e))?;
    rows.iter().map(row_to_agent).collect()
}

/// Flip a running agent to 'dead' and stamp `ended_at`.
/// Idempotent: rows not currently 'running' are untouched.
pub async fn mark_dead(conn: &mut PgConnection, uuid: &str) -> Result<()> {
    sqlx::query(
        "UPDATE agents SET status = 'dead', ended_at = $1 \
         WHERE uuid = $2 AND status = 'running'",
    )
    .bind(chrono::Utc::now().timestamp())
    .bind(uuid)
    .execute(&mut *conn)
    .await
    .map_err(|e| db_err("failed to mark agent dead", e))?;
    Ok(())
}

/// Acknowledge a dead agent's grave.
pub async fn mark_reaped(conn: &mut PgConnection, uuid: &str) -> Result<()> {
    sqlx::query("UPDATE agents SET status = 'reaped' WHERE uuid = $1 AND status = 'dead'")
        .bind(uuid)
        .execute(&mut *conn)
        .await
        .map_err(|e| db_err("failed to mark agent reaped", e))?;
    Ok(())
}

pub async fn set_idle(conn: &mut PgConnection, uuid: &str, idle: bool) -> Result<()> {
    sqlx::query("UPDATE agents SET idle = $1 WHERE uuid = $2")
        .bind(idle)
        .bind(uuid)
        .execute(&mut *conn)
        .await
        .map_err(|e| db_err("failed to set idle flag", e))?;
    Ok(())
}

pub async fn update_provider(
    conn: &mut PgConnection,
    uuid: &str,
    provider: &str,
    model: &str,
    thinking_level: &str,
) -> Result<()> {
    sqlx::query(
        "UPDATE agents SET provider = $1, model = $2, thinking_level = $3 WHERE uuid = $4",
    )
    .bind(provider)
    .bind(model)
    .bind(thinking_level)
    .bind(uuid)
    .execute(&mut *conn)
    .await
    .map_err(|e| db_err("failed to update provider", e))?;
    Ok(())
}

/// Return the root agent's uuid, creating it lazily when the registry holds
/// no row with `parent_uuid IS NULL`.  Messages left behind without an
/// owning agent (older schema revisions) are adopted onto the new root.
pub async fn ensure_agent_zero(conn: &mut PgConnection, session_id: i64) -> Result<String> {
    let existing = sqlx::query("SELECT uuid FROM agents WHERE parent_uuid IS NULL")
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| db_err("failed to query for root agent", e))?;
    if let Some(row) = existing {
        return row.try_get(0).map_err(|e| db_err("failed to read root uuid", e));
    }

    let uuid = generate_uuid();
    sqlx::query(
        "INSERT INTO agents (uuid, parent_uuid, name, session_id, status, \
         created_at, fork_message_id) \
         VALUES ($1, NULL, NULL, $2, 'running', $3, 0)",
    )
    .bind(&uuid)
    .bind(session_id)
    .bind(chrono::Utc::now().timestamp())
    .execute(&mut *conn)
    .await
    .map_err(|e| db_err("failed to insert agent zero", e))?;

    let orphans = sqlx::query("SELECT 1 FROM messages WHERE agent_uuid IS NULL LIMIT 1")
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| db_err("failed to check orphan messages", e))?;
    if orphans.is_some() {
        sqlx::query("UPDATE messages SET agent_uuid = $1 WHERE agent_uuid IS NULL")
            .bind(&uuid)
            .execute(&mut *conn)
            .await
            .map_err(|e| db_err("failed to adopt orphan messages", e))?;
    }

    Ok(uuid)
}
