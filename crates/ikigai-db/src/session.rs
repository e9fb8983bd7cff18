// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use sqlx::{PgConnection, Row};

use crate::db_err;
use ikigai_model::Result;

/// Insert a new session row and return its id.
pub async fn create(conn: &mut PgConnection) -> Result<i64> {
    let row = sqlx::query("INSERT INTO sessions DEFAULT VALUES RETURNING id")
        .fetch_one(&mut *conn)
        .await
        .map_err(|e| db_err("failed to create session", e))?;
    row.try_get(0).map_err(|e| db_err("failed to read session id", e))
}

/// Most recent session with `ended_at IS NULL`, or `None`.
///
/// Ordered by `(started_at DESC, id DESC)` so that sessions created within
/// the same transaction timestamp still resolve deterministically.
pub async fn get_active(conn: &mut PgConnection) -> Result<Option<i64>> {
    let row = sqlx::query(
        "SELECT id FROM sessions WHERE ended_at IS NULL \
         ORDER BY started_at DESC, id DESC LIMIT 1",
    )
    .fetch_optional(&mut *conn)
    .await
    .map_err(|e| db_err("failed to get active session", e))?;

    match row {
        Some(row) => Ok(Some(
            row.try_get(0).map_err(|e| db_err("failed to read session id", e))?,
        )),
        None => Ok(None),
    }
}

/// Stamp `ended_at = now()` on the given session.
pub async fn end(conn: &mut PgConnection, session_id: i64) -> Result<()> {
    sqlx::query("UPDATE sessions SET ended_at = now() WHERE id = $1")
        .bind(session_id)
        .execute(&mut *conn)
        .await
        .map_err(|e| db_err("failed to end session", e))?;
    Ok(())
}
