// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::{Path, PathBuf};

use sqlx::{PgConnection, Row};
use tracing::info;

use ikigai_model::{Error, ErrorKind, Result};

fn migrate_err(msg: impl Into<String>) -> Error {
    Error::new(ErrorKind::DbMigrate, msg)
}

/// Parse `NNNN-description.sql` into its numeric prefix.
///
/// Prefixes are 3 or 4 digits; anything else is not a migration file.
fn migration_number(file_name: &str) -> Option<i32> {
    let stem = file_name.strip_suffix(".sql")?;
    let (prefix, rest) = stem.split_at(stem.find('-')?);
    if !rest.starts_with('-') || rest.len() < 2 {
        return None;
    }
    if prefix.len() < 3 || prefix.len() > 4 || !prefix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    prefix.parse().ok()
}

/// List migration files in `dir`, sorted by numeric prefix.
/// Malformed names are skipped.
pub fn list_migrations(dir: &Path) -> Result<Vec<(i32, PathBuf)>> {
    let entries = std::fs::read_dir(dir)
        .map_err(|e| migrate_err(format!("cannot read {}: {e}", dir.display())))?;

    let mut files: Vec<(i32, PathBuf)> = entries
        .filter_map(|entry| {
            let entry = entry.ok()?;
            let name = entry.file_name();
            let number = migration_number(name.to_str()?)?;
            Some((number, entry.path()))
        })
        .collect();
    files.sort_by_key(|(number, _)| *number);
    Ok(files)
}

async fn current_version(conn: &mut PgConnection) -> Result<i32> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_metadata (schema_version int NOT NULL)",
    )
    .execute(&mut *conn)
    .await
    .map_err(|e| migrate_err(format!("cannot create schema_metadata: {e}")))?;

    let row = sqlx::query("SELECT schema_version FROM schema_metadata")
        .fetch_optional(&mut *conn)
        .await
        .map_err(|e| migrate_err(format!("cannot read schema_version: {e}")))?;

    match row {
        Some(row) => row
            .try_get::<i32, _>(0)
            .map_err(|e| migrate_err(format!("cannot parse schema_version: {e}"))),
        None => {
            sqlx::query("INSERT INTO schema_metadata (schema_version) VALUES (0)")
                .execute(&mut *conn)
                .await
                .map_err(|e| migrate_err(format!("cannot seed schema_version: {e}")))?;
            Ok(0)
        }
    }
}

/// Apply every migration in `dir` with a number greater than the tracked
/// schema version.  Each file is executed as a single batch and is expected
/// to carry its own `BEGIN;…COMMIT;`.
pub async fn run_migrations(conn: &mut PgConnection, dir: &Path) -> Result<()> {
    let version = current_version(conn).await?;
    let files = list_migrations(dir)?;

    for (number, path) in files {
        if number <= version {
            continue;
        }
        let sql = std::fs::read_to_string(&path)
            .map_err(|e| migrate_err(format!("cannot read {}: {e}", path.display())))?;

        info!(migration = %path.display(), "applying migration");
        sqlx::raw_sql(&sql)
            .execute(&mut *conn)
            .await
            .map_err(|e| migrate_err(format!("{} failed: {e}", path.display())))?;

        sqlx::query("UPDATE schema_metadata SET schema_version = $1")
            .bind(number)
            .execute(&mut *conn)
            .await
            .map_err(|e| migrate_err(format!("cannot record version {number}: {e}")))?;
    }
    Ok(())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
