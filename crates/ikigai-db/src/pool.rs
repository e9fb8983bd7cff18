// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use sqlx::postgres::PgConnectOptions;
use sqlx::{ConnectOptions, PgConnection};

use ikigai_model::{Error, ErrorKind, Result};

/// Connection parameters for the message store.
#[derive(Debug, Clone)]
pub struct ConnectParams {
    pub host: String,
    pub port: u16,
    pub dbname: String,
    pub user: String,
}

/// Open one dedicated connection.
///
/// Every agent holds its own connection so sibling agents never serialise on
/// a shared handle; the REPL's bookkeeping uses another one built from the
/// same parameters.  The password, when needed, comes from the standard
/// PGPASSWORD environment variable.
pub async fn connect(params: &ConnectParams) -> Result<PgConnection> {
    let mut options = PgConnectOptions::new()
        .host(&params.host)
        .port(params.port)
        .database(&params.dbname)
        .username(&params.user);
    if let Ok(password) = std::env::var("PGPASSWORD") {
        options = options.password(&password);
    }

    options
        .connect()
        .await
        .map_err(|e| Error::new(ErrorKind::DbConnect, format!("connect failed: {e}")))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
