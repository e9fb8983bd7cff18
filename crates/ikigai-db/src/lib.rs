// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
pub mod agent;
pub mod message;
pub mod migrate;
pub mod pool;
pub mod replay;
pub mod session;

pub use agent::AgentRow;
pub use message::{MessageKind, MessageRow};
pub use pool::connect;
pub use replay::{ReplayMessage, ReplayRange};

use ikigai_model::{Error, ErrorKind};

/// Map a driver error onto the runtime taxonomy with a call-site prefix.
pub(crate) fn db_err(context: &str, e: sqlx::Error) -> Error {
    Error::new(ErrorKind::Io, format!("{context}: {e}"))
}
