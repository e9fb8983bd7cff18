// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::io::ErrorKind;

use serde_json::json;

use crate::envelope::{success, tool_error};

/// Read a file and return its contents under `data.output`.
///
/// Error messages distinguish the cases a user can act on: not found,
/// permission denied, and the generic open/read failures.
pub fn run(path: &str) -> String {
    match std::fs::read(path) {
        Ok(bytes) => {
            let output = String::from_utf8_lossy(&bytes).into_owned();
            success(json!({ "output": output }))
        }
        Err(e) => {
            let message = match e.kind() {
                ErrorKind::NotFound => format!("File not found: {path}"),
                ErrorKind::PermissionDenied => format!("Permission denied: {path}"),
                _ => format!("Cannot open file: {path}"),
            };
            tool_error(message)
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
