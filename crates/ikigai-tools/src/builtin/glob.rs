// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde_json::json;

use crate::envelope::{success, tool_error};

/// Find files matching a glob pattern, optionally rooted at `path`.
///
/// Returns `data: {output: newline-joined paths, count}`.  No matches is a
/// success with an empty output, mirroring glob(3)'s GLOB_NOMATCH.
pub fn run(pattern: &str, path: Option<&str>) -> String {
    let full_pattern = match path {
        Some(p) if !p.is_empty() => format!("{p}/{pattern}"),
        _ => pattern.to_string(),
    };

    let paths = match ::glob::glob(&full_pattern) {
        Ok(paths) => paths,
        Err(_) => return tool_error("Invalid glob pattern"),
    };

    let matches: Vec<String> = paths
        .filter_map(|entry| entry.ok())
        .map(|p| p.display().to_string())
        .collect();

    success(json!({
        "output": matches.join("\n"),
        "count": matches.len(),
    }))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
