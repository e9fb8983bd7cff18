// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::Path;

use ikigai_model::{Error, ErrorKind, Result};

use crate::doc_cache::DocCache;
use crate::template::{process_template, TemplateVars};

/// Compiled fallback when no other prompt source yields content.
pub const DEFAULT_SYSTEM_PROMPT: &str =
    "You are a helpful assistant running inside a terminal session. \
     Answer concisely and use the available tools when they help.";

/// Upper bound for `<data_dir>/system/prompt.md`.
const PROMPT_FILE_MAX_BYTES: u64 = 1024;

/// Resolve the effective system prompt.  First non-empty source wins:
///
/// 1. the pinned documents, each passed through the template engine —
///    unresolved variables become warning lines, never a failure;
/// 2. `<data_dir>/system/prompt.md` — empty or oversize is a hard error;
/// 3. the configured system message;
/// 4. the compiled default.
///
/// Returns the prompt plus the warning lines for the scrollback.
pub fn resolve_effective_system_prompt(
    pinned_paths: &[String],
    doc_cache: &mut DocCache,
    data_dir: &Path,
    vars: &TemplateVars<'_>,
) -> Result<(String, Vec<String>)> {
    let mut warnings = Vec::new();

    if !pinned_paths.is_empty() {
        let mut assembled = String::new();
        for path in pinned_paths {
            // A document that fails to load is skipped; the rest still pin.
            let Ok(content) = doc_cache.get(path) else {
                continue;
            };
            let result = process_template(content, vars);
            for name in &result.unresolved {
                warnings.push(format!("Unknown template variable: {name}"));
            }
            assembled.push_str(&result.processed);
        }
        if !assembled.is_empty() {
            return Ok((assembled, warnings));
        }
    }

    let prompt_path = data_dir.join("system/prompt.md");
    if prompt_path.exists() {
        let size = std::fs::metadata(&prompt_path)?.len();
        if size == 0 {
            return Err(Error::new(
                ErrorKind::InvalidArg,
                format!("system prompt file is empty: {}", prompt_path.display()),
            ));
        }
        if size > PROMPT_FILE_MAX_BYTES {
            return Err(Error::new(
                ErrorKind::InvalidArg,
                format!(
                    "system prompt file exceeds {PROMPT_FILE_MAX_BYTES} bytes: {}",
                    prompt_path.display()
                ),
            ));
        }
        let content = std::fs::read_to_string(&prompt_path)?;
        return Ok((content, warnings));
    }

    if let Some(message) = vars.config.system_message() {
        return Ok((message.to_string(), warnings));
    }

    Ok((DEFAULT_SYSTEM_PROMPT.to_string(), warnings))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
