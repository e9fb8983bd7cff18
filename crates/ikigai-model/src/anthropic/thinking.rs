// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use crate::{Error, ErrorKind, Result, ThinkingLevel};

/// Per-model thinking budget limits.  Models not listed here fall back to
/// the default range.
const BUDGET_TABLE: &[(&str, i32, i32)] = &[
    ("claude-sonnet-4-5", 1024, 64000),
    ("claude-haiku-4-5", 1024, 32000),
];

const DEFAULT_MIN_BUDGET: i32 = 1024;
const DEFAULT_MAX_BUDGET: i32 = 32000;

/// All Claude models support extended thinking.
pub fn supports_thinking(model: &str) -> bool {
    model.starts_with("claude-")
}

/// Token budget for the given model and level, or `None` when the model does
/// not support Anthropic thinking.
pub fn thinking_budget(model: &str, level: ThinkingLevel) -> Option<i32> {
    if !supports_thinking(model) {
        return None;
    }

    let (min, max) = BUDGET_TABLE
        .iter()
        .find(|(pattern, _, _)| model.starts_with(pattern))
        .map(|(_, min, max)| (*min, *max))
        .unwrap_or((DEFAULT_MIN_BUDGET, DEFAULT_MAX_BUDGET));

    let range = max - min;
    Some(match level {
        ThinkingLevel::None => min,
        ThinkingLevel::Low => min + range / 3,
        ThinkingLevel::Med => min + (2 * range) / 3,
        ThinkingLevel::High => max,
    })
}

/// `None` is valid for any model; non-`None` levels require a Claude model.
pub fn validate_thinking(model: &str, level: ThinkingLevel) -> Result<()> {
    if level == ThinkingLevel::None {
        return Ok(());
    }
    if !supports_thinking(model) {
        return Err(Error::new(
            ErrorKind::InvalidArg,
            format!(
                "Model '{model}' does not support Anthropic thinking \
                 (only Claude models support thinking)"
            ),
        ));
    }
    Ok(())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
