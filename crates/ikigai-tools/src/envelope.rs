// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde_json::{json, Value};

/// Tool success: `{"success": true, "data": {…}}` with the tool-specific
/// fields under `data`.
pub(crate) fn success(data: Value) -> String {
    json!({ "success": true, "data": data }).to_string()
}

/// Tool failure: `{"success": false, "error": "…"}`.
pub(crate) fn tool_error(message: impl Into<String>) -> String {
    json!({ "success": false, "error": message.into() }).to_string()
}

/// Dispatcher-level failure: the bare `{"error": "…"}` shape, distinct from
/// tool errors so consumers can tell dispatch problems apart.
pub(crate) fn dispatch_error(message: impl Into<String>) -> String {
    json!({ "error": message.into() }).to_string()
}

/// Byte-truncate oversize tool output, appending an indicator line.
pub fn truncate_output(output: &str, max_size: usize) -> String {
    if output.len() <= max_size {
        return output.to_string();
    }
    // Back off to a char boundary so the copy stays valid UTF-8.
    let mut cut = max_size;
    while cut > 0 && !output.is_char_boundary(cut) {
        cut -= 1;
    }
    format!(
        "{}[Output truncated: showing first {} of {} bytes]",
        &output[..cut],
        max_size,
        output.len()
    )
}

/// Inject the tool-budget annotation into a tool-result JSON document.
///
/// Adds top-level `limit_reached: true` and the stop message.  Malformed or
/// non-object input returns `None`.
pub fn add_limit_metadata(result_json: &str, max_tool_turns: i32) -> Option<String> {
    let mut value: Value = serde_json::from_str(result_json).ok()?;
    let obj = value.as_object_mut()?;
    obj.insert("limit_reached".into(), json!(true));
    obj.insert(
        "limit_message".into(),
        json!(format!(
            "Tool call limit reached ({max_tool_turns}). Stopping tool loop."
        )),
    );
    Some(value.to_string())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    // ── Envelope shapes ───────────────────────────────────────────────────────

    #[test]
    fn success_wraps_data_object() {
        let out = success(json!({ "output": "x", "count": 1 }));
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["success"], true);
        assert_eq!(v["data"]["output"], "x");
        assert_eq!(v["data"]["count"], 1);
    }

    #[test]
    fn tool_error_has_success_false() {
        let out = tool_error("broke");
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["success"], false);
        assert_eq!(v["error"], "broke");
    }

    #[test]
    fn dispatch_error_has_no_success_field() {
        let out = dispatch_error("Unknown tool: zap");
        let v: Value = serde_json::from_str(&out).unwrap();
        assert!(v.get("success").is_none());
        assert_eq!(v["error"], "Unknown tool: zap");
    }

    // ── Truncation ────────────────────────────────────────────────────────────

    #[test]
    fn short_output_is_returned_verbatim() {
        assert_eq!(truncate_output("hello", 100), "hello");
    }

    #[test]
    fn exact_size_output_is_not_truncated() {
        assert_eq!(truncate_output("12345", 5), "12345");
    }

    #[test]
    fn oversize_output_keeps_prefix_and_indicator() {
        let out = truncate_output("abcdefghij", 4);
        assert_eq!(out, "abcd[Output truncated: showing first 4 of 10 bytes]");
    }

    #[test]
    fn zero_max_size_returns_only_the_indicator() {
        let out = truncate_output("abc", 0);
        assert_eq!(out, "[Output truncated: showing first 0 of 3 bytes]");
    }

    #[test]
    fn truncation_respects_utf8_boundaries() {
        // 'é' is two bytes; cutting at 1 would split it.
        let out = truncate_output("héllo", 2);
        assert!(out.starts_with("h[Output truncated"));
    }

    // ── Limit metadata ────────────────────────────────────────────────────────

    #[test]
    fn limit_metadata_is_added_at_top_level() {
        let input = r#"{"success":true,"data":{"output":"hi","exit_code":0}}"#;
        let out = add_limit_metadata(input, 2).unwrap();
        let v: Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["limit_reached"], true);
        assert_eq!(
            v["limit_message"],
            "Tool call limit reached (2). Stopping tool loop."
        );
        // Original fields survive.
        assert_eq!(v["data"]["exit_code"], 0);
    }

    #[test]
    fn limit_metadata_rejects_malformed_json() {
        assert!(add_limit_metadata("{broken", 3).is_none());
    }

    #[test]
    fn limit_metadata_rejects_non_object_json() {
        assert!(add_limit_metadata("[1,2,3]", 3).is_none());
    }
}
