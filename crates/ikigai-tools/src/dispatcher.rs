// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde_json::{json, Value};
use tracing::debug;

use crate::builtin;
use crate::envelope::dispatch_error;

/// A tool definition as exposed to the model.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Value,
}

fn string_params(params: &[(&str, &str, bool)]) -> Value {
    let mut properties = serde_json::Map::new();
    let mut required = Vec::new();
    for (name, description, is_required) in params {
        properties.insert(
            (*name).to_string(),
            json!({ "type": "string", "description": description }),
        );
        if *is_required {
            required.push(json!(name));
        }
    }
    json!({ "type": "object", "properties": properties, "required": required })
}

/// The five built-in tool definitions, in registration order.
pub fn definitions() -> Vec<ToolSpec> {
    vec![
        ToolSpec {
            name: "glob",
            description: "Find files matching a glob pattern",
            parameters: string_params(&[
                ("pattern", "Glob pattern (e.g., 'src/**/*.c')", true),
                ("path", "Base directory (default: cwd)", false),
            ]),
        },
        ToolSpec {
            name: "file_read",
            description: "Read contents of a file",
            parameters: string_params(&[("path", "Path to file", true)]),
        },
        ToolSpec {
            name: "grep",
            description: "Search file contents for a pattern",
            parameters: string_params(&[
                ("pattern", "Search pattern (regex)", true),
                ("path", "File or directory to search", false),
                ("glob", "File pattern filter (e.g., '*.c')", false),
            ]),
        },
        ToolSpec {
            name: "file_write",
            description: "Write content to a file",
            parameters: string_params(&[
                ("path", "Path to file", true),
                ("content", "Content to write", true),
            ]),
        },
        ToolSpec {
            name: "bash",
            description: "Execute a shell command",
            parameters: string_params(&[("command", "Command to execute", true)]),
        },
    ]
}

fn get_string_arg(args: &Value, key: &str) -> Option<String> {
    args.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Clamp the envelope's `data.output` field to `max_output_size` bytes.
///
/// Truncating the field rather than the whole document keeps the result
/// parseable for the limit-metadata injection downstream.
fn enforce_output_limit(result: String, max_output_size: usize) -> String {
    if max_output_size == 0 {
        return result;
    }
    let Ok(mut value) = serde_json::from_str::<Value>(&result) else {
        return result;
    };
    let Some(output) = value
        .get("data")
        .and_then(|d| d.get("output"))
        .and_then(Value::as_str)
        .map(str::to_string)
    else {
        return result;
    };
    if output.len() <= max_output_size {
        return result;
    }
    value["data"]["output"] = json!(crate::truncate_output(&output, max_output_size));
    value.to_string()
}

/// Look up a tool by name, validate its JSON arguments, and invoke it.
///
/// Always returns a JSON document: the tool envelope on invocation, or the
/// bare `{"error": …}` shape for dispatcher-level failures (unknown tool,
/// invalid arguments JSON, missing required parameter).  Oversize tool
/// output is truncated to `max_output_size` bytes (0 disables the cap).
/// Runs synchronously; callers put it on a worker thread.
pub fn dispatch(tool_name: &str, arguments: Option<&str>, max_output_size: usize) -> String {
    enforce_output_limit(dispatch_inner(tool_name, arguments), max_output_size)
}

fn dispatch_inner(tool_name: &str, arguments: Option<&str>) -> String {
    if tool_name.is_empty() {
        return dispatch_error("Unknown tool: ");
    }

    // Validate the arguments JSON up front so a malformed payload is caught
    // before any tool-specific handling.
    let args: Value = match arguments {
        Some(text) => match serde_json::from_str(text) {
            Ok(v) => v,
            Err(_) => return dispatch_error("Invalid JSON arguments"),
        },
        None => Value::Null,
    };

    debug!(tool = tool_name, "dispatching tool call");

    match tool_name {
        "glob" => {
            let Some(pattern) = get_string_arg(&args, "pattern") else {
                return dispatch_error("Missing required parameter: pattern");
            };
            let path = get_string_arg(&args, "path");
            builtin::glob::run(&pattern, path.as_deref())
        }
        "file_read" => {
            let Some(path) = get_string_arg(&args, "path") else {
                return dispatch_error("Missing required parameter: path");
            };
            builtin::file_read::run(&path)
        }
        "grep" => {
            let Some(pattern) = get_string_arg(&args, "pattern") else {
                return dispatch_error("Missing required parameter: pattern");
            };
            let glob_filter = get_string_arg(&args, "glob");
            let path = get_string_arg(&args, "path");
            builtin::grep::run(&pattern, glob_filter.as_deref(), path.as_deref())
        }
        "file_write" => {
            let Some(path) = get_string_arg(&args, "path") else {
                return dispatch_error("Missing required parameter: path");
            };
            let Some(content) = get_string_arg(&args, "content") else {
                return dispatch_error("Missing required parameter: content");
            };
            builtin::file_write::run(&path, &content)
        }
        "bash" => {
            let Some(command) = get_string_arg(&args, "command") else {
                return dispatch_error("Missing required parameter: command");
            };
            builtin::bash::run(&command)
        }
        other => dispatch_error(format!("Unknown tool: {other}")),
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
