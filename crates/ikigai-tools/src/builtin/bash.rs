// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::process::{Command, Stdio};

use serde_json::json;

use crate::envelope::{success, tool_error};

/// Execute a command through the shell and capture stdout.
///
/// The trailing newline is stripped from the output; the exit code is
/// reported under `data.exit_code` and a non-zero code is NOT a tool error.
/// stderr passes through to the parent, matching popen("r") semantics.
pub fn run(command: &str) -> String {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit());

    // Detach the child from the controlling terminal so interactive programs
    // it spawns cannot corrupt the REPL's terminal state.
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }
    }

    let output = match cmd.output() {
        Ok(o) => o,
        Err(_) => return tool_error("Failed to execute command"),
    };

    let mut stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    if stdout.ends_with('\n') {
        stdout.pop();
    }

    // A signal-terminated child has no exit code; report 127 like a failed
    // pclose would.
    let exit_code = output.status.code().unwrap_or(127);

    success(json!({ "output": stdout, "exit_code": exit_code }))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn parsed(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    #[test]
    fn captures_stdout_with_trailing_newline_stripped() {
        let v = parsed(&run("echo hello"));
        assert_eq!(v["success"], true);
        assert_eq!(v["data"]["output"], "hello");
        assert_eq!(v["data"]["exit_code"], 0);
    }

    #[test]
    fn interior_newlines_are_preserved() {
        let v = parsed(&run("printf 'a\\nb\\n'"));
        assert_eq!(v["data"]["output"], "a\nb");
    }

    #[test]
    fn nonzero_exit_code_is_still_success() {
        let v = parsed(&run("exit 3"));
        assert_eq!(v["success"], true);
        assert_eq!(v["data"]["exit_code"], 3);
        assert_eq!(v["data"]["output"], "");
    }

    #[test]
    fn command_not_found_reports_shell_exit_code() {
        let v = parsed(&run("definitely_not_a_command_xyz 2>/dev/null"));
        assert_eq!(v["success"], true);
        assert_eq!(v["data"]["exit_code"], 127);
    }

    #[test]
    fn empty_output_commands_yield_empty_string() {
        let v = parsed(&run("true"));
        assert_eq!(v["data"]["output"], "");
        assert_eq!(v["data"]["exit_code"], 0);
    }

    #[test]
    fn pipelines_run_through_the_shell() {
        let v = parsed(&run("echo 'one two three' | wc -w | tr -d ' '"));
        assert_eq!(v["data"]["output"], "3");
    }
}
