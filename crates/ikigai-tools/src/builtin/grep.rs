// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde_json::json;

use crate::envelope::{success, tool_error};

/// Search file contents for a regex pattern.
///
/// Candidate files come from `<path>/<glob>` (default filter `*`); matches
/// are formatted as `file:line: text`.  Non-regular files are skipped and
/// unreadable files are skipped silently, so a partial search still
/// succeeds.
pub fn run(pattern: &str, glob_filter: Option<&str>, path: Option<&str>) -> String {
    let regex = match regex::Regex::new(pattern) {
        Ok(r) => r,
        Err(e) => return tool_error(format!("Invalid pattern: {e}")),
    };

    let search_path = match path {
        Some(p) if !p.is_empty() => p,
        _ => ".",
    };
    let full_glob = match glob_filter {
        Some(f) if !f.is_empty() => format!("{search_path}/{f}"),
        _ => format!("{search_path}/*"),
    };

    let mut matches = Vec::new();
    if let Ok(paths) = ::glob::glob(&full_glob) {
        for entry in paths.filter_map(|e| e.ok()) {
            if !entry.is_file() {
                continue;
            }
            let Ok(bytes) = std::fs::read(&entry) else {
                continue;
            };
            let text = String::from_utf8_lossy(&bytes);
            for (line_number, line) in text.lines().enumerate() {
                if regex.is_match(line) {
                    matches.push(format!("{}:{}: {}", entry.display(), line_number + 1, line));
                }
            }
        }
    }

    success(json!({
        "output": matches.join("\n"),
        "count": matches.len(),
    }))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn parsed(s: &str) -> Value {
        serde_json::from_str(s).unwrap()
    }

    fn fixture_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.c"), "int main(void)\nreturn 0;\n").unwrap();
        std::fs::write(dir.path().join("b.c"), "static int counter;\n").unwrap();
        std::fs::write(dir.path().join("notes.md"), "int is a keyword\n").unwrap();
        dir
    }

    #[test]
    fn matches_are_formatted_as_file_line_text() {
        let dir = fixture_dir();
        let v = parsed(&run("main", None, dir.path().to_str()));
        assert_eq!(v["success"], true);
        assert_eq!(v["data"]["count"], 1);
        let output = v["data"]["output"].as_str().unwrap();
        assert!(output.contains("a.c:1: int main(void)"), "{output}");
    }

    #[test]
    fn glob_filter_narrows_the_file_set() {
        let dir = fixture_dir();
        let v = parsed(&run("int", Some("*.c"), dir.path().to_str()));
        assert_eq!(v["data"]["count"], 2);
        assert!(!v["data"]["output"].as_str().unwrap().contains("notes.md"));
    }

    #[test]
    fn no_matches_is_success_with_zero_count() {
        let dir = fixture_dir();
        let v = parsed(&run("xyzzy_not_here", None, dir.path().to_str()));
        assert_eq!(v["success"], true);
        assert_eq!(v["data"]["count"], 0);
        assert_eq!(v["data"]["output"], "");
    }

    #[test]
    fn invalid_regex_is_tool_error() {
        let v = parsed(&run("(unclosed", None, None));
        assert_eq!(v["success"], false);
        assert!(v["error"].as_str().unwrap().starts_with("Invalid pattern:"));
    }

    #[test]
    fn directories_are_skipped() {
        let dir = fixture_dir();
        std::fs::create_dir(dir.path().join("subdir")).unwrap();
        let v = parsed(&run("int", None, dir.path().to_str()));
        assert_eq!(v["success"], true);
    }

    #[test]
    fn line_numbers_are_one_based() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "first\nsecond\nthird\n").unwrap();
        let v = parsed(&run("third", None, dir.path().to_str()));
        assert!(v["data"]["output"].as_str().unwrap().contains(":3: third"));
    }

    #[test]
    fn regex_alternation_works() {
        let dir = fixture_dir();
        let v = parsed(&run("main|counter", Some("*.c"), dir.path().to_str()));
        assert_eq!(v["data"]["count"], 2);
    }
}
