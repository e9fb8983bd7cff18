// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::io::ErrorKind;
use std::path::Path;

use serde_json::json;

use crate::envelope::{success, tool_error};

/// Write `content` to `path`, creating or truncating the file.
///
/// Returns `data: {output: "Wrote K bytes to <basename>", bytes: K}`.
pub fn run(path: &str, content: &str) -> String {
    if let Err(e) = std::fs::write(path, content) {
        let message = match e.kind() {
            ErrorKind::PermissionDenied => format!("Permission denied: {path}"),
            _ if e.raw_os_error() == Some(libc::ENOSPC) => {
                format!("No space left on device: {path}")
            }
            _ => format!("Cannot open file: {path}"),
        };
        return tool_error(message);
    }

    let basename = Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string());

    success(json!({
        "output": format!("Wrote {} bytes to {}", content.len(), basename),
        "bytes": content.len(),
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

    #[test]
    fn writes_content_and_reports_byte_count() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.txt");

        let v = parsed(&run(path.to_str().unwrap(), "hello"));
        assert_eq!(v["success"], true);
        assert_eq!(v["data"]["bytes"], 5);
        assert_eq!(v["data"]["output"], "Wrote 5 bytes to out.txt");
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello");
    }

    #[test]
    fn empty_content_writes_zero_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("empty.txt");

        let v = parsed(&run(path.to_str().unwrap(), ""));
        assert_eq!(v["success"], true);
        assert_eq!(v["data"]["bytes"], 0);
        assert!(path.exists());
    }

    #[test]
    fn overwrites_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("f.txt");
        std::fs::write(&path, "old contents that are longer").unwrap();

        let v = parsed(&run(path.to_str().unwrap(), "new"));
        assert_eq!(v["success"], true);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn missing_parent_directory_is_tool_error() {
        let v = parsed(&run("/tmp/ikigai_no_dir_xyz/f.txt", "x"));
        assert_eq!(v["success"], false);
        assert!(v["error"].as_str().unwrap().contains("/tmp/ikigai_no_dir_xyz/f.txt"));
    }

    #[test]
    fn output_uses_basename_not_full_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deep.txt");
        let v = parsed(&run(path.to_str().unwrap(), "abc"));
        let output = v["data"]["output"].as_str().unwrap();
        assert!(output.ends_with("deep.txt"));
        assert!(!output.contains(dir.path().to_str().unwrap()));
    }
}
