// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::{Path, PathBuf};

use ikigai_model::Result;

struct Entry {
    path: PathBuf,
    content: String,
}

/// Read-through document cache with no eviction.
///
/// Keys are canonical filesystem paths; `ik://` URIs are translated against
/// the data directory first.  Entries are owned by the cache, so `get`
/// returns a borrowed view.
pub struct DocCache {
    data_dir: PathBuf,
    entries: Vec<Entry>,
}

impl DocCache {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into(), entries: Vec::new() }
    }

    /// Translate `ik://rest` to `<data_dir>/rest`; other paths pass through.
    fn canonical(&self, path: &str) -> PathBuf {
        match path.strip_prefix("ik://") {
            Some(rest) => self.data_dir.join(rest),
            None => PathBuf::from(path),
        }
    }

    /// Cached content for `path`, reading the file on a miss.
    pub fn get(&mut self, path: &str) -> Result<&str> {
        let canonical = self.canonical(path);

        // Linear search; the pin list is small.
        if let Some(i) = self.entries.iter().position(|e| e.path == canonical) {
            return Ok(&self.entries[i].content);
        }

        let content = std::fs::read_to_string(&canonical)?;
        self.entries.push(Entry { path: canonical, content });
        let last = self.entries.len() - 1;
        Ok(&self.entries[last].content)
    }

    /// Drop the entry for `path` if present.
    pub fn invalidate(&mut self, path: &str) {
        let canonical = self.canonical(path);
        self.entries.retain(|e| e.path != canonical);
    }

    /// Drop all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
