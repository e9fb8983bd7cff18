// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

/// Generate a 22-character base64url agent identifier.
///
/// 128 random bits with the RFC-4122 version-4 and variant bits set, encoded
/// without padding.  ceil(128 / 6) = 22 characters over `[A-Za-z0-9_-]`.
pub fn generate_uuid() -> String {
    let bytes = *::uuid::Uuid::new_v4().as_bytes();
    URL_SAFE_NO_PAD.encode(bytes)
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
