// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod anthropic;
mod error;
mod provider;
mod types;
mod uuid;

pub mod mock;

pub use anthropic::{supports_thinking, thinking_budget, validate_thinking, AnthropicProvider};
pub use error::{Error, ErrorKind, Result};
pub use provider::{EventStream, Provider};
pub use types::*;
pub use uuid::generate_uuid;

use std::sync::Arc;

/// Construct a boxed [`Provider`] by name.
///
/// `"anthropic"` is the fully-implemented driver; every other name returns
/// an `ErrorKind::Provider` error so callers can surface a clear message
/// instead of silently falling back.
pub fn create_provider(
    name: &str,
    api_key: Option<String>,
    base_url: Option<String>,
) -> Result<Arc<dyn Provider>> {
    match name {
        "anthropic" => Ok(Arc::new(AnthropicProvider::new(api_key, base_url))),
        other => Err(Error::new(
            ErrorKind::Provider,
            format!("unknown provider: {other}"),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_provider_anthropic_succeeds() {
        let p = create_provider("anthropic", Some("k".into()), None).unwrap();
        assert_eq!(p.name(), "anthropic");
    }

    #[test]
    fn create_provider_unknown_returns_provider_error() {
        let err = match create_provider("openai", None, None) {
            Err(e) => e,
            Ok(_) => panic!("called `Result::unwrap_err()` on an `Ok` value"),
        };
        assert_eq!(err.kind, ErrorKind::Provider);
        assert!(err.message.contains("openai"));
    }
}
