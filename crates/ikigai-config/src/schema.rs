// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

fn default_listen_address() -> Option<String> {
    Some("127.0.0.1".into())
}
fn default_listen_port() -> u16 {
    8080
}
fn default_db_host() -> Option<String> {
    Some("localhost".into())
}
fn default_db_port() -> i32 {
    5432
}
fn default_db_name() -> Option<String> {
    Some("ikigai".into())
}
fn default_db_user() -> Option<String> {
    Some("ikigai".into())
}
fn default_max_tool_turns() -> i32 {
    25
}
fn default_max_output_size() -> i64 {
    65536
}
fn default_history_size() -> i32 {
    1000
}
fn default_provider() -> Option<String> {
    Some("openai".into())
}

/// Runtime configuration.
///
/// Every string option treats the empty string and an explicit YAML `null`
/// the same way: "use the default".  Accessors normalise that so the rest of
/// the runtime never sees an empty override.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub openai_model: Option<String>,
    pub openai_temperature: f64,
    pub openai_max_completion_tokens: i32,
    /// Nullable: empty or null falls through to the prompt file, then the
    /// compiled default.
    pub openai_system_message: Option<String>,
    #[serde(default = "default_listen_address")]
    pub listen_address: Option<String>,
    #[serde(default = "default_listen_port")]
    pub listen_port: u16,
    #[serde(default = "default_db_host")]
    pub db_host: Option<String>,
    #[serde(default = "default_db_port")]
    pub db_port: i32,
    #[serde(default = "default_db_name")]
    pub db_name: Option<String>,
    #[serde(default = "default_db_user")]
    pub db_user: Option<String>,
    #[serde(default = "default_max_tool_turns")]
    pub max_tool_turns: i32,
    #[serde(default = "default_max_output_size")]
    pub max_output_size: i64,
    #[serde(default = "default_history_size")]
    pub history_size: i32,
    #[serde(default = "default_provider")]
    pub default_provider: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            openai_model: None,
            openai_temperature: 1.0,
            openai_max_completion_tokens: 4096,
            openai_system_message: None,
            listen_address: default_listen_address(),
            listen_port: default_listen_port(),
            db_host: default_db_host(),
            db_port: default_db_port(),
            db_name: default_db_name(),
            db_user: default_db_user(),
            max_tool_turns: default_max_tool_turns(),
            max_output_size: default_max_output_size(),
            history_size: default_history_size(),
            default_provider: default_provider(),
        }
    }
}

/// Treat `None` and `""` both as absent.
fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}

impl Config {
    pub fn db_host(&self) -> &str {
        non_empty(&self.db_host).unwrap_or("localhost")
    }

    pub fn db_name(&self) -> &str {
        non_empty(&self.db_name).unwrap_or("ikigai")
    }

    pub fn db_user(&self) -> &str {
        non_empty(&self.db_user).unwrap_or("ikigai")
    }

    pub fn db_port(&self) -> u16 {
        if self.db_port > 0 && self.db_port <= u16::MAX as i32 {
            self.db_port as u16
        } else {
            5432
        }
    }

    pub fn system_message(&self) -> Option<&str> {
        non_empty(&self.openai_system_message)
    }

    pub fn openai_model(&self) -> Option<&str> {
        non_empty(&self.openai_model)
    }

    /// Provider for freshly-created agents.  The IKIGAI_DEFAULT_PROVIDER
    /// environment variable overrides the config file.
    pub fn default_provider(&self) -> String {
        if let Ok(env) = std::env::var("IKIGAI_DEFAULT_PROVIDER") {
            if !env.is_empty() {
                return env;
            }
        }
        non_empty(&self.default_provider).unwrap_or("openai").to_string()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
