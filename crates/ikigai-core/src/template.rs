// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use ikigai_config::Config;

/// Result of template processing: the substituted text plus every variable
/// reference that could not be resolved (left verbatim in the output).
#[derive(Debug, Clone)]
pub struct TemplateResult {
    pub processed: String,
    pub unresolved: Vec<String>,
}

/// The values `${agent.*}` and `${config.*}` resolve against.
pub struct TemplateVars<'a> {
    pub agent_uuid: &'a str,
    pub agent_name: Option<&'a str>,
    pub agent_provider: &'a str,
    pub agent_model: &'a str,
    pub agent_created_at: i64,
    pub config: &'a Config,
}

/// Substitute `${NAMESPACE.NAME}` references in `text`.
///
/// Namespaces: `agent`, `config`, `env`, `func`.  `$$` escapes to a literal
/// `$`.  Unresolved references stay verbatim and are collected.
pub fn process_template(text: &str, vars: &TemplateVars) -> TemplateResult {
    let mut processed = String::with_capacity(text.len());
    let mut unresolved = Vec::new();
    let mut rest = text;

    while let Some(dollar) = rest.find('$') {
        processed.push_str(&rest[..dollar]);
        let after = &rest[dollar + 1..];

        if let Some(stripped) = after.strip_prefix('$') {
            processed.push('$');
            rest = stripped;
            continue;
        }

        let Some(open) = after.strip_prefix('{') else {
            // A bare '$' is literal text.
            processed.push('$');
            rest = after;
            continue;
        };
        let Some(close) = open.find('}') else {
            // Unterminated reference — keep the remainder verbatim.
            processed.push_str(&rest[dollar..]);
            rest = "";
            break;
        };

        let name = &open[..close];
        match resolve(name, vars) {
            Some(value) => processed.push_str(&value),
            None => {
                processed.push_str(&rest[dollar..dollar + name.len() + 3]);
                unresolved.push(name.to_string());
            }
        }
        rest = &open[close + 1..];
    }
    processed.push_str(rest);

    TemplateResult { processed, unresolved }
}

fn resolve(name: &str, vars: &TemplateVars) -> Option<String> {
    let (namespace, field) = name.split_once('.')?;
    match namespace {
        "agent" => match field {
            "uuid" => Some(vars.agent_uuid.to_string()),
            "name" => vars.agent_name.map(str::to_string),
            "provider" => Some(vars.agent_provider.to_string()),
            "model" => Some(vars.agent_model.to_string()),
            "created_at" => Some(vars.agent_created_at.to_string()),
            _ => None,
        },
        "config" => match field {
            "openai_model" => Some(vars.config.openai_model().unwrap_or("").to_string()),
            "db_host" => Some(vars.config.db_host().to_string()),
            "db_port" => Some(vars.config.db_port().to_string()),
            "db_name" => Some(vars.config.db_name().to_string()),
            "db_user" => Some(vars.config.db_user().to_string()),
            _ => None,
        },
        "env" => std::env::var(field).ok(),
        "func" => match field {
            "cwd" => std::env::current_dir()
                .ok()
                .map(|p| p.display().to_string()),
            "hostname" => Some(hostname()),
            "now" => Some(chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()),
            "random" => Some(rand::random::<u32>().to_string()),
            _ => None,
        },
        _ => None,
    }
}

fn hostname() -> String {
    if let Ok(name) = std::env::var("HOSTNAME") {
        if !name.is_empty() {
            return name;
        }
    }
    std::fs::read_to_string("/etc/hostname")
        .map(|s| s.trim().to_string())
        .unwrap_or_else(|_| "localhost".into())
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
