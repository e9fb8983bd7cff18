// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
mod cli;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use ikigai_config::{data_dir, Config};
use ikigai_core::{Agent, AgentEvent};
use ikigai_db::pool::ConnectParams;
use ikigai_model::{create_provider, validate_thinking, ThinkingLevel};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Arc::new(ikigai_config::load(cli.config.as_deref())?);

    match &cli.command {
        Some(Commands::ShowConfig) => {
            println!("{}", serde_yaml::to_string(config.as_ref()).unwrap_or_default());
            Ok(())
        }
        Some(Commands::Migrate { dir }) => run_migrate(&config, dir).await,
        Some(Commands::Agents) => list_agents(&config).await,
        None => run_repl(config).await,
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn connect_params(config: &Config) -> ConnectParams {
    ConnectParams {
        host: config.db_host().to_string(),
        port: config.db_port(),
        dbname: config.db_name().to_string(),
        user: config.db_user().to_string(),
    }
}

async fn run_migrate(config: &Config, dir: &Path) -> anyhow::Result<()> {
    let mut conn = ikigai_db::connect(&connect_params(config)).await?;
    ikigai_db::migrate::run_migrations(&mut conn, dir).await?;
    println!("migrations up to date");
    Ok(())
}

async fn list_agents(config: &Config) -> anyhow::Result<()> {
    let mut conn = ikigai_db::connect(&connect_params(config)).await?;
    for row in ikigai_db::agent::list_active(&mut conn).await? {
        println!(
            "{}  {:8}  {}  {}",
            row.uuid,
            row.status,
            row.model.as_deref().unwrap_or("-"),
            row.name.as_deref().unwrap_or(""),
        );
    }
    Ok(())
}

async fn run_repl(config: Arc<Config>) -> anyhow::Result<()> {
    let params = connect_params(&config);
    // Bookkeeping connection for the registry and sessions; the agent gets
    // its own so sibling agents never serialise on a shared handle.
    let mut repl_conn = ikigai_db::connect(&params).await?;
    let mut agent_conn = ikigai_db::connect(&params).await?;

    if Path::new("migrations").is_dir() {
        ikigai_db::migrate::run_migrations(&mut repl_conn, Path::new("migrations")).await?;
    }

    let session_id = match ikigai_db::session::get_active(&mut repl_conn).await? {
        Some(id) => id,
        None => ikigai_db::session::create(&mut repl_conn).await?,
    };

    let provider_name = config.default_provider();
    let api_key = std::env::var("ANTHROPIC_API_KEY").ok();
    let provider = create_provider(&provider_name, api_key, None).with_context(|| {
        format!(
            "cannot start provider {provider_name:?}; \
             set IKIGAI_DEFAULT_PROVIDER or default_provider in the config"
        )
    })?;

    let root_uuid = ikigai_db::agent::ensure_agent_zero(&mut repl_conn, session_id).await?;
    let row = ikigai_db::agent::get(&mut repl_conn, &root_uuid).await?;
    let mut agent = Agent::restore(&row, provider, Arc::clone(&config), data_dir());
    if agent.model.is_empty() {
        agent.model = config
            .openai_model()
            .unwrap_or("claude-sonnet-4-5")
            .to_string();
        // First run: record the effective provider configuration.
        ikigai_db::agent::update_provider(
            &mut repl_conn,
            &agent.uuid,
            &agent.provider_name,
            &agent.model,
            agent.thinking_level.as_str(),
        )
        .await?;
    }

    let history = ikigai_db::replay::replay_history(&mut agent_conn, &agent.uuid).await?;
    if !history.is_empty() {
        println!("(restored {} messages)", history.len());
    }
    agent.load_history(&history);

    let (tx, mut rx) = mpsc::channel::<AgentEvent>(256);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            print_event(event);
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush().ok();
        let Some(line) = lines.next_line().await? else {
            break; // EOF
        };
        let line = line.trim().to_string();
        if line.is_empty() {
            continue;
        }

        match line.as_str() {
            "/quit" | "/exit" => break,
            "/clear" => {
                agent.clear(&mut agent_conn).await?;
                println!("(history cleared)");
                continue;
            }
            _ if line.starts_with("/pin ") => {
                let path = line["/pin ".len()..].trim().to_string();
                agent.pinned_paths.push(path);
                println!("(pinned {} documents)", agent.pinned_paths.len());
                continue;
            }
            "/unpin" => {
                agent.pinned_paths.clear();
                agent.doc_cache_mut().clear();
                println!("(pins cleared)");
                continue;
            }
            _ if line.starts_with("/model ") => {
                agent.model = line["/model ".len()..].trim().to_string();
                ikigai_db::agent::update_provider(
                    &mut repl_conn,
                    &agent.uuid,
                    &agent.provider_name,
                    &agent.model,
                    agent.thinking_level.as_str(),
                )
                .await?;
                println!("(model set to {})", agent.model);
                continue;
            }
            _ if line.starts_with("/thinking ") => {
                let level = line["/thinking ".len()..].trim();
                let Some(level) = ThinkingLevel::parse(level) else {
                    eprintln!("! unknown thinking level: {level} (none/low/med/high)");
                    continue;
                };
                if let Err(e) = validate_thinking(&agent.model, level) {
                    eprintln!("! {e}");
                    continue;
                }
                agent.thinking_level = level;
                ikigai_db::agent::update_provider(
                    &mut repl_conn,
                    &agent.uuid,
                    &agent.provider_name,
                    &agent.model,
                    agent.thinking_level.as_str(),
                )
                .await?;
                println!("(thinking set to {})", level.as_str());
                continue;
            }
            "/fork" => {
                let branch_point =
                    ikigai_db::message::last_id(&mut agent_conn, &agent.uuid).await?;
                if branch_point == 0 {
                    eprintln!("! nothing to fork from yet");
                    continue;
                }
                let child = agent.fork(branch_point)?;
                ikigai_db::agent::insert(&mut repl_conn, &child.registry_row(session_id)).await?;
                println!("(forked {} at message {branch_point})", child.uuid);
                agent = child;
                continue;
            }
            "/reap" => {
                // Acknowledge the graves of dead agents.
                let mut reaped = 0;
                for row in ikigai_db::agent::list_active(&mut repl_conn).await? {
                    if row.status == "dead" {
                        ikigai_db::agent::mark_reaped(&mut repl_conn, &row.uuid).await?;
                        reaped += 1;
                    }
                }
                println!("({reaped} agents reaped)");
                continue;
            }
            _ => {}
        }

        // Ctrl-C during a turn requests an interrupt; the turn winds down
        // through the state machine rather than being torn out from under it.
        ikigai_db::agent::set_idle(&mut repl_conn, &agent.uuid, false).await?;
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let mut cancel_tx = Some(cancel_tx);
        {
            let submit = agent.submit(&line, &mut agent_conn, &tx, cancel_rx);
            tokio::pin!(submit);
            loop {
                tokio::select! {
                    result = &mut submit => {
                        if let Err(e) = result {
                            eprintln!("error: {e}");
                        }
                        break;
                    }
                    _ = tokio::signal::ctrl_c(), if cancel_tx.is_some() => {
                        if let Some(cancel) = cancel_tx.take() {
                            let _ = cancel.send(());
                        }
                    }
                }
            }
        }
        ikigai_db::agent::set_idle(&mut repl_conn, &agent.uuid, true).await?;
    }

    // Idempotent teardown: every agent still 'running' is flipped to 'dead'.
    let running = ikigai_db::agent::list_running(&mut repl_conn).await?;
    for row in running {
        ikigai_db::agent::mark_dead(&mut repl_conn, &row.uuid).await?;
    }
    ikigai_db::session::end(&mut repl_conn, session_id).await?;
    drop(tx);
    let _ = printer.await;
    Ok(())
}

fn print_event(event: AgentEvent) {
    match event {
        AgentEvent::TextDelta(delta) => {
            print!("{delta}");
            std::io::stdout().flush().ok();
        }
        AgentEvent::TextComplete(_) => println!(),
        AgentEvent::ThinkingDelta(_) => {}
        AgentEvent::ThinkingComplete(_) => println!("(thinking)"),
        AgentEvent::ToolCallStarted { name, arguments, .. } => {
            println!("[tool] {name}({arguments})");
        }
        AgentEvent::ToolCallFinished { name, result_json, .. } => {
            println!("[tool] {name} -> {result_json}");
        }
        AgentEvent::Warning(message) => eprintln!("! {message}"),
        AgentEvent::TokenUsage { input, output, total, .. } => {
            tracing::debug!(input, output, total, "token usage");
        }
        AgentEvent::Aborted => println!("(interrupted)"),
        AgentEvent::TurnComplete => {}
    }
}
