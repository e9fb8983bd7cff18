// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "ikigai", about = "A terminal-resident runtime for conversational AI agents")]
pub struct Cli {
    /// Explicit config file path (overrides the search path)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log to stderr at debug level (RUST_LOG still wins when set)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Apply pending schema migrations and exit
    Migrate {
        /// Directory holding NNNN-description.sql files
        #[arg(long, default_value = "migrations")]
        dir: PathBuf,
    },
    /// Print the effective configuration as YAML
    ShowConfig,
    /// List agents recorded in the registry
    Agents,
}
