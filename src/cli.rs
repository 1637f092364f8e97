// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "conduit",
    about = "Agent-orchestration runtime: catalog, reasoner/tool loop, session orchestrator",
    version,
    long_about = None,
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Message to send to the agent for this exchange. Omit when using a subcommand.
    #[arg(value_name = "MESSAGE")]
    pub message: Option<String>,

    /// Name of the catalog agent to address (see `conduit agents`).
    #[arg(long, short = 'a', default_value = "assistant")]
    pub agent: String,

    /// Resume an existing session by id. Omit to start a fresh session
    /// (its generated id is printed after the exchange completes).
    #[arg(long, short = 's')]
    pub session: Option<String>,

    /// User id the session is scoped to.
    #[arg(long, short = 'u', default_value = "local")]
    pub user: String,

    /// Path to config file (overrides auto-discovery).
    #[arg(long, short = 'c')]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v = debug, -vv = trace).
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print the effective configuration and exit.
    ShowConfig,
    /// List the agents currently seeded in the global catalog.
    Agents,
    /// Generate a shell completion script.
    Completions {
        #[arg(value_enum)]
        shell: Shell,
    },
}

pub fn print_completions(shell: Shell) {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "conduit", &mut std::io::stdout());
}
