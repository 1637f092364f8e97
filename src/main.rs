// Copyright (c) 2024-2026 Martin Schröder <info@swedishembedded.com>
//
// SPDX-License-Identifier: MIT
mod cli;

use std::collections::HashMap;
use std::sync::Arc;

use clap::Parser;
use conduit_agent::{AgentConstructionCtx, AgentRegistry, RuntimeContext};
use conduit_catalog::{AgentCatalog, AgentKind, AgentScope, AgentSettings, AgentTuning, InMemoryAgentStore};
use conduit_factory::AgentFactory;
use conduit_model::MockProvider;
use conduit_orchestrator::{
    ChatAskInput, InMemoryHistoryStore, InMemorySessionStore, ServerEvent, SessionOrchestrator,
};
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Some(cmd) = &cli.command {
        match cmd {
            Commands::Completions { shell } => {
                cli::print_completions(*shell);
                return Ok(());
            }
            Commands::ShowConfig => {
                let config = conduit_config::load(cli.config.as_deref())?;
                println!("{}", serde_yaml::to_string(&config).unwrap_or_default());
                return Ok(());
            }
            Commands::Agents => {
                let catalog = build_catalog().await;
                for agent in catalog.list(&AgentScope::Global).await {
                    println!("{}\t{:?}\t{}", agent.name, agent.kind, agent.class_path);
                }
                return Ok(());
            }
        }
    }

    let message = match &cli.message {
        Some(m) => m.clone(),
        None => anyhow::bail!("a message is required; see `conduit --help`"),
    };

    let config = conduit_config::load(cli.config.as_deref())?;
    let catalog = Arc::new(build_catalog().await);

    let mut registry = AgentRegistry::new();
    conduit_agent::register_builtins(&mut registry);
    let registry = Arc::new(registry);

    let factory = Arc::new(AgentFactory::new(
        catalog.clone(),
        registry,
        config.storage.agent_cache_capacity,
    ));
    let construction_ctx = AgentConstructionCtx {
        model: Arc::new(MockProvider),
        ai_config: config.ai.clone(),
        mcp_catalog: config.mcp.servers.clone(),
    };
    let orchestrator = SessionOrchestrator::new(
        factory,
        Arc::new(InMemorySessionStore::new()),
        Arc::new(InMemoryHistoryStore::new()),
        construction_ctx,
    );

    let (tx, mut rx) = tokio::sync::mpsc::channel(32);
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                ServerEvent::Stream { message } => {
                    if message.channel != conduit_orchestrator::Channel::Final {
                        eprintln!("[{:?}] {}", message.channel, message.text());
                    }
                }
                ServerEvent::Final { messages, session } => {
                    for m in messages {
                        println!("{}", m.text());
                    }
                    eprintln!("-- session: {}", session.id);
                }
                ServerEvent::Error { content, .. } => {
                    eprintln!("error: {content}");
                }
            }
        }
    });

    let input = ChatAskInput {
        user_id: cli.user,
        session_id: cli.session,
        message,
        agent_name: cli.agent,
        runtime_context: RuntimeContext::with_static_token("local", None),
        client_exchange_id: None,
    };
    let result = orchestrator.run_exchange(input, tx).await;
    let _ = printer.await;
    result.map(|_| ())
}

/// Seeds the in-memory catalog used by the CLI with the built-in agents.
///
/// A real deployment drives this from `ai.agents[]` in the loaded
/// configuration; this crate's `AiConfig` does not carry that list yet (see
/// DESIGN.md), so the CLI seeds a fixed starter set directly.
async fn build_catalog() -> AgentCatalog {
    let mut registry = AgentRegistry::new();
    conduit_agent::register_builtins(&mut registry);

    let catalog = AgentCatalog::new(Arc::new(InMemoryAgentStore::new()), Arc::new(registry));
    catalog.bootstrap(vec![default_assistant()]).await;
    catalog
}

fn default_assistant() -> AgentSettings {
    let mut values = HashMap::new();
    values.insert(
        "system_prompt".to_string(),
        serde_json::Value::String(
            "You are conduit's built-in assistant. Today is {today}.".to_string(),
        ),
    );
    AgentSettings {
        name: "assistant".to_string(),
        enabled: true,
        class_path: "builtin.standard_agent".to_string(),
        kind: AgentKind::Agent,
        tuning: AgentTuning {
            fields: Vec::new(),
            values,
            mcp_servers: Vec::new(),
        },
        crew: Vec::new(),
        scope: AgentScope::Global,
        static_seeded: false,
    }
}

fn init_logging(verbosity: u8) {
    let default_level = match verbosity {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init();
}
