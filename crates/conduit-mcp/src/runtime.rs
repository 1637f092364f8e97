use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use conduit_config::McpServerConfiguration;
use conduit_tools::{Tool, ToolCall, ToolOutput, ToolSchema};
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::client::{HttpMcpClient, McpClient};
use crate::token_provider::TokenProvider;

struct Bound {
    clients: Vec<Arc<dyn McpClient>>,
    tools: Vec<ToolSchema>,
    /// Maps a tool name to the index into `clients` that serves it. Rebuilt
    /// every time the tool list is refreshed.
    routing: HashMap<String, usize>,
}

impl Bound {
    fn empty() -> Self {
        Self {
            clients: Vec::new(),
            tools: Vec::new(),
            routing: HashMap::new(),
        }
    }
}

/// Resolves an agent's tuning-level server name references against the
/// global, process-wide MCP catalog. A name with no match in the catalog is
/// logged and dropped rather than failing agent construction — a dangling
/// reference left over from a catalog edit should degrade the agent's
/// toolkit, not prevent it from starting.
pub fn resolve_servers(names: &[String], catalog: &[McpServerConfiguration]) -> Vec<McpServerConfiguration> {
    names
        .iter()
        .filter_map(|name| {
            let found = catalog.iter().find(|s| &s.name == name);
            if found.is_none() {
                warn!(server = %name, "agent references unknown mcp server; skipping");
            }
            found.cloned()
        })
        .collect()
}

/// Per-agent owner of the MCP connection(s) bound to that agent's tuning, and
/// the toolkit derived from them.
///
/// An agent with no `mcp_servers` (or no access token available from its
/// token provider) runs tool-less: `init()` still succeeds, `get_tools()`
/// returns an empty list, and the reasoner never binds tools to the model.
pub struct McpRuntime {
    servers: Vec<McpServerConfiguration>,
    token_provider: Arc<dyn TokenProvider>,
    bound: RwLock<Bound>,
}

impl McpRuntime {
    pub fn new(servers: Vec<McpServerConfiguration>, token_provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            servers,
            token_provider,
            bound: RwLock::new(Bound::empty()),
        }
    }

    /// Connect to every bound server and assemble the combined toolkit. A
    /// server that fails to connect is logged and skipped rather than
    /// failing the whole agent — a partially-tooled agent is preferable to
    /// one that cannot start at all.
    pub async fn init(&self) -> anyhow::Result<()> {
        if self.servers.is_empty() {
            info!("agent has no bound mcp servers; running tool-less");
            return Ok(());
        }
        if self.token_provider.token().await?.is_none() {
            info!("no access token available; agent runs tool-less this session");
            return Ok(());
        }

        let fresh = self.connect_all().await;
        *self.bound.write().await = fresh;
        Ok(())
    }

    async fn connect_all(&self) -> Bound {
        let mut clients: Vec<Arc<dyn McpClient>> = Vec::new();
        let mut tools = Vec::new();
        let mut routing = HashMap::new();

        for server in &self.servers {
            if !server.enabled {
                continue;
            }
            let client: Arc<dyn McpClient> =
                Arc::new(HttpMcpClient::new(&server.url, self.token_provider.clone()));
            if let Err(e) = client.connect().await {
                warn!(server = %server.name, error = %e, "failed to connect mcp server; skipping");
                continue;
            }
            let server_tools = match client.list_tools().await {
                Ok(t) => t,
                Err(e) => {
                    warn!(server = %server.name, error = %e, "failed to list tools; skipping");
                    continue;
                }
            };
            let idx = clients.len();
            for tool in server_tools {
                routing.insert(tool.name.clone(), idx);
                tools.push(tool);
            }
            clients.push(client);
        }

        Bound {
            clients,
            tools,
            routing,
        }
    }

    /// The latest bound tool list. Always reflects the most recent
    /// successful `init`/`refresh_and_bind` call.
    pub async fn get_tools(&self) -> Vec<ToolSchema> {
        self.bound.read().await.tools.clone()
    }

    pub async fn call(&self, name: &str, args: Value) -> anyhow::Result<ToolOutput> {
        let bound = self.bound.read().await;
        let idx = *bound
            .routing
            .get(name)
            .ok_or_else(|| anyhow::anyhow!(crate::error::McpError::ToolNotFound {
                tool_name: name.to_string(),
            }))?;
        let client = bound.clients[idx].clone();
        drop(bound);
        client.call(name, args).await
    }

    /// Rebuild every connection and swap the toolkit atomically, then close
    /// the previous generation's clients quietly. Called by the resilient
    /// tool node when a call surfaces a timeout, closed stream, or 401.
    pub async fn refresh_and_bind(&self) -> anyhow::Result<()> {
        info!("refreshing mcp connections and rebinding tools");
        let fresh = self.connect_all().await;
        let stale = {
            let mut bound = self.bound.write().await;
            std::mem::replace(&mut *bound, fresh)
        };
        for client in stale.clients {
            if let Err(e) = client.aclose().await {
                warn!(error = %e, "error closing stale mcp client during refresh (ignored)");
            }
        }
        Ok(())
    }

    /// Idempotent, never raises — errors closing individual clients are
    /// logged and swallowed so one misbehaving server never blocks agent
    /// teardown.
    pub async fn aclose(&self) {
        let stale = std::mem::replace(&mut *self.bound.write().await, Bound::empty());
        for client in stale.clients {
            if let Err(e) = client.aclose().await {
                warn!(error = %e, "error closing mcp client (ignored)");
            }
        }
    }
}

/// Adapts one MCP-backed tool into the [`Tool`] seam the resilient tool node
/// executes against, so the reasoner never needs to know a tool call is
/// actually an MCP round trip.
pub struct McpBoundTool {
    schema: ToolSchema,
    runtime: Arc<McpRuntime>,
}

impl McpBoundTool {
    pub fn new(schema: ToolSchema, runtime: Arc<McpRuntime>) -> Self {
        Self { schema, runtime }
    }
}

#[async_trait]
impl Tool for McpBoundTool {
    fn name(&self) -> &str {
        &self.schema.name
    }

    fn description(&self) -> &str {
        &self.schema.description
    }

    fn parameters_schema(&self) -> Value {
        self.schema.parameters.clone()
    }

    async fn execute(&self, call: &ToolCall) -> anyhow::Result<ToolOutput> {
        let mut out = self.runtime.call(&call.name, call.args.clone()).await?;
        out.call_id = call.id.clone();
        Ok(out)
    }
}
