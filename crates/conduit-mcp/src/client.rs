use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use conduit_tools::{ToolOutput, ToolSchema};
use serde_json::{json, Value};

use crate::token_provider::TokenProvider;

/// One connection to an MCP server: list its tools, invoke them, and close
/// the connection. The wire framing (stdio, SSE, streamable HTTP) is an
/// implementation detail of each adapter; callers only see this façade.
#[async_trait]
pub trait McpClient: Send + Sync {
    async fn connect(&self) -> anyhow::Result<()>;
    async fn list_tools(&self) -> anyhow::Result<Vec<ToolSchema>>;
    async fn call(&self, tool_name: &str, args: Value) -> anyhow::Result<ToolOutput>;
    async fn aclose(&self) -> anyhow::Result<()>;
}

/// MCP client speaking JSON-RPC 2.0 over a streamable HTTP endpoint, the
/// transport most enterprise MCP servers expose behind a reverse proxy.
///
/// Bearer credentials are resolved through a [`TokenProvider`] rather than
/// stored as a plain string, so a server the runtime holds open across many
/// calls can pick up a refreshed token without reconnecting.
pub struct HttpMcpClient {
    http: reqwest::Client,
    endpoint: String,
    token_provider: Arc<dyn TokenProvider>,
}

impl HttpMcpClient {
    pub fn new(endpoint: impl Into<String>, token_provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            http: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("reqwest client builds with static config"),
            endpoint: endpoint.into(),
            token_provider,
        }
    }

    async fn request(&self, method: &str, params: Value) -> anyhow::Result<Value> {
        let mut req = self.http.post(&self.endpoint).json(&json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        }));
        if let Some(token) = self.token_provider.token().await? {
            req = req.bearer_auth(token);
        }
        let resp = req.send().await?;
        if resp.status().as_u16() == 401 {
            anyhow::bail!(conduit_tools::AuthExpiredError);
        }
        let body: Value = resp.error_for_status()?.json().await?;
        if let Some(error) = body.get("error") {
            anyhow::bail!("MCP server error: {error}");
        }
        Ok(body.get("result").cloned().unwrap_or(Value::Null))
    }
}

#[async_trait]
impl McpClient for HttpMcpClient {
    async fn connect(&self) -> anyhow::Result<()> {
        self.request("initialize", json!({})).await?;
        Ok(())
    }

    async fn list_tools(&self) -> anyhow::Result<Vec<ToolSchema>> {
        let result = self.request("tools/list", json!({})).await?;
        let tools = result
            .get("tools")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();
        let schemas = tools
            .into_iter()
            .filter_map(|t| {
                Some(ToolSchema {
                    name: t.get("name")?.as_str()?.to_string(),
                    description: t
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    parameters: t.get("inputSchema").cloned().unwrap_or(json!({"type": "object"})),
                })
            })
            .collect();
        Ok(schemas)
    }

    async fn call(&self, tool_name: &str, args: Value) -> anyhow::Result<ToolOutput> {
        let result = self
            .request("tools/call", json!({"name": tool_name, "arguments": args}))
            .await?;
        let is_error = result
            .get("isError")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        let content = result
            .get("content")
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|p| p.get("text").and_then(Value::as_str))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default();
        Ok(ToolOutput {
            call_id: String::new(),
            content,
            is_error,
        })
    }

    async fn aclose(&self) -> anyhow::Result<()> {
        Ok(())
    }
}
