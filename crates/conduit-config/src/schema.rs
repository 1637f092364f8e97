use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Top-level configuration tree, assembled by [`crate::load`] from the layered
/// search path and any explicit override file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub app: AppConfig,
    #[serde(default)]
    pub ai: AiConfig,
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

/// Process-level identity and network binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub name: String,
    /// `"development"`, `"staging"`, `"production"` — free-form, used only
    /// for log enrichment and does not gate behavior.
    pub environment: String,
    pub bind_addr: String,
    pub listen_port: u16,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            name: "conduit".to_string(),
            environment: "development".to_string(),
            bind_addr: "127.0.0.1".to_string(),
            listen_port: 8080,
        }
    }
}

/// Tunables for the reasoner/tool loop shared by every agent unless a specific
/// agent's tuning block overrides them (see `conduit_catalog::AgentTuning`).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AiConfig {
    /// Upper bound on reasoner↔tool round trips before the loop is forced to
    /// wrap up with a final, tool-free turn.
    pub max_tool_rounds: u32,
    /// Per-tool-call timeout in the resilient tool node, in seconds.
    pub tool_call_timeout_secs: u64,
    /// How often the delegation bridge polls a durable task for a heartbeat.
    pub heartbeat_interval_secs: u64,
    /// Language used to localize guardrail/refusal strings when the caller's
    /// runtime context does not specify one. ISO 639-1 code.
    pub default_language: String,
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 16,
            tool_call_timeout_secs: 8,
            heartbeat_interval_secs: 25,
            default_language: "en".to_string(),
        }
    }
}

/// Default MCP server configuration, layered under any per-server overrides
/// declared on an agent's tuning block.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct McpConfig {
    pub connect_timeout_secs: u64,
    /// Re-fetch the tool list from every bound MCP server at most this often.
    pub refresh_interval_secs: u64,
    /// The process-wide, read-only-after-load catalog of MCP servers. An
    /// agent's tuning references entries here by `name`; the catalog itself
    /// is never mutated by a running agent.
    #[serde(default)]
    pub servers: Vec<McpServerConfiguration>,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            connect_timeout_secs: 10,
            refresh_interval_secs: 300,
            servers: Vec::new(),
        }
    }
}

/// Connection details for one MCP server in the global catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpServerConfiguration {
    pub name: String,
    /// Transport the agent's toolkit should dial this server with. Only
    /// `streamable-http` is implemented; other values are accepted for
    /// forward-compatibility and treated like `streamable-http`.
    #[serde(default = "default_transport")]
    pub transport: String,
    pub url: String,
    #[serde(default)]
    pub auth: McpAuth,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_transport() -> String {
    "streamable-http".to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum McpAuth {
    #[default]
    None,
    Bearer {
        token: String,
    },
    OAuth {
        token_provider_ref: String,
    },
}

/// Storage backend selection and sizing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Only `"memory"` is implemented; the field exists so a future
    /// persistent backend can be selected without an incompatible schema
    /// change.
    pub backend: String,
    /// Maximum number of warm `(session_id, agent_name)` agent instances kept
    /// alive in the session cache.
    pub agent_cache_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            agent_cache_capacity: 256,
        }
    }
}

/// Access control knobs enforced at the gateway boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    /// When true, `ChatAskInput.runtime_context.access_token` must be present
    /// and non-empty for the exchange to proceed.
    pub require_access_token: bool,
    pub allowed_origins: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            require_access_token: false,
            allowed_origins: vec!["*".to_string()],
        }
    }
}

/// A single field in an agent's tuning schema, rendered for a settings UI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub key: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub default: Option<serde_json::Value>,
    #[serde(default)]
    pub ui_hints: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    Prompt,
    Text,
    Integer,
    Boolean,
}
