use std::collections::HashMap;

use conduit_config::FieldSpec;
use serde::{Deserialize, Serialize};

/// Identifies who an agent definition is visible to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AgentScope {
    /// Visible to every user.
    Global,
    /// Visible only to the owning user.
    User { user_id: String },
}

/// Discriminates a plain tool-using agent from a crew-dispatching leader.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentKind {
    Agent,
    Leader,
}

/// The customizable portion of an agent definition: the fields its tuning UI
/// exposes, the values currently filled in, and the MCP servers it binds.
///
/// `mcp_servers` holds names that reference entries in the global,
/// process-wide MCP server catalog (`conduit_config::McpConfig::servers`),
/// not inline connection details — the catalog is the single place a server
/// endpoint or credential is configured.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentTuning {
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
    #[serde(default)]
    pub values: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub mcp_servers: Vec<String>,
}

impl AgentTuning {
    pub fn string_value(&self, key: &str) -> Option<&str> {
        self.values.get(key).and_then(|v| v.as_str())
    }
}

/// A single agent (or leader) definition as stored in the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSettings {
    pub name: String,
    pub enabled: bool,
    /// Dotted construction key looked up in the static agent registry.
    /// Retained from the original dynamic-import design purely as a
    /// human-readable identifier; resolution never imports code at runtime.
    pub class_path: String,
    #[serde(rename = "type")]
    pub kind: AgentKind,
    #[serde(default)]
    pub tuning: AgentTuning,
    /// Named crew members this leader may dispatch to. Empty for `Agent`.
    #[serde(default)]
    pub crew: Vec<String>,
    pub scope: AgentScope,
    /// Set when this row originated from the static seed file rather than
    /// being created through the read/write API. Re-running the bootstrap
    /// ingest step is idempotent with respect to this marker: a seeded row
    /// that a user has since edited keeps their edits.
    #[serde(default)]
    pub static_seeded: bool,
}

/// Names no caller may register — reserved for internal bookkeeping agents.
pub const RESERVED_NAME_PREFIXES: &[&str] = &["system.", "_internal."];

pub fn is_reserved_name(name: &str) -> bool {
    RESERVED_NAME_PREFIXES
        .iter()
        .any(|prefix| name.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reserved_name_prefixes_are_rejected() {
        assert!(is_reserved_name("system.bootstrap"));
        assert!(is_reserved_name("_internal.audit"));
        assert!(!is_reserved_name("research-assistant"));
    }

    #[test]
    fn agent_tuning_default_has_empty_collections() {
        let tuning = AgentTuning::default();
        assert!(tuning.fields.is_empty());
        assert!(tuning.mcp_servers.is_empty());
    }

    #[test]
    fn agent_tuning_mcp_servers_are_name_references() {
        let mut tuning = AgentTuning::default();
        tuning.mcp_servers.push("search".to_string());
        assert_eq!(tuning.mcp_servers, vec!["search".to_string()]);
    }
}
