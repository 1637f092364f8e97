use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Typed carrier for everything the reasoner learns about one turn, in place
/// of an untyped metadata dict bolted onto each assistant message. First-class
/// fields cover the UI's known consumers; anything else goes into `extras`
/// rather than being dropped.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    pub model: Option<String>,
    pub token_usage: Option<TokenUsage>,
    #[serde(default)]
    pub sources: Vec<String>,
    /// Tool payloads keyed by tool name, JSON-decoded where the tool's
    /// output happened to be JSON and left as a string otherwise.
    #[serde(default)]
    pub tools: HashMap<String, Value>,
    pub agent_name: Option<String>,
    pub finish_reason: Option<FinishReason>,
    pub latency_ms: Option<u64>,
    #[serde(default)]
    pub extras: HashMap<String, Value>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    ToolCalls,
    RoundsExhausted,
    Guardrail,
    Error,
}

impl MessageMetadata {
    /// Records a tool's raw output under its name, decoding it as JSON when
    /// possible so the UI can render structured payloads instead of an
    /// opaque string.
    pub fn record_tool_output(&mut self, tool_name: &str, raw: &str) {
        let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
        self.tools.insert(tool_name.to_string(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_tool_output_decodes_json() {
        let mut meta = MessageMetadata::default();
        meta.record_tool_output("search", r#"{"hits":3}"#);
        assert_eq!(meta.tools["search"]["hits"], 3);
    }

    #[test]
    fn record_tool_output_falls_back_to_string() {
        let mut meta = MessageMetadata::default();
        meta.record_tool_output("search", "not json");
        assert_eq!(meta.tools["search"], Value::String("not json".to_string()));
    }
}
