use async_trait::async_trait;
use serde_json::Value;

/// A single tool invocation requested by the model or by a leader dispatching
/// to a crew member.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Opaque identifier the model attached to this call; forwarded verbatim
    /// in the matching result so the reasoner can pair them up.
    pub id: String,
    pub name: String,
    pub args: Value,
}

/// A successful tool result.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub call_id: String,
    pub content: String,
    pub is_error: bool,
}

impl ToolOutput {
    pub fn ok(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: false,
        }
    }

    pub fn err(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            call_id: call_id.into(),
            content: content.into(),
            is_error: true,
        }
    }
}

/// Describes the shape of a tool's output for context-aware truncation when
/// a result exceeds the agent's configured token cap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputCategory {
    /// Ordered match list: keep the leading entries.
    MatchList,
    /// Structured record or document: keep head and tail so both the
    /// identifying prefix and the final state are visible.
    Record,
    /// Hard-truncate at the character boundary.
    #[default]
    Generic,
}

/// A sentinel a tool can raise from `execute` to signal that its upstream
/// credential has expired, distinct from an ordinary failure. The resilient
/// tool node maps this to `ToolExecutionOutcome::AuthExpired` rather than a
/// plain error result, so callers can trigger a token refresh instead of
/// just reporting failure text to the model.
#[derive(Debug, thiserror::Error)]
#[error("credential expired")]
pub struct AuthExpiredError;

/// Trait every tool bound to an agent must implement.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for the tool's parameters object.
    fn parameters_schema(&self) -> Value;
    fn output_category(&self) -> OutputCategory {
        OutputCategory::Generic
    }
    /// Execute the tool. Returning `Err` signals a retryable/transient fault;
    /// the resilient tool node (not this trait) decides how that surfaces to
    /// the reasoner. A tool that detects an expired credential should return
    /// `Err(AuthExpiredError.into())`.
    async fn execute(&self, call: &ToolCall) -> anyhow::Result<ToolOutput>;
}

#[derive(Debug, Clone)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}
