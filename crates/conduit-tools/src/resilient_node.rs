use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use crate::registry::ToolRegistry;
use crate::tool::{AuthExpiredError, ToolCall, ToolOutput};

/// Outcome of one tool call as seen by the reasoner/tool loop.
///
/// This replaces exception-based control flow for tool failures: every path
/// through [`ResilientToolNode::execute`] returns a value, never a panic or
/// propagated error, because exactly one of these must be turned into a
/// tool-result message for the pending call.
#[derive(Debug, Clone)]
pub enum ToolExecutionOutcome {
    Ok(ToolOutput),
    /// The tool could not complete the call. `should_refresh` is set for a
    /// timeout or a transport-closed failure (detected by a string match
    /// against the cause chain) — the same set of faults that, alongside
    /// 401, warrant an MCP refresh-and-rebind before the next tick. Any
    /// other exception or non-401 HTTP error leaves it `false`: the
    /// reasoner still gets a fallback tool-result, but no refresh is
    /// triggered.
    Unavailable {
        call_id: String,
        reason: String,
        should_refresh: bool,
    },
    /// The tool signaled that its upstream credential has expired (HTTP 401
    /// anywhere in the cause chain). Always implies a refresh.
    AuthExpired { call_id: String },
}

impl ToolExecutionOutcome {
    pub fn call_id(&self) -> &str {
        match self {
            Self::Ok(out) => &out.call_id,
            Self::Unavailable { call_id, .. } => call_id,
            Self::AuthExpired { call_id } => call_id,
        }
    }

    /// Whether this outcome should trigger `refresh_cb()` (MCP
    /// refresh-and-rebind) before the reasoner's next tick.
    pub fn should_refresh(&self) -> bool {
        match self {
            Self::Ok(_) => false,
            Self::Unavailable { should_refresh, .. } => *should_refresh,
            Self::AuthExpired { .. } => true,
        }
    }

    /// Render as a tool-result message body for the reasoner, regardless of
    /// which variant this is — the loop always gets exactly one string back
    /// per pending call. The `[tool_unavailable]` prefix is the fixed,
    /// human-readable note every fallback path carries.
    pub fn into_tool_output(self) -> ToolOutput {
        match self {
            Self::Ok(out) => out,
            Self::Unavailable { call_id, reason, .. } => {
                ToolOutput::err(call_id, format!("[tool_unavailable] {reason}"))
            }
            Self::AuthExpired { call_id } => ToolOutput::err(
                call_id,
                "[tool_unavailable] authentication expired; credential refresh required",
            ),
        }
    }
}

/// Heuristic for "closed stream" failures the cause chain can carry as
/// plain text (the MCP transport's own error type is outside this crate's
/// non-goal boundary, so a string match is the only seam available here).
fn looks_like_closed_stream(err: &anyhow::Error) -> bool {
    err.chain()
        .any(|c| {
            let s = c.to_string().to_lowercase();
            s.contains("closed stream") || s.contains("connection closed") || s.contains("stream closed")
        })
}

/// Executes tool calls against a [`ToolRegistry`] with a bounded per-call
/// timeout, translating timeouts, panics, unknown tool names, and expired
/// credentials into [`ToolExecutionOutcome`] values instead of letting any of
/// them escape as an error the caller must handle specially.
pub struct ResilientToolNode {
    registry: Arc<ToolRegistry>,
    timeout: Duration,
}

impl ResilientToolNode {
    pub fn new(registry: Arc<ToolRegistry>, timeout: Duration) -> Self {
        Self { registry, timeout }
    }

    /// Execute a single call to completion, never returning an `Err`.
    pub async fn execute(&self, call: ToolCall) -> ToolExecutionOutcome {
        let call_id = call.id.clone();

        let Some(tool) = self.registry.get(&call.name) else {
            return ToolExecutionOutcome::Unavailable {
                call_id,
                reason: format!("unknown tool {:?}", call.name),
                should_refresh: false,
            };
        };

        let fut = tool.execute(&call);
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(output)) => ToolExecutionOutcome::Ok(output),
            Ok(Err(e)) => {
                if e.downcast_ref::<AuthExpiredError>().is_some() {
                    ToolExecutionOutcome::AuthExpired { call_id }
                } else {
                    let should_refresh = looks_like_closed_stream(&e);
                    warn!(tool = %call.name, error = %e, should_refresh, "tool call failed");
                    ToolExecutionOutcome::Unavailable {
                        call_id,
                        reason: e.to_string(),
                        should_refresh,
                    }
                }
            }
            Err(_elapsed) => {
                warn!(tool = %call.name, timeout = ?self.timeout, "tool call timed out");
                ToolExecutionOutcome::Unavailable {
                    call_id,
                    reason: format!("tool call timed out after {:?}", self.timeout),
                    should_refresh: true,
                }
            }
        }
    }

    /// Execute many calls concurrently, preserving the caller's ordering in
    /// the returned vector regardless of completion order. Every pending
    /// call produces exactly one outcome, including calls whose spawned task
    /// panics.
    pub async fn execute_many(&self, calls: Vec<ToolCall>) -> Vec<ToolExecutionOutcome> {
        let mut tasks = Vec::with_capacity(calls.len());
        for call in calls {
            let registry = self.registry.clone();
            let timeout = self.timeout;
            let call_id = call.id.clone();
            let handle = tokio::spawn(async move {
                let node = ResilientToolNode { registry, timeout };
                node.execute(call).await
            });
            tasks.push((call_id, handle));
        }

        let mut outcomes = Vec::with_capacity(tasks.len());
        for (call_id, handle) in tasks {
            let outcome = handle.await.unwrap_or_else(|join_err| {
                warn!(error = %join_err, "tool call task panicked");
                ToolExecutionOutcome::Unavailable {
                    call_id,
                    reason: "tool call task panicked".to_string(),
                    should_refresh: false,
                }
            });
            outcomes.push(outcome);
        }
        outcomes
    }
}
