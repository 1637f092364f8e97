use std::sync::Arc;

use async_trait::async_trait;
use conduit_catalog::AgentSettings;
use conduit_model::Message;
use tokio::sync::mpsc;

use crate::context::RuntimeContext;
use crate::metadata::MessageMetadata;

/// One unit of progress an agent emits while driving a turn. The session
/// orchestrator forwards every variant except `Final` over its websocket
/// streaming callback as soon as it arrives; `Final` ends the turn and is
/// also what gets persisted as the exchange's assistant message(s).
#[derive(Debug, Clone)]
pub enum StepEvent {
    Thought(String),
    ToolResult { tool_name: String, content: String },
    Plan(String),
    Final {
        message: Message,
        metadata: MessageMetadata,
    },
}

pub type StepSender = mpsc::Sender<StepEvent>;

/// Capability contract every agent and leader implementation satisfies.
///
/// This is the Rust rendering of the duck-typed method set the original
/// integration relied on (`async_init`, `get_compiled_graph`,
/// `apply_settings`, `set_runtime_context`, `aclose`) as a single trait
/// rather than reflection over a dynamically imported class. `invoke` is
/// this trait's `get_compiled_graph().invoke(...)`: there is no separate
/// "compile" step in a statically-typed implementation, so construction
/// itself produces something ready to invoke.
///
/// A leader is simply an `Agent` whose `async_init` received a non-empty
/// `crew`; there is no separate trait to keep a leader's crew-dispatch
/// uniform with the factory's construction path (see `conduit-factory`).
#[async_trait]
pub trait Agent: Send + Sync {
    fn name(&self) -> &str;

    /// Apply (or re-apply) this agent's catalog definition. Always called
    /// before `async_init`.
    async fn apply_settings(&self, settings: AgentSettings) -> anyhow::Result<()>;

    /// Install a fresh runtime context — e.g. a cache hit refreshing an
    /// access token on an already-warm instance. Always called before
    /// `async_init` on first construction, and may be called again later.
    async fn set_runtime_context(&self, ctx: RuntimeContext) -> anyhow::Result<()>;

    /// One-time setup: connect bound MCP servers and, for a leader, record
    /// its crew. `crew` is empty for a plain agent.
    async fn async_init(&self, crew: Vec<Arc<dyn Agent>>) -> anyhow::Result<()>;

    /// Drive one exchange to completion, streaming intermediate steps over
    /// `sender` and finishing with exactly one `StepEvent::Final`. Never
    /// panics and never leaves the sender without a `Final` — a failure
    /// inside the loop is itself reported as a `Final` fallback message.
    async fn invoke(&self, history: Vec<Message>, sender: StepSender);

    /// Idempotent teardown; never raises.
    async fn aclose(&self);
}
