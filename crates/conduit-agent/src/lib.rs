mod builtin;
mod capability;
mod context;
mod guardrail;
mod leader;
mod metadata;
mod registry;
mod template;
mod turn;

pub use builtin::{invoke_and_collect_final, StandardAgent};
pub use capability::{Agent, StepEvent, StepSender};
pub use context::{ContextTokenProvider, RuntimeContext, SearchPolicy, StaticToken, TokenProvider};
pub use guardrail::{is_guardrail_failure, localized_refusal};
pub use leader::LeaderAgent;
pub use metadata::{FinishReason, MessageMetadata, TokenUsage};
pub use registry::{AgentConstructionCtx, AgentConstructor, AgentRegistry};
pub use template::{render, render_with_extra, TemplateValues};
pub use turn::{compose_messages, run_model_once, ModelTurn, PendingCall};

/// Registers every built-in construction recipe this crate ships. Call once
/// at process start before any catalog bootstrap runs, so `class_path`
/// references in the static seed resolve.
pub fn register_builtins(registry: &mut AgentRegistry) {
    use std::sync::Arc;

    registry.register(
        "builtin.standard_agent",
        Arc::new(|name, ctx| Arc::new(StandardAgent::new(name, ctx)) as Arc<dyn Agent>),
    );
    registry.register(
        "builtin.leader",
        Arc::new(|name, ctx| Arc::new(LeaderAgent::new(name, ctx)) as Arc<dyn Agent>),
    );
}
