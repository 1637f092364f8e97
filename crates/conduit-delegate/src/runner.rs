use std::sync::Arc;

use conduit_agent::{invoke_and_collect_final, AgentConstructionCtx, RuntimeContext};
use conduit_factory::AgentFactory;
use conduit_model::Message;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::AgentTaskStore;
use crate::task::{AgentTaskStatus, StatusUpdate};

/// What a delegated agent run is asked to do. Carries everything the
/// activity needs to reconstruct a `RuntimeContext` and a first turn without
/// touching anything outside this value plus the injected factory/store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTaskInput {
    pub task_id: String,
    pub user_id: String,
    pub target_agent: String,
    pub request_text: String,
    #[serde(default)]
    pub context: serde_json::Value,
    /// Present on a resume call — folded into the turn as a follow-up
    /// message rather than resuming a paused graph. This crate's `Agent`
    /// contract has no checkpoint/interrupt primitive (see DESIGN.md), so a
    /// delegated run never produces `BLOCKED`; it always terminates.
    #[serde(default)]
    pub human_input: Option<serde_json::Value>,
}

/// What a delegated agent run produced. `workflow_id`/`run_id` live on the
/// task record, not here — this is just the business outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AgentRunOutcome {
    Completed { final_summary: String, artifacts: Vec<String> },
    Failed { error: String },
}

/// Runs one delegated agent task to completion: warms the target agent
/// under `session_id = task_id`, invokes it, and guarantees C8 teardown
/// regardless of outcome.
pub async fn run_agent_task(
    factory: &AgentFactory,
    construction_ctx: &AgentConstructionCtx,
    input: &AgentTaskInput,
) -> AgentRunOutcome {
    let session_id = input.task_id.clone();
    let outcome = run_agent_task_inner(factory, construction_ctx, input, &session_id).await;
    factory.teardown_session_agents(&session_id).await;
    outcome
}

async fn run_agent_task_inner(
    factory: &AgentFactory,
    construction_ctx: &AgentConstructionCtx,
    input: &AgentTaskInput,
    session_id: &str,
) -> AgentRunOutcome {
    let runtime_context = RuntimeContext::with_static_token(input.user_id.clone(), None);

    let (agent, _cache_hit) = match factory
        .create_and_init(&input.target_agent, runtime_context, session_id, construction_ctx)
        .await
    {
        Ok(built) => built,
        Err(e) => return AgentRunOutcome::Failed { error: e.to_string() },
    };

    let mut message_text = input.request_text.clone();
    if let Some(human_input) = &input.human_input {
        message_text = format!("{message_text}\n\n[human input]: {human_input}");
    }

    match invoke_and_collect_final(agent.as_ref(), vec![Message::user(message_text)]).await {
        Some((message, _metadata)) => AgentRunOutcome::Completed {
            final_summary: message.as_text().unwrap_or_default().to_string(),
            artifacts: Vec::new(),
        },
        None => AgentRunOutcome::Failed {
            error: "delegated agent produced no final message".to_string(),
        },
    }
}

/// Wires the runner's business logic to task-store bookkeeping: marks the
/// task `RUNNING` before invocation and `COMPLETED`/`FAILED` after, so a
/// workflow-engine-registered closure built from [`run_and_record`] keeps
/// the durable record in sync with the workflow's own lifecycle.
pub async fn run_and_record(
    factory: Arc<AgentFactory>,
    construction_ctx: Arc<AgentConstructionCtx>,
    store: Arc<dyn AgentTaskStore>,
    input: AgentTaskInput,
) -> anyhow::Result<serde_json::Value> {
    if let Err(e) = store.update_status(&input.task_id, StatusUpdate::to(AgentTaskStatus::Running)).await {
        warn!(task_id = %input.task_id, error = %e, "failed to mark delegated task running");
    }

    let outcome = run_agent_task(&factory, &construction_ctx, &input).await;

    let (status_update, result_value) = match &outcome {
        AgentRunOutcome::Completed { final_summary, artifacts } => (
            StatusUpdate {
                status: AgentTaskStatus::Completed,
                last_message: Some(final_summary.clone()),
                percent_complete: Some(100.0),
                artifacts: Some(artifacts.clone()),
                ..Default::default()
            },
            serde_json::json!({ "final_summary": final_summary, "artifacts": artifacts }),
        ),
        AgentRunOutcome::Failed { error } => (
            StatusUpdate {
                status: AgentTaskStatus::Failed,
                error_details: Some(error.clone()),
                ..Default::default()
            },
            serde_json::json!({ "error": error }),
        ),
    };

    let failed = matches!(outcome, AgentRunOutcome::Failed { .. });
    if let Err(e) = store.update_status(&input.task_id, status_update).await {
        warn!(task_id = %input.task_id, error = %e, "failed to record delegated task outcome");
    }

    if failed {
        anyhow::bail!(match outcome {
            AgentRunOutcome::Failed { error } => error,
            _ => unreachable!(),
        });
    }
    Ok(result_value)
}
