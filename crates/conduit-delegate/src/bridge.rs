use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

use crate::workflow::{IdReusePolicy, WorkflowEngine, WorkflowError, WorkflowHandle, WorkflowRunStatus};

pub const AGENT_TASK_WORKFLOW: &str = "agent_task";

#[derive(Debug, Clone)]
pub struct SubmitResult {
    pub workflow_id: String,
    pub task_id: String,
}

/// Emitted while `wait_with_heartbeat` is still waiting on a delegated
/// agent, so a caller can surface liveness to a user without the child
/// having actually produced a result yet.
#[derive(Debug, Clone, Serialize)]
pub struct Heartbeat {
    pub label: String,
    pub phase: &'static str,
    pub workflow_id: String,
}

#[derive(Debug, Clone)]
pub struct DelegationStatus {
    pub status: WorkflowRunStatus,
    pub final_summary: Option<String>,
    pub error: Option<String>,
}

/// Bridges a live agent turn to a durable, long-running delegated task.
/// Used when an agent's tool call should hand off to another agent as a
/// background job rather than block the reasoner loop on it directly.
pub struct DelegationBridge {
    engine: Arc<dyn WorkflowEngine>,
    task_queue: String,
}

impl DelegationBridge {
    pub fn new(engine: Arc<dyn WorkflowEngine>, task_queue: impl Into<String>) -> Self {
        Self {
            engine,
            task_queue: task_queue.into(),
        }
    }

    /// Starts the delegated agent as a new workflow execution, generating
    /// both a task id (the durable record's primary key) and a workflow id
    /// (the handle into the engine).
    pub async fn submit(
        &self,
        target_agent: &str,
        request_text: &str,
        user_id: &str,
        context: serde_json::Value,
    ) -> Result<(SubmitResult, Arc<dyn WorkflowHandle>), WorkflowError> {
        let task_id = Uuid::new_v4().to_string();
        let workflow_id = format!("delegate-{}", Uuid::new_v4());
        let payload = json!({
            "task_id": task_id,
            "user_id": user_id,
            "target_agent": target_agent,
            "request_text": request_text,
            "context": context,
        });

        let handle = self
            .engine
            .start_workflow(
                AGENT_TASK_WORKFLOW,
                payload,
                &workflow_id,
                &self.task_queue,
                IdReusePolicy::RejectDuplicate,
            )
            .await?;

        Ok((
            SubmitResult {
                workflow_id,
                task_id,
            },
            handle,
        ))
    }

    /// Waits for `handle` to finish, calling `on_heartbeat` every `every`
    /// while it is still running. Returns the child's result verbatim.
    pub async fn wait_with_heartbeat<F>(
        &self,
        handle: Arc<dyn WorkflowHandle>,
        every: Duration,
        mut on_heartbeat: F,
    ) -> Result<serde_json::Value, WorkflowError>
    where
        F: FnMut(Heartbeat),
    {
        loop {
            match tokio::time::timeout(every, handle.result()).await {
                Ok(result) => return result,
                Err(_elapsed) => {
                    info!(workflow_id = handle.workflow_id(), "still waiting on delegated agent");
                    on_heartbeat(Heartbeat {
                        label: "waiting for delegated agent".to_string(),
                        phase: "delegated_agent",
                        workflow_id: handle.workflow_id().to_string(),
                    });
                }
            }
        }
    }

    /// Describes the handle and, if it has completed, best-effort fetches
    /// the result to surface a summary or error alongside the status.
    pub async fn status(&self, handle: &Arc<dyn WorkflowHandle>) -> DelegationStatus {
        let status = handle.describe().await;
        if status != WorkflowRunStatus::Completed {
            return DelegationStatus {
                status,
                final_summary: None,
                error: None,
            };
        }

        match handle.result().await {
            Ok(value) => DelegationStatus {
                status,
                final_summary: value
                    .get("final_summary")
                    .and_then(|s| s.as_str())
                    .map(str::to_string),
                error: None,
            },
            Err(e) => DelegationStatus {
                status: WorkflowRunStatus::Failed,
                final_summary: None,
                error: Some(e.to_string()),
            },
        }
    }
}
