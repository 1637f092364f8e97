use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{oneshot, Mutex, OnceCell};

/// Whether starting a workflow under an id already in flight is an error.
/// The durable engine this is modeled on defaults to rejecting duplicates;
/// `AllowDuplicate` exists for callers that intentionally re-trigger the
/// same logical task (e.g. a manual retry).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdReusePolicy {
    RejectDuplicate,
    AllowDuplicate,
}

impl Default for IdReusePolicy {
    fn default() -> Self {
        IdReusePolicy::RejectDuplicate
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("workflow id {id:?} is already running and duplicate ids are rejected")]
    DuplicateWorkflowId { id: String },

    #[error("no workflow registered under name {name:?}")]
    UnknownWorkflow { name: String },

    #[error("child workflow failed: {0}")]
    ChildFailed(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowRunStatus {
    Running,
    Completed,
    Failed,
}

pub type WorkflowFn =
    Arc<dyn Fn(serde_json::Value) -> Pin<Box<dyn Future<Output = anyhow::Result<serde_json::Value>> + Send>> + Send + Sync>;

/// A handle to one in-flight or finished workflow execution. Mirrors the
/// shape of a durable-engine client handle closely enough that a real
/// Temporal-backed implementor could satisfy the same trait without the
/// delegation bridge or runner noticing the difference.
#[async_trait]
pub trait WorkflowHandle: Send + Sync {
    fn workflow_id(&self) -> &str;
    async fn result(&self) -> Result<serde_json::Value, WorkflowError>;
    async fn describe(&self) -> WorkflowRunStatus;
}

#[async_trait]
pub trait WorkflowEngine: Send + Sync {
    async fn start_workflow(
        &self,
        name: &str,
        payload: serde_json::Value,
        id: &str,
        task_queue: &str,
        id_reuse_policy: IdReusePolicy,
    ) -> Result<Arc<dyn WorkflowHandle>, WorkflowError>;
}

struct InMemoryWorkflowHandle {
    id: String,
    status: Arc<Mutex<WorkflowRunStatus>>,
    rx: Mutex<Option<oneshot::Receiver<anyhow::Result<serde_json::Value>>>>,
    cached: OnceCell<Result<serde_json::Value, String>>,
}

#[async_trait]
impl WorkflowHandle for InMemoryWorkflowHandle {
    fn workflow_id(&self) -> &str {
        &self.id
    }

    async fn result(&self) -> Result<serde_json::Value, WorkflowError> {
        let resolved = self
            .cached
            .get_or_init(|| async {
                let mut guard = self.rx.lock().await;
                match guard.take() {
                    Some(rx) => match rx.await {
                        Ok(Ok(value)) => Ok(value),
                        Ok(Err(e)) => Err(e.to_string()),
                        Err(_) => Err("workflow task ended without producing a result".to_string()),
                    },
                    None => Err("workflow result already consumed by a concurrent caller".to_string()),
                }
            })
            .await
            .clone();
        resolved.map_err(WorkflowError::ChildFailed)
    }

    async fn describe(&self) -> WorkflowRunStatus {
        *self.status.lock().await
    }
}

/// Single-process stand-in for a durable workflow engine: the "child
/// workflow" is a spawned task rather than a separately-scheduled durable
/// execution. Suitable for tests and single-node deployments; a Temporal-
/// backed `WorkflowEngine` implementor can replace this without the
/// delegation bridge or task runner changing.
#[derive(Default)]
pub struct InMemoryWorkflowEngine {
    workflows: HashMap<String, WorkflowFn>,
    running: Arc<Mutex<HashSet<String>>>,
}

impl InMemoryWorkflowEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, f: WorkflowFn) {
        self.workflows.insert(name.into(), f);
    }
}

#[async_trait]
impl WorkflowEngine for InMemoryWorkflowEngine {
    async fn start_workflow(
        &self,
        name: &str,
        payload: serde_json::Value,
        id: &str,
        _task_queue: &str,
        id_reuse_policy: IdReusePolicy,
    ) -> Result<Arc<dyn WorkflowHandle>, WorkflowError> {
        if id_reuse_policy == IdReusePolicy::RejectDuplicate {
            let mut running = self.running.lock().await;
            if !running.insert(id.to_string()) {
                return Err(WorkflowError::DuplicateWorkflowId { id: id.to_string() });
            }
        }

        let workflow_fn = self
            .workflows
            .get(name)
            .cloned()
            .ok_or_else(|| WorkflowError::UnknownWorkflow { name: name.to_string() })?;

        let status = Arc::new(Mutex::new(WorkflowRunStatus::Running));
        let status_for_task = status.clone();
        let running_ids = self.running.clone();
        let id_owned = id.to_string();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let outcome = workflow_fn(payload).await;
            *status_for_task.lock().await = if outcome.is_ok() {
                WorkflowRunStatus::Completed
            } else {
                WorkflowRunStatus::Failed
            };
            running_ids.lock().await.remove(&id_owned);
            let _ = tx.send(outcome);
        });

        Ok(Arc::new(InMemoryWorkflowHandle {
            id: id.to_string(),
            status,
            rx: Mutex::new(Some(rx)),
            cached: OnceCell::new(),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn echo_workflow() -> WorkflowFn {
        Arc::new(|payload| Box::pin(async move { Ok(payload) }))
    }

    fn failing_workflow() -> WorkflowFn {
        Arc::new(|_payload| Box::pin(async move { anyhow::bail!("boom") }))
    }

    #[tokio::test]
    async fn completed_workflow_returns_its_payload() {
        let mut engine = InMemoryWorkflowEngine::new();
        engine.register("echo", echo_workflow());

        let handle = engine
            .start_workflow("echo", serde_json::json!({"hello": "world"}), "wf-1", "q", IdReusePolicy::RejectDuplicate)
            .await
            .unwrap();

        let result = handle.result().await.unwrap();
        assert_eq!(result, serde_json::json!({"hello": "world"}));
        assert_eq!(handle.describe().await, WorkflowRunStatus::Completed);
    }

    #[tokio::test]
    async fn result_can_be_awaited_more_than_once() {
        let mut engine = InMemoryWorkflowEngine::new();
        engine.register("echo", echo_workflow());
        let handle = engine
            .start_workflow("echo", serde_json::json!(1), "wf-2", "q", IdReusePolicy::RejectDuplicate)
            .await
            .unwrap();

        assert!(handle.result().await.is_ok());
        assert!(handle.result().await.is_ok(), "result must be memoized, not re-consumed");
    }

    #[tokio::test]
    async fn failing_workflow_surfaces_as_child_failed() {
        let mut engine = InMemoryWorkflowEngine::new();
        engine.register("fails", failing_workflow());
        let handle = engine
            .start_workflow("fails", serde_json::json!(null), "wf-3", "q", IdReusePolicy::RejectDuplicate)
            .await
            .unwrap();

        let result = handle.result().await;
        assert!(matches!(result, Err(WorkflowError::ChildFailed(_))));
        assert_eq!(handle.describe().await, WorkflowRunStatus::Failed);
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected_while_running() {
        let gate = Arc::new(tokio::sync::Notify::new());
        let gate_for_workflow = gate.clone();
        let held_workflow: WorkflowFn = Arc::new(move |payload| {
            let gate = gate_for_workflow.clone();
            Box::pin(async move {
                gate.notified().await;
                Ok(payload)
            })
        });

        let mut engine = InMemoryWorkflowEngine::new();
        engine.register("held", held_workflow);
        let first = engine
            .start_workflow("held", serde_json::json!(1), "wf-dup", "q", IdReusePolicy::RejectDuplicate)
            .await
            .unwrap();

        let second = engine
            .start_workflow("held", serde_json::json!(1), "wf-dup", "q", IdReusePolicy::RejectDuplicate)
            .await;
        assert!(matches!(second, Err(WorkflowError::DuplicateWorkflowId { .. })));

        gate.notify_one();
        first.result().await.unwrap();
    }

    #[tokio::test]
    async fn unknown_workflow_name_is_rejected() {
        let engine = InMemoryWorkflowEngine::new();
        let result = engine
            .start_workflow("ghost", serde_json::json!(null), "wf-4", "q", IdReusePolicy::RejectDuplicate)
            .await;
        assert!(matches!(result, Err(WorkflowError::UnknownWorkflow { .. })));
    }
}
