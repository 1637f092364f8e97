use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle of a durable agent task. Transitions are enforced by the store,
/// not by callers — see [`allowed_transition`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentTaskStatus {
    Queued,
    Running,
    Blocked,
    Completed,
    Failed,
    Cancelled,
}

/// `QUEUED → RUNNING`, `RUNNING ↔ BLOCKED`, `RUNNING → {COMPLETED, FAILED,
/// CANCELLED}`, `BLOCKED → CANCELLED`. Every other pair is rejected.
pub fn allowed_transition(from: AgentTaskStatus, to: AgentTaskStatus) -> bool {
    use AgentTaskStatus::*;
    matches!(
        (from, to),
        (Queued, Running)
            | (Running, Blocked)
            | (Blocked, Running)
            | (Running, Completed)
            | (Running, Failed)
            | (Running, Cancelled)
            | (Blocked, Cancelled)
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentTaskRecord {
    pub task_id: String,
    pub user_id: String,
    pub target_agent: String,
    pub request_text: String,
    #[serde(default)]
    pub context: serde_json::Value,
    #[serde(default)]
    pub parameters: serde_json::Value,
    pub workflow_id: String,
    pub run_id: Option<String>,
    pub status: AgentTaskStatus,
    pub last_message: Option<String>,
    pub percent_complete: Option<f32>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    pub blocked_details: Option<String>,
    pub error_details: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields a caller may update in one `update_status` call. All but `status`
/// are optional — omitted fields are left untouched on the stored record.
#[derive(Debug, Clone, Default)]
pub struct StatusUpdate {
    pub status: AgentTaskStatus,
    pub last_message: Option<String>,
    pub percent_complete: Option<f32>,
    pub blocked_details: Option<String>,
    pub artifacts: Option<Vec<String>>,
    pub error_details: Option<String>,
}

impl StatusUpdate {
    pub fn to(status: AgentTaskStatus) -> Self {
        Self {
            status,
            ..Default::default()
        }
    }
}

impl Default for AgentTaskStatus {
    fn default() -> Self {
        AgentTaskStatus::Queued
    }
}

#[derive(Debug, Error)]
pub enum TaskStoreError {
    #[error("agent task {task_id:?} not found")]
    AgentTaskNotFoundError { task_id: String },

    #[error("user {user_id:?} is not the owner of agent task {task_id:?}")]
    AgentTaskForbiddenError { task_id: String, user_id: String },

    #[error("cannot move agent task {task_id:?} from {from:?} to {to:?}")]
    InvalidStatusTransition {
        task_id: String,
        from: AgentTaskStatus,
        to: AgentTaskStatus,
    },
}
