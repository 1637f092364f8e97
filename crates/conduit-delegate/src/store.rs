use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::task::{allowed_transition, AgentTaskRecord, AgentTaskStatus, StatusUpdate, TaskStoreError};

#[async_trait]
pub trait AgentTaskStore: Send + Sync {
    /// Upsert by `task_id`: a fresh id inserts a new `QUEUED` row; an
    /// existing id refreshes `workflow_id`/`context`/`parameters` and bumps
    /// `updated_at`, leaving status and progress fields untouched.
    async fn create(
        &self,
        task_id: &str,
        user_id: &str,
        target_agent: &str,
        request_text: &str,
        workflow_id: &str,
        context: serde_json::Value,
        parameters: serde_json::Value,
    ) -> Result<AgentTaskRecord, TaskStoreError>;

    async fn get(&self, task_id: &str) -> Result<AgentTaskRecord, TaskStoreError>;

    async fn update_status(&self, task_id: &str, update: StatusUpdate) -> Result<AgentTaskRecord, TaskStoreError>;

    async fn list_for_user(
        &self,
        user_id: &str,
        limit: usize,
        statuses: Option<&[AgentTaskStatus]>,
        target_agent: Option<&str>,
    ) -> Vec<AgentTaskRecord>;
}

#[derive(Default)]
pub struct InMemoryAgentTaskStore {
    rows: Mutex<HashMap<String, AgentTaskRecord>>,
}

impl InMemoryAgentTaskStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentTaskStore for InMemoryAgentTaskStore {
    async fn create(
        &self,
        task_id: &str,
        user_id: &str,
        target_agent: &str,
        request_text: &str,
        workflow_id: &str,
        context: serde_json::Value,
        parameters: serde_json::Value,
    ) -> Result<AgentTaskRecord, TaskStoreError> {
        let mut rows = self.rows.lock().unwrap();
        let now = Utc::now();

        if let Some(existing) = rows.get_mut(task_id) {
            existing.workflow_id = workflow_id.to_string();
            existing.context = context;
            existing.parameters = parameters;
            existing.updated_at = now;
            return Ok(existing.clone());
        }

        let record = AgentTaskRecord {
            task_id: task_id.to_string(),
            user_id: user_id.to_string(),
            target_agent: target_agent.to_string(),
            request_text: request_text.to_string(),
            context,
            parameters,
            workflow_id: workflow_id.to_string(),
            run_id: None,
            status: AgentTaskStatus::Queued,
            last_message: None,
            percent_complete: None,
            artifacts: Vec::new(),
            blocked_details: None,
            error_details: None,
            created_at: now,
            updated_at: now,
        };
        rows.insert(task_id.to_string(), record.clone());
        Ok(record)
    }

    async fn get(&self, task_id: &str) -> Result<AgentTaskRecord, TaskStoreError> {
        let rows = self.rows.lock().unwrap();
        rows.get(task_id)
            .cloned()
            .ok_or_else(|| TaskStoreError::AgentTaskNotFoundError {
                task_id: task_id.to_string(),
            })
    }

    async fn update_status(&self, task_id: &str, update: StatusUpdate) -> Result<AgentTaskRecord, TaskStoreError> {
        let mut rows = self.rows.lock().unwrap();
        let record = rows.get_mut(task_id).ok_or_else(|| TaskStoreError::AgentTaskNotFoundError {
            task_id: task_id.to_string(),
        })?;

        if !allowed_transition(record.status, update.status) {
            return Err(TaskStoreError::InvalidStatusTransition {
                task_id: task_id.to_string(),
                from: record.status,
                to: update.status,
            });
        }

        record.status = update.status;
        if let Some(last_message) = update.last_message {
            record.last_message = Some(last_message);
        }
        if let Some(percent_complete) = update.percent_complete {
            record.percent_complete = Some(percent_complete);
        }
        if let Some(blocked_details) = update.blocked_details {
            record.blocked_details = Some(blocked_details);
        }
        if let Some(artifacts) = update.artifacts {
            record.artifacts = artifacts;
        }
        if let Some(error_details) = update.error_details {
            record.error_details = Some(error_details);
        }
        record.updated_at = Utc::now();
        Ok(record.clone())
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        limit: usize,
        statuses: Option<&[AgentTaskStatus]>,
        target_agent: Option<&str>,
    ) -> Vec<AgentTaskRecord> {
        let rows = self.rows.lock().unwrap();
        let mut matched: Vec<AgentTaskRecord> = rows
            .values()
            .filter(|r| r.user_id == user_id)
            .filter(|r| statuses.map_or(true, |s| s.contains(&r.status)))
            .filter(|r| target_agent.map_or(true, |t| r.target_agent == t))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matched.truncate(limit);
        matched
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_is_idempotent_by_task_id() {
        let store = InMemoryAgentTaskStore::new();
        let first = store
            .create("t1", "u1", "approve_flow", "deploy v2", "delegate-1", serde_json::json!({}), serde_json::json!({}))
            .await
            .unwrap();
        store
            .update_status("t1", StatusUpdate::to(AgentTaskStatus::Running))
            .await
            .unwrap();

        let second = store
            .create("t1", "u1", "approve_flow", "deploy v2", "delegate-2", serde_json::json!({"k":1}), serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(second.workflow_id, "delegate-2");
        assert_eq!(second.status, AgentTaskStatus::Running, "re-creating must not reset progress");
        assert_ne!(first.workflow_id, second.workflow_id);
    }

    #[tokio::test]
    async fn update_status_rejects_invalid_transition() {
        let store = InMemoryAgentTaskStore::new();
        store
            .create("t1", "u1", "a", "r", "w1", serde_json::json!({}), serde_json::json!({}))
            .await
            .unwrap();
        let result = store.update_status("t1", StatusUpdate::to(AgentTaskStatus::Completed)).await;
        assert!(matches!(result, Err(TaskStoreError::InvalidStatusTransition { .. })));
    }

    #[tokio::test]
    async fn update_status_on_unknown_task_is_not_found() {
        let store = InMemoryAgentTaskStore::new();
        let result = store.update_status("ghost", StatusUpdate::to(AgentTaskStatus::Running)).await;
        assert!(matches!(result, Err(TaskStoreError::AgentTaskNotFoundError { .. })));
    }

    #[tokio::test]
    async fn list_for_user_orders_newest_first_and_filters() {
        let store = InMemoryAgentTaskStore::new();
        store.create("t1", "u1", "a", "r", "w1", serde_json::json!({}), serde_json::json!({})).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        store.create("t2", "u1", "b", "r", "w2", serde_json::json!({}), serde_json::json!({})).await.unwrap();
        store.create("t3", "u2", "a", "r", "w3", serde_json::json!({}), serde_json::json!({})).await.unwrap();

        let mine = store.list_for_user("u1", 10, None, None).await;
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].task_id, "t2", "most recently created must come first");

        let filtered = store.list_for_user("u1", 10, None, Some("b")).await;
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].task_id, "t2");
    }
}
