use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat session: one conversation thread between one user and whichever
/// agent they've been talking to within it. Deleting a session cascades to
/// its messages (and attachments, out of core scope) — see
/// `SessionOrchestrator::delete_session`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub user_id: String,
    pub title: Option<String>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub file_names: Vec<String>,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Fetches the session row, creating one owned by `user_id` on first
    /// use. Either way, `updated_at` is bumped to now.
    async fn get_or_create(&self, session_id: &str, user_id: &str) -> Session;

    async fn get(&self, session_id: &str) -> Option<Session>;

    async fn get_for_user(&self, user_id: &str) -> Vec<Session>;

    async fn delete(&self, session_id: &str) -> anyhow::Result<()>;
}

#[derive(Default)]
pub struct InMemorySessionStore {
    rows: Mutex<HashMap<String, Session>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_or_create(&self, session_id: &str, user_id: &str) -> Session {
        let mut rows = self.rows.lock().unwrap();
        let now = Utc::now();
        let session = rows.entry(session_id.to_string()).or_insert_with(|| Session {
            id: session_id.to_string(),
            user_id: user_id.to_string(),
            title: None,
            updated_at: now,
            file_names: Vec::new(),
        });
        session.updated_at = now;
        session.clone()
    }

    async fn get(&self, session_id: &str) -> Option<Session> {
        self.rows.lock().unwrap().get(session_id).cloned()
    }

    async fn get_for_user(&self, user_id: &str) -> Vec<Session> {
        let mut mine: Vec<Session> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect();
        mine.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        mine
    }

    async fn delete(&self, session_id: &str) -> anyhow::Result<()> {
        self.rows.lock().unwrap().remove(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_or_create_reuses_existing_row_and_bumps_updated_at() {
        let store = InMemorySessionStore::new();
        let first = store.get_or_create("s1", "u1").await;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        let second = store.get_or_create("s1", "u1").await;
        assert_eq!(first.id, second.id);
        assert!(second.updated_at >= first.updated_at);
    }

    #[tokio::test]
    async fn get_for_user_orders_newest_first_and_scopes_by_owner() {
        let store = InMemorySessionStore::new();
        store.get_or_create("s1", "u1").await;
        tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        store.get_or_create("s2", "u1").await;
        store.get_or_create("s3", "u2").await;

        let mine = store.get_for_user("u1").await;
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[0].id, "s2");
    }

    #[tokio::test]
    async fn delete_removes_the_row() {
        let store = InMemorySessionStore::new();
        store.get_or_create("s1", "u1").await;
        store.delete("s1").await.unwrap();
        assert!(store.get("s1").await.is_none());
    }
}
