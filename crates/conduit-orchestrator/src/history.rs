use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::message::ChatMessage;

#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Appends `messages` to `session_id`'s history. Callers are
    /// responsible for having assigned strictly increasing, gap-free ranks
    /// before calling this — see `RankAllocator`.
    async fn append(&self, session_id: &str, messages: Vec<ChatMessage>) -> anyhow::Result<()>;

    async fn list_by_session(&self, session_id: &str) -> Vec<ChatMessage>;

    async fn delete_session(&self, session_id: &str) -> anyhow::Result<()>;
}

#[derive(Default)]
pub struct InMemoryHistoryStore {
    rows: Mutex<HashMap<String, Vec<ChatMessage>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, session_id: &str, messages: Vec<ChatMessage>) -> anyhow::Result<()> {
        let mut rows = self.rows.lock().unwrap();
        rows.entry(session_id.to_string()).or_default().extend(messages);
        Ok(())
    }

    async fn list_by_session(&self, session_id: &str) -> Vec<ChatMessage> {
        self.rows.lock().unwrap().get(session_id).cloned().unwrap_or_default()
    }

    async fn delete_session(&self, session_id: &str) -> anyhow::Result<()> {
        self.rows.lock().unwrap().remove(session_id);
        Ok(())
    }
}

/// Hands out strictly increasing, gap-free `rank` values per session.
///
/// Rendered as a small standalone type (rather than folded into
/// `HistoryStore`) because rank allocation has to happen incrementally as
/// the orchestrator streams each intermediate step — not once per batch —
/// while still guaranteeing no two messages in the same session ever
/// collide on rank, even across concurrent exchanges.
#[derive(Default)]
pub struct RankAllocator {
    next: Mutex<HashMap<String, u64>>,
}

impl RankAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the allocator for a session from whatever is already
    /// persisted, so a process restart (or a second orchestrator instance
    /// sharing the same history store) resumes numbering correctly instead
    /// of restarting at 1 and colliding with existing rows.
    pub fn resume_from(&self, session_id: &str, max_existing_rank: u64) {
        let mut next = self.next.lock().unwrap();
        let entry = next.entry(session_id.to_string()).or_insert(0);
        if max_existing_rank >= *entry {
            *entry = max_existing_rank + 1;
        }
    }

    pub fn allocate(&self, session_id: &str) -> u64 {
        let mut next = self.next.lock().unwrap();
        let entry = next.entry(session_id.to_string()).or_insert(1);
        let rank = *entry;
        *entry += 1;
        rank
    }
}
