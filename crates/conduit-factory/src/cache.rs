use std::num::NonZeroUsize;
use std::sync::Arc;

use conduit_agent::Agent;
use lru::LruCache;
use tokio::sync::Mutex;

/// Key a warm agent instance by the session it was built for and the catalog
/// name it answers to. The same agent name can be warm under many sessions
/// at once, each with its own conversational state held inside the instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionAgentKey {
    pub session_id: String,
    pub agent_name: String,
}

impl SessionAgentKey {
    pub fn new(session_id: impl Into<String>, agent_name: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            agent_name: agent_name.into(),
        }
    }
}

/// Bounded cache of warm agent instances, evicting least-recently-used once
/// full. Wrapped in a single mutex rather than sharded: the lock is only ever
/// held for pointer bookkeeping, never across an `.await` on agent work.
pub struct AgentCache {
    inner: Mutex<LruCache<SessionAgentKey, Arc<dyn Agent>>>,
}

impl AgentCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or_else(|| NonZeroUsize::new(1).unwrap());
        Self {
            inner: Mutex::new(LruCache::new(capacity)),
        }
    }

    pub async fn get(&self, key: &SessionAgentKey) -> Option<Arc<dyn Agent>> {
        let mut cache = self.inner.lock().await;
        cache.get(key).cloned()
    }

    /// Inserts a freshly built instance, returning the entry evicted to make
    /// room for it, if any. Callers must `aclose()` the eviction themselves —
    /// this type never awaits anything while holding the lock.
    pub async fn insert(&self, key: SessionAgentKey, agent: Arc<dyn Agent>) -> Option<Arc<dyn Agent>> {
        let mut cache = self.inner.lock().await;
        cache.push(key, agent).map(|(_, evicted)| evicted)
    }

    /// Pops every entry for a session, in stable insertion order, so callers
    /// can close them one at a time.
    pub async fn pop_session(&self, session_id: &str) -> Vec<Arc<dyn Agent>> {
        let mut cache = self.inner.lock().await;
        let keys: Vec<SessionAgentKey> = cache
            .iter()
            .filter(|(k, _)| k.session_id == session_id)
            .map(|(k, _)| k.clone())
            .collect();
        let mut popped = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(agent) = cache.pop(&key) {
                popped.push(agent);
            }
        }
        popped
    }

    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }
}
