use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::CatalogError;
use crate::types::{AgentScope, AgentSettings};

/// Persistence seam for agent definitions.
///
/// A single in-memory implementation is provided; a durable backend can
/// implement the same trait without touching catalog logic.
#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn get(&self, scope: &AgentScope, name: &str) -> Option<AgentSettings>;
    async fn list(&self, scope: &AgentScope) -> Vec<AgentSettings>;
    async fn upsert(&self, settings: AgentSettings) -> Result<(), CatalogError>;
    async fn delete(&self, scope: &AgentScope, name: &str) -> Result<(), CatalogError>;
}

#[derive(Default)]
pub struct InMemoryAgentStore {
    rows: Mutex<HashMap<(AgentScope, String), AgentSettings>>,
}

impl InMemoryAgentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentStore for InMemoryAgentStore {
    async fn get(&self, scope: &AgentScope, name: &str) -> Option<AgentSettings> {
        let rows = self.rows.lock().unwrap();
        rows.get(&(scope.clone(), name.to_string())).cloned()
    }

    async fn list(&self, scope: &AgentScope) -> Vec<AgentSettings> {
        let rows = self.rows.lock().unwrap();
        rows.values()
            .filter(|s| &s.scope == scope)
            .cloned()
            .collect()
    }

    async fn upsert(&self, settings: AgentSettings) -> Result<(), CatalogError> {
        let mut rows = self.rows.lock().unwrap();
        rows.insert((settings.scope.clone(), settings.name.clone()), settings);
        Ok(())
    }

    async fn delete(&self, scope: &AgentScope, name: &str) -> Result<(), CatalogError> {
        let mut rows = self.rows.lock().unwrap();
        rows.remove(&(scope.clone(), name.to_string()))
            .map(|_| ())
            .ok_or_else(|| CatalogError::AgentNotFound {
                name: name.to_string(),
            })
    }
}
