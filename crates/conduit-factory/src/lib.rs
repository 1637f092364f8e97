mod cache;
mod error;

use std::collections::HashSet;
use std::sync::Arc;

use conduit_agent::{Agent, AgentConstructionCtx, AgentRegistry, RuntimeContext};
use conduit_catalog::{AgentCatalog, AgentKind, AgentScope, AgentSettings};
use tracing::info;

pub use cache::{AgentCache, SessionAgentKey};
pub use error::FactoryError;

/// Builds agents from catalog definitions and keeps warm instances around
/// per `(session_id, agent_name)` so a multi-turn conversation reuses the
/// same instance — and its bound MCP connections — across turns instead of
/// reconnecting on every message.
pub struct AgentFactory {
    catalog: Arc<AgentCatalog>,
    registry: Arc<AgentRegistry>,
    cache: AgentCache,
}

impl AgentFactory {
    pub fn new(catalog: Arc<AgentCatalog>, registry: Arc<AgentRegistry>, cache_capacity: usize) -> Self {
        Self {
            catalog,
            registry,
            cache: AgentCache::new(cache_capacity),
        }
    }

    /// Resolves `(agent, cache_hit)` for `agent_name` within `session_id`.
    ///
    /// On a cache hit, only the runtime context is refreshed — the instance's
    /// own state (bound MCP connections, crew) is left untouched. On a miss,
    /// the agent is constructed from its catalog definition, settings and
    /// context are applied before `async_init`, and (for a leader) its crew
    /// is built recursively through this same path before the instance is
    /// cached.
    pub async fn create_and_init(
        &self,
        agent_name: &str,
        runtime_context: RuntimeContext,
        session_id: &str,
        construction_ctx: &AgentConstructionCtx,
    ) -> anyhow::Result<(Arc<dyn Agent>, bool)> {
        let mut visiting = HashSet::new();
        self.create_and_init_inner(agent_name, runtime_context, session_id, construction_ctx, &mut visiting)
            .await
    }

    fn create_and_init_inner<'a>(
        &'a self,
        agent_name: &'a str,
        runtime_context: RuntimeContext,
        session_id: &'a str,
        construction_ctx: &'a AgentConstructionCtx,
        visiting: &'a mut HashSet<String>,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<(Arc<dyn Agent>, bool)>> + Send + 'a>>
    {
        Box::pin(async move {
            let key = SessionAgentKey::new(session_id, agent_name);
            if let Some(cached) = self.cache.get(&key).await {
                cached.set_runtime_context(runtime_context).await?;
                return Ok((cached, true));
            }

            let settings = self.resolve_settings(&runtime_context, agent_name).await?;
            if !settings.enabled {
                return Err(FactoryError::AgentDisabled {
                    name: agent_name.to_string(),
                }
                .into());
            }

            let agent = match self
                .registry
                .construct(&settings.class_path, settings.name.clone(), construction_ctx.clone())
            {
                Some(agent) => agent,
                None => {
                    self.catalog.remove_unresolvable(&settings.scope, &settings.name).await;
                    return Err(FactoryError::ConstructionFailed {
                        name: agent_name.to_string(),
                        class_path: settings.class_path.clone(),
                    }
                    .into());
                }
            };

            agent.apply_settings(settings.clone()).await?;
            agent.set_runtime_context(runtime_context.clone()).await?;

            let crew = if settings.kind == AgentKind::Leader {
                if !visiting.insert(agent_name.to_string()) {
                    return Err(FactoryError::CrewCycle {
                        leader: agent_name.to_string(),
                        member: agent_name.to_string(),
                    }
                    .into());
                }
                let mut members = Vec::with_capacity(settings.crew.len());
                for member_name in &settings.crew {
                    if visiting.contains(member_name) {
                        return Err(FactoryError::CrewCycle {
                            leader: agent_name.to_string(),
                            member: member_name.clone(),
                        }
                        .into());
                    }
                    let (member, _) = self
                        .create_and_init_inner(member_name, runtime_context.clone(), session_id, construction_ctx, visiting)
                        .await?;
                    members.push(member);
                }
                visiting.remove(agent_name);
                members
            } else {
                Vec::new()
            };

            agent.async_init(crew).await?;

            if let Some(evicted) = self.cache.insert(key, agent.clone()).await {
                info!(agent = %evicted.name(), "evicting warm agent instance to make room in session cache");
                tokio::spawn(async move {
                    evicted.aclose().await;
                });
            }

            Ok((agent, false))
        })
    }

    /// Finds `agent_name`'s definition, preferring a per-user override over
    /// the global definition when both exist.
    async fn resolve_settings(
        &self,
        runtime_context: &RuntimeContext,
        agent_name: &str,
    ) -> Result<AgentSettings, FactoryError> {
        let user_scope = AgentScope::User {
            user_id: runtime_context.user_id.clone(),
        };
        if let Ok(settings) = self.catalog.get(&user_scope, agent_name).await {
            return Ok(settings);
        }
        self.catalog
            .get(&AgentScope::Global, agent_name)
            .await
            .map_err(|_| FactoryError::ConstructionFailed {
                name: agent_name.to_string(),
                class_path: "<unresolved>".to_string(),
            })
    }

    /// Evicts every instance warm under `session_id` and closes each in turn.
    /// Closes run sequentially, never concurrently: each touches shared
    /// network resources (MCP connections, workflow handles) and interleaved
    /// shutdown logs from concurrent closes are harder to diagnose than the
    /// extra latency of doing them one at a time.
    pub async fn teardown_session_agents(&self, session_id: &str) {
        let agents = self.cache.pop_session(session_id).await;
        for agent in agents {
            info!(agent = %agent.name(), session_id, "closing session agent");
            agent.aclose().await;
        }
    }
}
