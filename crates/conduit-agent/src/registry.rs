use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use conduit_catalog::AgentLoader;
use conduit_config::{AiConfig, McpServerConfiguration};
use conduit_model::ModelProvider;

use crate::capability::Agent;

/// Everything a construction recipe needs to build a fresh agent instance.
/// Threaded through rather than read from a global so the same binary can
/// run agents against different model providers or tuning defaults in
/// tests without touching process state.
#[derive(Clone)]
pub struct AgentConstructionCtx {
    pub model: Arc<dyn ModelProvider>,
    pub ai_config: AiConfig,
    /// The process-wide MCP server catalog; agents resolve their tuning's
    /// `mcp_servers` name references against this.
    pub mcp_catalog: Vec<McpServerConfiguration>,
}

impl AgentConstructionCtx {
    pub fn tool_call_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_config.tool_call_timeout_secs)
    }
}

pub type AgentConstructor = Arc<dyn Fn(String, AgentConstructionCtx) -> Arc<dyn Agent> + Send + Sync>;

/// Static registry mapping a `class_path` string to a construction recipe.
///
/// Replaces dynamic dotted-path class loading: there is no runtime import
/// step, only a lookup against a table populated at process start by each
/// agent/leader implementation registering itself — the same pattern the
/// teacher's `ToolRegistry::register` uses for tools. Implements
/// [`AgentLoader`] directly so `conduit-catalog`'s bootstrap can validate
/// class references without depending on this crate for construction.
#[derive(Default)]
pub struct AgentRegistry {
    constructors: HashMap<&'static str, AgentConstructor>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, class_path: &'static str, ctor: AgentConstructor) {
        self.constructors.insert(class_path, ctor);
    }

    pub fn construct(
        &self,
        class_path: &str,
        name: impl Into<String>,
        ctx: AgentConstructionCtx,
    ) -> Option<Arc<dyn Agent>> {
        self.constructors.get(class_path).map(|ctor| ctor(name.into(), ctx))
    }
}

impl AgentLoader for AgentRegistry {
    fn is_known(&self, class_path: &str) -> bool {
        self.constructors.contains_key(class_path)
    }

    fn known_classes(&self) -> Vec<&'static str> {
        self.constructors.keys().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use conduit_model::MockProvider;

    use super::*;
    use crate::builtin::StandardAgent;

    fn test_ctx() -> AgentConstructionCtx {
        AgentConstructionCtx {
            model: Arc::new(MockProvider),
            ai_config: AiConfig::default(),
            mcp_catalog: Vec::new(),
        }
    }

    #[test]
    fn unregistered_class_is_unknown() {
        let registry = AgentRegistry::new();
        assert!(!registry.is_known("builtin.standard_agent"));
    }

    #[test]
    fn registered_class_constructs() {
        let mut registry = AgentRegistry::new();
        registry.register(
            "builtin.standard_agent",
            Arc::new(|name, ctx| Arc::new(StandardAgent::new(name, ctx)) as Arc<dyn Agent>),
        );
        assert!(registry.is_known("builtin.standard_agent"));
        let agent = registry.construct("builtin.standard_agent", "x", test_ctx());
        assert!(agent.is_some());
        assert_eq!(agent.unwrap().name(), "x");
    }

    #[test]
    fn construct_returns_none_for_unknown_class() {
        let registry = AgentRegistry::new();
        assert!(registry.construct("builtin.ghost", "x", test_ctx()).is_none());
    }
}
