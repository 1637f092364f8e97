use std::sync::Arc;

use tracing::{info, warn};

use crate::error::CatalogError;
use crate::loader::AgentLoader;
use crate::store::AgentStore;
use crate::types::{is_reserved_name, AgentScope, AgentSettings};

/// Bootstraps and serves the agent catalog.
///
/// Construction merges three layers, lowest to highest priority:
/// 1. Ingest the static seed list (agents declared in configuration files).
/// 2. Overlay rows already persisted in the store, tagging freshly-ingested
///    static rows with `static_seeded = true` only when the store does not
///    already have a row for that name — a user's prior edit to a seeded
///    agent is never clobbered by re-running ingest.
/// 3. Expose the merged result through the ordinary read/write API.
pub struct AgentCatalog {
    store: Arc<dyn AgentStore>,
    loader: Arc<dyn AgentLoader>,
}

impl AgentCatalog {
    pub fn new(store: Arc<dyn AgentStore>, loader: Arc<dyn AgentLoader>) -> Self {
        Self { store, loader }
    }

    /// Ingest static agent definitions declared in configuration.
    ///
    /// Parse failures for an individual agent are logged and skipped so one
    /// malformed entry never prevents the rest of the catalog from loading.
    pub async fn bootstrap(&self, static_agents: Vec<AgentSettings>) {
        for mut settings in static_agents {
            if is_reserved_name(&settings.name) {
                warn!(agent = %settings.name, "skipping static agent with reserved name");
                continue;
            }
            if !self.loader.is_known(&settings.class_path) {
                warn!(
                    agent = %settings.name,
                    class_path = %settings.class_path,
                    "skipping static agent with unresolvable class"
                );
                continue;
            }
            if self.store.get(&settings.scope, &settings.name).await.is_some() {
                // Already persisted (first boot, or a user edit) — leave it.
                continue;
            }
            settings.static_seeded = true;
            if let Err(e) = self.store.upsert(settings.clone()).await {
                warn!(agent = %settings.name, error = %e, "failed to seed static agent");
                continue;
            }
            info!(agent = %settings.name, "seeded static agent");
        }
    }

    pub async fn get(&self, scope: &AgentScope, name: &str) -> Result<AgentSettings, CatalogError> {
        self.store
            .get(scope, name)
            .await
            .ok_or_else(|| CatalogError::AgentNotFound {
                name: name.to_string(),
            })
    }

    pub async fn list(&self, scope: &AgentScope) -> Vec<AgentSettings> {
        self.store.list(scope).await
    }

    /// Create a brand-new agent definition. Rejects reserved names, names
    /// that collide with an existing row in scope, and class paths the
    /// loader does not recognize.
    pub async fn create(&self, settings: AgentSettings) -> Result<(), CatalogError> {
        if is_reserved_name(&settings.name) {
            return Err(CatalogError::ReservedName {
                name: settings.name,
            });
        }
        if !self.loader.is_known(&settings.class_path) {
            return Err(CatalogError::AgentClassUnresolvable {
                name: settings.name,
                class_path: settings.class_path,
            });
        }
        if self.store.get(&settings.scope, &settings.name).await.is_some() {
            return Err(CatalogError::AgentAlreadyExists {
                name: settings.name,
            });
        }
        self.store.upsert(settings).await
    }

    /// Update an existing, non-seeded agent definition in place.
    pub async fn update(&self, settings: AgentSettings) -> Result<(), CatalogError> {
        let existing = self.get(&settings.scope, &settings.name).await?;
        if existing.static_seeded {
            return Err(CatalogError::AgentUpdatesDisabled {
                name: settings.name,
            });
        }
        self.store.upsert(settings).await
    }

    pub async fn delete(&self, scope: &AgentScope, name: &str) -> Result<(), CatalogError> {
        self.store.delete(scope, name).await
    }

    /// Called when the agent loader fails to construct a persisted agent
    /// (its class path no longer resolves, e.g. after a binary upgrade that
    /// dropped a capability). Removes the stale row rather than letting it
    /// fail the same way on every subsequent lookup.
    pub async fn remove_unresolvable(&self, scope: &AgentScope, name: &str) {
        warn!(agent = %name, "removing catalog row whose class no longer resolves");
        let _ = self.store.delete(scope, name).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{AgentLoader, EmptyAgentLoader};
    use crate::store::InMemoryAgentStore;
    use crate::types::{AgentKind, AgentTuning};

    struct KnownLoader;
    impl AgentLoader for KnownLoader {
        fn is_known(&self, class_path: &str) -> bool {
            class_path == "builtin.echo"
        }
        fn known_classes(&self) -> Vec<&'static str> {
            vec!["builtin.echo"]
        }
    }

    fn agent(name: &str, class_path: &str) -> AgentSettings {
        AgentSettings {
            name: name.to_string(),
            enabled: true,
            class_path: class_path.to_string(),
            kind: AgentKind::Agent,
            tuning: AgentTuning::default(),
            crew: Vec::new(),
            scope: AgentScope::Global,
            static_seeded: false,
        }
    }

    fn catalog_with_known_loader() -> AgentCatalog {
        AgentCatalog::new(Arc::new(InMemoryAgentStore::new()), Arc::new(KnownLoader))
    }

    #[tokio::test]
    async fn bootstrap_seeds_agents_once() {
        let catalog = catalog_with_known_loader();
        catalog
            .bootstrap(vec![agent("echo", "builtin.echo")])
            .await;
        let got = catalog.get(&AgentScope::Global, "echo").await.unwrap();
        assert!(got.static_seeded);
    }

    #[tokio::test]
    async fn bootstrap_does_not_clobber_user_edits() {
        let catalog = catalog_with_known_loader();
        catalog
            .bootstrap(vec![agent("echo", "builtin.echo")])
            .await;

        let mut edited = catalog.get(&AgentScope::Global, "echo").await.unwrap();
        edited.enabled = false;
        // Direct store write simulates a prior user edit bypassing update()'s
        // static_seeded guard (e.g. an administrative override).
        catalog.store.upsert(edited).await.unwrap();

        catalog
            .bootstrap(vec![agent("echo", "builtin.echo")])
            .await;

        let got = catalog.get(&AgentScope::Global, "echo").await.unwrap();
        assert!(!got.enabled, "re-running bootstrap must not clobber the edit");
    }

    #[tokio::test]
    async fn bootstrap_skips_unresolvable_class() {
        let catalog = catalog_with_known_loader();
        catalog
            .bootstrap(vec![agent("ghost", "builtin.nonexistent")])
            .await;
        let result = catalog.get(&AgentScope::Global, "ghost").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn bootstrap_skips_reserved_names() {
        let catalog = catalog_with_known_loader();
        catalog
            .bootstrap(vec![agent("system.audit", "builtin.echo")])
            .await;
        let result = catalog.get(&AgentScope::Global, "system.audit").await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn create_rejects_reserved_name() {
        let catalog = catalog_with_known_loader();
        let result = catalog.create(agent("system.x", "builtin.echo")).await;
        assert!(matches!(result, Err(CatalogError::ReservedName { .. })));
    }

    #[tokio::test]
    async fn create_rejects_unknown_class() {
        let catalog = catalog_with_known_loader();
        let result = catalog.create(agent("a", "builtin.unknown")).await;
        assert!(matches!(
            result,
            Err(CatalogError::AgentClassUnresolvable { .. })
        ));
    }

    #[tokio::test]
    async fn create_rejects_duplicate() {
        let catalog = catalog_with_known_loader();
        catalog.create(agent("a", "builtin.echo")).await.unwrap();
        let result = catalog.create(agent("a", "builtin.echo")).await;
        assert!(matches!(result, Err(CatalogError::AgentAlreadyExists { .. })));
    }

    #[tokio::test]
    async fn update_rejects_seeded_agent() {
        let catalog = catalog_with_known_loader();
        catalog
            .bootstrap(vec![agent("echo", "builtin.echo")])
            .await;
        let mut updated = catalog.get(&AgentScope::Global, "echo").await.unwrap();
        updated.enabled = false;
        let result = catalog.update(updated).await;
        assert!(matches!(result, Err(CatalogError::AgentUpdatesDisabled { .. })));
    }

    #[tokio::test]
    async fn empty_loader_rejects_everything_in_bootstrap() {
        let catalog = AgentCatalog::new(
            Arc::new(InMemoryAgentStore::new()),
            Arc::new(EmptyAgentLoader),
        );
        catalog
            .bootstrap(vec![agent("echo", "builtin.echo")])
            .await;
        assert!(catalog.get(&AgentScope::Global, "echo").await.is_err());
    }
}
