use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// What a caller is permitted to search against for this request; carried on
/// [`RuntimeContext`] rather than looked up from a global so every component
/// downstream sees the same policy the request arrived with.
#[derive(Debug, Clone, Default)]
pub struct SearchPolicy {
    pub allow_web: bool,
    pub allowed_domains: Vec<String>,
}

/// Resolves and, where the backing identity provider supports it, refreshes
/// the bearer credential presented to MCP servers.
///
/// Rendered as an interface (rather than a bare `String` field) so a token
/// captured at the start of a long session never goes stale by value — every
/// reader calls `get()` again instead of holding a copy past its lifetime.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn get(&self) -> anyhow::Result<Option<String>>;
}

/// A token that never refreshes — the common case for a short-lived request
/// where the caller already resolved a valid credential.
pub struct StaticToken(pub Option<String>);

#[async_trait]
impl TokenProvider for StaticToken {
    async fn get(&self) -> anyhow::Result<Option<String>> {
        Ok(self.0.clone())
    }
}

/// Per-request identity, access, and scoped configuration, threaded through
/// every layer of the orchestration core.
///
/// Treated as effectively immutable for the lifetime of one exchange; the
/// access token is the one field that can legitimately change underneath a
/// long-lived agent instance (on 401 recovery), which is why it is stored
/// behind an inner lock rather than copied into every constructor.
#[derive(Clone)]
pub struct RuntimeContext {
    pub user_id: String,
    token: Arc<RwLock<Option<String>>>,
    token_provider: Arc<dyn TokenProvider>,
    pub selected_library_ids: Vec<String>,
    pub search_policy: SearchPolicy,
    pub language: Option<String>,
}

impl RuntimeContext {
    pub fn new(user_id: impl Into<String>, token_provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            user_id: user_id.into(),
            token: Arc::new(RwLock::new(None)),
            token_provider,
            selected_library_ids: Vec::new(),
            search_policy: SearchPolicy::default(),
            language: None,
        }
    }

    pub fn with_static_token(user_id: impl Into<String>, token: Option<String>) -> Self {
        Self::new(user_id, Arc::new(StaticToken(token)))
    }

    /// Current access token, refreshing through the provider if the cached
    /// value has not been populated yet this session.
    pub async fn access_token(&self) -> anyhow::Result<Option<String>> {
        {
            let cached = self.token.read().await;
            if cached.is_some() {
                return Ok(cached.clone());
            }
        }
        let fresh = self.token_provider.get().await?;
        *self.token.write().await = fresh.clone();
        Ok(fresh)
    }

    /// Force the next `access_token()` call to re-resolve through the
    /// provider. Called after a 401 is observed so a stale cached value is
    /// never handed out twice.
    pub async fn invalidate_token(&self) {
        *self.token.write().await = None;
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language;
        self
    }

    pub fn with_search_policy(mut self, policy: SearchPolicy) -> Self {
        self.search_policy = policy;
        self
    }

    pub fn with_selected_libraries(mut self, ids: Vec<String>) -> Self {
        self.selected_library_ids = ids;
        self
    }
}

/// Adapts a [`RuntimeContext`] into the `TokenProvider` seam `conduit-mcp`
/// clients read from, so a refreshed token always reaches the live MCP
/// client without the agent needing to rebuild anything by value.
pub struct ContextTokenProvider(pub RuntimeContext);

#[async_trait]
impl conduit_mcp::TokenProvider for ContextTokenProvider {
    async fn token(&self) -> anyhow::Result<Option<String>> {
        self.0.access_token().await
    }
}
