use async_trait::async_trait;

/// Resolves the credential an MCP client presents to a bound server.
///
/// Modeled after a `Get() -> (token, error)` accessor rather than a bare
/// `String` field so a refresh (e.g. after `AuthExpired`) can be triggered
/// by calling `token()` again instead of requiring the caller to rebuild the
/// client.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn token(&self) -> anyhow::Result<Option<String>>;
}

/// A provider that always returns the same token (or none). Used for
/// statically-configured bearer auth and in tests.
pub struct StaticTokenProvider(pub Option<String>);

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn token(&self) -> anyhow::Result<Option<String>> {
        Ok(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_provider_returns_configured_token() {
        let p = StaticTokenProvider(Some("abc".to_string()));
        assert_eq!(p.token().await.unwrap(), Some("abc".to_string()));
    }

    #[tokio::test]
    async fn static_provider_with_none_returns_none() {
        let p = StaticTokenProvider(None);
        assert_eq!(p.token().await.unwrap(), None);
    }
}
