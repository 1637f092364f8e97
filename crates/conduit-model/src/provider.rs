use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::{CompletionRequest, ResponseEvent};

pub type ResponseStream = Pin<Box<dyn Stream<Item = anyhow::Result<ResponseEvent>> + Send>>;

/// The seam an LM client plugs into. No concrete HTTP-backed implementation
/// ships in this crate — wiring a real provider (Anthropic, OpenAI, a
/// self-hosted endpoint) is left to the deployment, matching the interface
/// described for the model adapter.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    fn name(&self) -> &str;
    fn model_name(&self) -> &str;

    /// Send a completion request and return a streaming response.
    async fn complete(&self, req: CompletionRequest) -> anyhow::Result<ResponseStream>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProvider;
    use crate::Message;
    use futures::StreamExt;

    #[tokio::test]
    async fn mock_provider_satisfies_trait_object_bound() {
        let provider: Box<dyn ModelProvider> = Box::new(MockProvider);
        let req = CompletionRequest {
            messages: vec![Message::user("hi")],
            ..Default::default()
        };
        let mut stream = provider.complete(req).await.unwrap();
        let first = stream.next().await.unwrap().unwrap();
        assert!(matches!(first, ResponseEvent::TextDelta(_)));
    }
}
