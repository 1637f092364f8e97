use conduit_model::{Message, ModelProvider, ResponseEvent};
use conduit_tools::ToolSchema;
use futures::StreamExt;

use crate::metadata::TokenUsage;

/// A pending tool (or crew-dispatch) call the model asked for this tick.
#[derive(Debug, Clone)]
pub struct PendingCall {
    pub id: String,
    pub name: String,
    /// Raw JSON-encoded arguments as the model returned them.
    pub arguments: String,
}

/// Everything one model round trip produced, collapsed from its event
/// stream into a single value the reasoner and leader loops can branch on.
#[derive(Debug, Clone, Default)]
pub struct ModelTurn {
    pub text: String,
    pub pending_calls: Vec<PendingCall>,
    pub usage: Option<TokenUsage>,
}

/// Drains one `ModelProvider::complete` stream into a [`ModelTurn`].
/// Returns `Err` only for a genuine provider-level failure (the model
/// client never partially succeeds mid-stream in this design); callers are
/// responsible for classifying that failure as a guardrail refusal or an
/// ordinary infrastructure fault.
pub async fn run_model_once(
    model: &dyn ModelProvider,
    messages: Vec<Message>,
    tools: Vec<ToolSchema>,
) -> anyhow::Result<ModelTurn> {
    let req = conduit_model::CompletionRequest {
        messages,
        tools,
        stream: true,
    };
    let mut stream = model.complete(req).await?;
    let mut turn = ModelTurn::default();

    while let Some(event) = stream.next().await {
        match event? {
            ResponseEvent::TextDelta(delta) => turn.text.push_str(&delta),
            ResponseEvent::ToolCall { id, name, arguments } => {
                turn.pending_calls.push(PendingCall { id, name, arguments });
            }
            ResponseEvent::Usage {
                input_tokens,
                output_tokens,
            } => {
                turn.usage = Some(TokenUsage {
                    input_tokens,
                    output_tokens,
                });
            }
            ResponseEvent::Done => break,
            ResponseEvent::Error(msg) => anyhow::bail!(msg),
        }
    }

    Ok(turn)
}

/// Conversation history plus a freshly rendered system message, ready to
/// hand to [`run_model_once`].
pub fn compose_messages(system_prompt: String, history: Vec<Message>) -> Vec<Message> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(Message::system(system_prompt));
    messages.extend(history);
    messages
}
