use chrono::{DateTime, Utc};
use conduit_agent::MessageMetadata;
use conduit_model::Message;
use serde::{Deserialize, Serialize};

/// Who authored a persisted chat message. Distinct from `conduit_model::Role`
/// — that one is the seam a model client reads; this one is the seam the
/// chat history and UI read, and the two happen to share the same four
/// values today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    User,
    Assistant,
    System,
    Tool,
}

/// Which lane of the UI a message belongs to. `Final` is the only channel a
/// client renders as the agent's answer; every other channel is progress
/// commentary the UI may choose to show transiently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Final,
    Thought,
    ToolResult,
    Plan,
    Observation,
    Error,
    InjectedContext,
}

/// One renderable unit of a chat message's body. A single message may carry
/// several parts (e.g. a text explanation followed by a code block).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessagePart {
    Text { text: String },
    CodeBlock { language: Option<String>, code: String },
    Image { url: String, alt: Option<String> },
    ToolResultBlock { tool_name: String, content: String },
    Link { url: String, title: Option<String> },
}

impl MessagePart {
    pub fn text(text: impl Into<String>) -> Self {
        MessagePart::Text { text: text.into() }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessagePart::Text { text } => Some(text),
            _ => None,
        }
    }
}

/// A single persisted (or in-flight) chat message. `(session_id, rank)` is
/// the primary key; rank is assigned by the orchestrator, never by the
/// caller or the agent that produced the message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub session_id: String,
    pub exchange_id: String,
    pub rank: u64,
    pub role: ChatRole,
    pub channel: Channel,
    pub parts: Vec<MessagePart>,
    pub timestamp: DateTime<Utc>,
    pub metadata: MessageMetadata,
}

impl ChatMessage {
    /// Concatenates every `Text` part's content. Used to feed a persisted
    /// turn back into a model's message list.
    pub fn text(&self) -> String {
        self.parts.iter().filter_map(MessagePart::as_text).collect::<Vec<_>>().join("")
    }

    /// Renders this chat message into the seam a `ModelProvider` consumes.
    /// Only `user`/`assistant`/`system` roles round-trip meaningfully — a
    /// persisted `tool` row (channel `tool_result`) has no direct model-role
    /// equivalent and is dropped, since its content already reached the
    /// model as a `Message::tool_result` during the turn that produced it.
    pub fn as_model_message(&self) -> Option<Message> {
        match self.role {
            ChatRole::User => Some(Message::user(self.text())),
            ChatRole::Assistant if self.channel == Channel::Final => Some(Message::assistant(self.text())),
            ChatRole::System => Some(Message::system(self.text())),
            _ => None,
        }
    }
}

/// Rebuilds the model-facing conversation history from a session's
/// persisted messages, in rank order. Intermediate progress messages
/// (`thought`/`tool_result`/`plan`/`observation`/`error`) are dropped: the
/// reasoner's own loop already folded their content into the turn that
/// produced the final answer, so replaying them again would double up
/// context on the next turn.
pub fn history_to_model_messages(history: &[ChatMessage]) -> Vec<Message> {
    history.iter().filter_map(ChatMessage::as_model_message).collect()
}
