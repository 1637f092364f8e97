mod mock;
mod provider;
mod types;

pub use mock::{MockProvider, ScriptedMockProvider};
pub use provider::{ModelProvider, ResponseStream};
pub use types::{CompletionRequest, FunctionCall, Message, MessageContent, ResponseEvent, Role};
