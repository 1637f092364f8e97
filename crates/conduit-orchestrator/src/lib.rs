mod error;
mod history;
mod message;
mod orchestrator;
mod session;

pub use error::OrchestratorError;
pub use history::{HistoryStore, InMemoryHistoryStore, RankAllocator};
pub use message::{history_to_model_messages, Channel, ChatMessage, ChatRole, MessagePart};
pub use orchestrator::{ChatAskInput, EventSender, ServerEvent, SessionOrchestrator};
pub use session::{InMemorySessionStore, Session, SessionStore};
