mod catalog;
mod error;
mod loader;
mod store;
mod types;

pub use catalog::AgentCatalog;
pub use error::CatalogError;
pub use loader::{AgentLoader, EmptyAgentLoader};
pub use store::{AgentStore, InMemoryAgentStore};
pub use types::{is_reserved_name, AgentKind, AgentScope, AgentSettings, AgentTuning, RESERVED_NAME_PREFIXES};
