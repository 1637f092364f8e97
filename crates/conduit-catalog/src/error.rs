use thiserror::Error;

/// Catalog integrity errors — these are typed (rather than bare `anyhow`)
/// because transport layers (the gateway, the task runner) map them to
/// distinct wire-level error codes.
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("agent {name:?} not found")]
    AgentNotFound { name: String },

    #[error("agent {name:?} has no known construction class {class_path:?}")]
    AgentClassUnresolvable { name: String, class_path: String },

    #[error("agent {name:?} is statically seeded and cannot be modified")]
    AgentUpdatesDisabled { name: String },

    #[error("agent {name:?} already exists in scope")]
    AgentAlreadyExists { name: String },

    #[error("agent name {name:?} is reserved")]
    ReservedName { name: String },
}
