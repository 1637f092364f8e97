use thiserror::Error;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("session {session_id:?} is owned by a different user than the request")]
    SessionOwnerMismatch { session_id: String },

    #[error("agent {agent_name:?} produced no final message for this exchange")]
    NoFinalMessage { agent_name: String },
}
