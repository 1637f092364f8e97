use thiserror::Error;

#[derive(Debug, Error)]
pub enum FactoryError {
    #[error("agent {name:?} is disabled")]
    AgentDisabled { name: String },

    #[error("no construction recipe registered for class {class_path:?} (agent {name:?})")]
    ConstructionFailed { name: String, class_path: String },

    #[error("crew cycle detected while building leader {leader:?}: {member:?} is already being constructed")]
    CrewCycle { leader: String, member: String },
}
