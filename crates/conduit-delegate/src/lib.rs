mod bridge;
mod runner;
mod store;
mod task;
mod workflow;

pub use bridge::{DelegationBridge, DelegationStatus, Heartbeat, SubmitResult, AGENT_TASK_WORKFLOW};
pub use runner::{run_agent_task, run_and_record, AgentRunOutcome, AgentTaskInput};
pub use store::{AgentTaskStore, InMemoryAgentTaskStore};
pub use task::{allowed_transition, AgentTaskRecord, AgentTaskStatus, StatusUpdate, TaskStoreError};
pub use workflow::{IdReusePolicy, InMemoryWorkflowEngine, WorkflowEngine, WorkflowError, WorkflowFn, WorkflowHandle, WorkflowRunStatus};
