mod registry;
mod resilient_node;
mod tool;

pub use registry::ToolRegistry;
pub use resilient_node::{ResilientToolNode, ToolExecutionOutcome};
pub use tool::{AuthExpiredError, OutputCategory, Tool, ToolCall, ToolOutput, ToolSchema};
