use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("mcp server '{name}' has no configured auth but requires one")]
    MissingToken { name: String },
    #[error("mcp server '{name}' not bound")]
    ServerNotBound { name: String },
    #[error("no mcp server exposes tool '{tool_name}'")]
    ToolNotFound { tool_name: String },
}
