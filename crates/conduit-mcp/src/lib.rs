mod client;
mod error;
mod runtime;
mod token_provider;

pub use client::{HttpMcpClient, McpClient};
pub use error::McpError;
pub use runtime::{resolve_servers, McpBoundTool, McpRuntime};
pub use token_provider::{StaticTokenProvider, TokenProvider};
