//! MCP surface: JSON-RPC framing, tool definitions, and the stdio server.

pub mod protocol;
pub mod server;
pub mod tools;

pub use protocol::{ToolDefinition, ToolsCallResult};
pub use server::McpServer;
pub use tools::{call_tool, list_tools};
