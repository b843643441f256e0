//! handbook-mcp
//!
//! The handbook tool surface: JSON-RPC 2.0 over newline-delimited stdio with
//! `initialize`, `ping`, `tools/list` and `tools/call`.
pub mod format;
pub mod protocol;
pub mod server;
pub mod tools;

pub use protocol::{JsonRpcRequest, JsonRpcResponse, ToolCallResult, ToolInfo};
pub use server::McpServer;
pub use tools::{HandbookTools, ServiceInfo};
