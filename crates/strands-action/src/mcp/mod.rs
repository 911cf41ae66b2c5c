//! MCP server descriptors and client plumbing.

pub mod client;
pub mod types;

pub use client::{DEFAULT_PHASE_TIMEOUT, McpToolClient, McpToolInfo};
pub use types::parse_mcp_servers;
