//! MCP protocol layer: JSON-RPC method routing, parameter deserialization,
//! envelope serialization, and the HTTP/SSE transport.
//!
//! The stdio transport lives in the server binary; both transports route
//! through [`handler::McpToolHandler`].

pub mod error;
pub mod handler;
pub mod serialization;
pub mod server;

pub use error::McpError;
pub use handler::McpToolHandler;
pub use server::{route_method, McpServer, TOOL_METHODS};
