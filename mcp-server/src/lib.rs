//! Server binary internals exposed for integration tests.

pub mod config;
pub mod setup;
pub mod stdio;
pub mod telemetry;

pub use config::Config;
pub use stdio::StdioMcpServer;
