//! Error handling for the MCP protocol layer.
//!
//! Maps core orchestration errors to MCP-compliant JSON-RPC error codes.

use orchestrator_core::OrchestratorError;
use serde_json::{json, Value};
use thiserror::Error;

/// MCP protocol errors
#[derive(Error, Debug)]
pub enum McpError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Prerequisite not met: {0}")]
    PrerequisiteNotMet(String),

    #[error("Dependency cycle detected: {0}")]
    CycleDetected(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl McpError {
    /// Convert to JSON-RPC error code
    pub fn to_error_code(&self) -> i32 {
        match self {
            McpError::NotFound(_) => -32001,
            McpError::Validation(_) => -32002,
            McpError::PrerequisiteNotMet(_) => -32003,
            McpError::CycleDetected(_) => -32004,
            McpError::Store(_) => -32005,
            McpError::Protocol(_) => -32006,
            McpError::Serialization(_) => -32007,
        }
    }

    /// Convert to JSON-RPC error response
    pub fn to_json_rpc_error(&self, id: Option<Value>) -> Value {
        json!({
            "jsonrpc": "2.0",
            "error": {
                "code": self.to_error_code(),
                "message": self.to_string()
            },
            "id": id
        })
    }
}

/// Convert from OrchestratorError to McpError
impl From<OrchestratorError> for McpError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::NotFound(entity_type, id) => {
                McpError::NotFound(format!("{entity_type} {id}"))
            }
            OrchestratorError::Validation(msg) => McpError::Validation(msg),
            OrchestratorError::PrerequisiteNotMet { reason, .. } => {
                McpError::PrerequisiteNotMet(reason)
            }
            err @ OrchestratorError::CycleDetected { .. } => {
                McpError::CycleDetected(err.to_string())
            }
            OrchestratorError::DuplicateDependency { from, to } => {
                McpError::Validation(format!("dependency between {from} and {to} already exists"))
            }
            OrchestratorError::Store(msg) => McpError::Store(msg),
            OrchestratorError::Config(msg) => {
                McpError::Protocol(format!("Configuration error: {msg}"))
            }
            OrchestratorError::Internal(msg) => McpError::Protocol(format!("Internal error: {msg}")),
        }
    }
}

/// Convert from anyhow::Error to McpError
impl From<anyhow::Error> for McpError {
    fn from(err: anyhow::Error) -> Self {
        // Try to downcast to the core error first
        if let Some(core_error) = err.downcast_ref::<OrchestratorError>() {
            return Self::from(core_error.clone());
        }

        let error_msg = err.to_string();
        if error_msg.contains("serialize") || error_msg.contains("deserialize") {
            McpError::Serialization(error_msg)
        } else if error_msg.contains("parse") || error_msg.contains("invalid") {
            McpError::Validation(error_msg)
        } else {
            McpError::Protocol(error_msg)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(McpError::NotFound("task 1".into()).to_error_code(), -32001);
        assert_eq!(McpError::Validation("bad".into()).to_error_code(), -32002);
        assert_eq!(
            McpError::PrerequisiteNotMet("summary".into()).to_error_code(),
            -32003
        );
        assert_eq!(McpError::CycleDetected("a->b->a".into()).to_error_code(), -32004);
        assert_eq!(McpError::Store("io".into()).to_error_code(), -32005);
        assert_eq!(McpError::Protocol("bad method".into()).to_error_code(), -32006);
    }

    #[test]
    fn test_json_rpc_error() {
        let error = McpError::NotFound("task 123".into());
        let json_error = error.to_json_rpc_error(Some(json!(1)));

        assert_eq!(json_error["jsonrpc"], "2.0");
        assert_eq!(json_error["error"]["code"], -32001);
        assert_eq!(json_error["id"], 1);
    }

    #[test]
    fn test_core_error_mapping() {
        let err = OrchestratorError::prerequisite("feature has open tasks");
        let mapped = McpError::from(err);
        assert!(matches!(mapped, McpError::PrerequisiteNotMet(_)));
        assert_eq!(mapped.to_error_code(), -32003);
    }
}
