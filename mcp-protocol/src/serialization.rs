//! Parameter deserialization and JSON-RPC response helpers.

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::error::McpError;

/// Deserialize JSON-RPC params into a typed parameter struct.
///
/// Missing-field and type errors surface as validation errors naming the
/// offending field, which is what the assistant on the other end needs.
pub fn deserialize_params<T: DeserializeOwned>(params: Value) -> Result<T, McpError> {
    serde_json::from_value(params).map_err(|e| McpError::Validation(format!("invalid params: {e}")))
}

/// Build a JSON-RPC 2.0 success response.
pub fn create_success_response(id: Option<Value>, result: Value) -> Value {
    json!({
        "jsonrpc": "2.0",
        "result": result,
        "id": id
    })
}
