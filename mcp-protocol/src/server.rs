//! HTTP transport: JSON-RPC over POST plus an SSE channel.

use std::sync::Arc;

use axum::{
    extract::State,
    http::StatusCode,
    response::Sse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio_stream::wrappers::UnboundedReceiverStream;
use tracing::info;

use crate::{
    error::McpError,
    handler::McpToolHandler,
    serialization::{create_success_response, deserialize_params},
};
use orchestrator_core::{protocol::ProtocolHandler, repository::EntityStore};

/// Names of the tool methods exposed over JSON-RPC.
pub const TOOL_METHODS: &[&str] = &[
    "manage_container",
    "query_container",
    "manage_dependency",
    "query_dependencies",
    "get_next_item",
    "get_blocked",
    "progress",
    "flow_path",
    "create_work_tree",
    "health_check",
];

/// MCP server over HTTP with an SSE side channel.
pub struct McpServer<S> {
    handler: Arc<McpToolHandler<S>>,
}

impl<S: EntityStore + 'static> McpServer<S> {
    pub fn new(handler: Arc<McpToolHandler<S>>) -> Self {
        Self { handler }
    }

    /// Bind and serve until the listener fails or the task is cancelled.
    pub async fn serve(self, addr: &str) -> Result<(), Box<dyn std::error::Error>> {
        let app = self.create_router();

        info!("Starting MCP server on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;
        axum::serve(listener, app).await?;

        Ok(())
    }

    fn create_router(self) -> Router {
        Router::new()
            .route("/mcp/v1", get(sse_handler))
            .route("/mcp/v1/rpc", post(rpc_handler::<S>))
            .route("/health", get(health_handler))
            .with_state(self.handler)
    }
}

/// Route one JSON-RPC method to the tool handler.
pub async fn route_method<S: EntityStore + 'static>(
    handler: &McpToolHandler<S>,
    method: &str,
    params: Value,
    id: Option<Value>,
) -> Value {
    match execute_method(handler, method, params).await {
        Ok(value) => create_success_response(id, value),
        Err(err) => err.to_json_rpc_error(id),
    }
}

async fn execute_method<S: EntityStore + 'static>(
    handler: &McpToolHandler<S>,
    method: &str,
    params: Value,
) -> Result<Value, McpError> {
    // Absent params mean "all defaults", not a type error.
    let params = if params.is_null() { json!({}) } else { params };
    let envelope = match method {
        "manage_container" => handler.manage_container(deserialize_params(params)?).await,
        "query_container" => handler.query_container(deserialize_params(params)?).await,
        "manage_dependency" => handler.manage_dependency(deserialize_params(params)?).await,
        "query_dependencies" => {
            handler
                .query_dependencies(deserialize_params(params)?)
                .await
        }
        "get_next_item" => handler.get_next_item(deserialize_params(params)?).await,
        "get_blocked" => handler.get_blocked(deserialize_params(params)?).await,
        "progress" => handler.progress(deserialize_params(params)?).await,
        "flow_path" => handler.flow_path(deserialize_params(params)?).await,
        "create_work_tree" => handler.create_work_tree(deserialize_params(params)?).await,
        "health_check" => handler.health_check().await,
        _ => return Err(McpError::Protocol(format!("Unknown method: {method}"))),
    };
    serde_json::to_value(envelope).map_err(|e| McpError::Serialization(e.to_string()))
}

/// SSE endpoint for MCP communication
async fn sse_handler<S: EntityStore + 'static>(
    State(_handler): State<Arc<McpToolHandler<S>>>,
) -> Result<Sse<UnboundedReceiverStream<Result<axum::response::sse::Event, axum::Error>>>, StatusCode>
{
    let (tx, rx) = mpsc::unbounded_channel();

    let welcome_event = axum::response::sse::Event::default().data(
        json!({
            "jsonrpc": "2.0",
            "method": "connection_established",
            "params": {
                "server": "task-orchestrator",
                "version": env!("CARGO_PKG_VERSION"),
                "capabilities": TOOL_METHODS,
            }
        })
        .to_string(),
    );

    if tx.send(Ok(welcome_event)).is_err() {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }

    // Heartbeat keeps intermediaries from closing the stream.
    let heartbeat_tx = tx.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(std::time::Duration::from_secs(30));
        loop {
            interval.tick().await;
            let heartbeat = axum::response::sse::Event::default()
                .event("heartbeat")
                .data("ping");

            if heartbeat_tx.send(Ok(heartbeat)).is_err() {
                break;
            }
        }
    });

    let stream = UnboundedReceiverStream::new(rx);
    Ok(Sse::new(stream))
}

/// JSON-RPC endpoint for MCP communication
async fn rpc_handler<S: EntityStore + 'static>(
    State(handler): State<Arc<McpToolHandler<S>>>,
    Json(request): Json<Value>,
) -> Json<Value> {
    let id = request.get("id").cloned();

    let method = match request.get("method").and_then(|v| v.as_str()) {
        Some(method) => method,
        None => {
            let error = McpError::Protocol(
                "Missing or invalid 'method' field in JSON-RPC request".to_string(),
            );
            return Json(error.to_json_rpc_error(id));
        }
    };

    let params = request.get("params").cloned().unwrap_or(Value::Null);
    let response = route_method(handler.as_ref(), method, params, id).await;

    Json(response)
}

/// Health check endpoint
async fn health_handler() -> &'static str {
    "OK"
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_methods_cover_the_surface() {
        assert!(TOOL_METHODS.contains(&"manage_container"));
        assert!(TOOL_METHODS.contains(&"get_next_item"));
        assert!(TOOL_METHODS.contains(&"create_work_tree"));
        assert_eq!(TOOL_METHODS.len(), 10);
    }
}
