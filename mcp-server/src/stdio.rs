//! STDIO Transport for the MCP server.
//!
//! Line-based JSON-RPC 2.0 over stdin/stdout with the MCP
//! initialize/initialized handshake. Tool calls route into the same handler
//! as the HTTP transport.

use anyhow::{Context, Result};
use mcp_protocol::{route_method, McpError, McpToolHandler};
use orchestrator_core::repository::EntityStore;
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{debug, error, info, warn};

/// MCP protocol state tracking
#[derive(Debug, PartialEq)]
enum McpState {
    /// Waiting for initialize request from client
    WaitingForInitialize,
    /// Initialize received, waiting for initialized notification
    WaitingForInitialized,
    /// Fully initialized and ready to process requests
    Ready,
}

/// STDIO MCP server with protocol state management
pub struct StdioMcpServer<S> {
    handler: Arc<McpToolHandler<S>>,
    state: McpState,
}

impl<S: EntityStore + 'static> StdioMcpServer<S> {
    pub fn new(handler: Arc<McpToolHandler<S>>) -> Self {
        Self {
            handler,
            state: McpState::WaitingForInitialize,
        }
    }

    /// Serve until stdin closes.
    pub async fn serve(mut self) -> Result<()> {
        info!("Starting MCP server in STDIO mode - waiting for initialize request");

        let stdin = tokio::io::stdin();
        let mut stdout = tokio::io::stdout();
        let mut reader = BufReader::new(stdin);
        let mut line = String::new();

        loop {
            line.clear();

            match reader.read_line(&mut line).await {
                Ok(0) => {
                    info!("STDIN closed, shutting down MCP server");
                    break;
                }
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    debug!("Received line: {}", trimmed);

                    match self.process_message(trimmed).await {
                        Ok(Some(response)) => {
                            let response_json = serde_json::to_string(&response)
                                .context("Failed to serialize JSON-RPC response")?;

                            stdout
                                .write_all(response_json.as_bytes())
                                .await
                                .context("Failed to write response to stdout")?;
                            stdout
                                .write_all(b"\n")
                                .await
                                .context("Failed to write newline to stdout")?;
                            stdout.flush().await.context("Failed to flush stdout")?;
                        }
                        Ok(None) => {
                            debug!("Processed notification successfully");
                        }
                        Err(e) => {
                            error!("Error processing message: {}", e);

                            let id = extract_id_from_line(trimmed);
                            let error_response =
                                McpError::Protocol(e.to_string()).to_json_rpc_error(id);
                            let error_json = serde_json::to_string(&error_response)
                                .unwrap_or_else(|_| r#"{"jsonrpc":"2.0","error":{"code":-32603,"message":"Internal error"},"id":null}"#.to_string());

                            let _ = stdout.write_all(error_json.as_bytes()).await;
                            let _ = stdout.write_all(b"\n").await;
                            let _ = stdout.flush().await;
                        }
                    }
                }
                Err(e) => {
                    error!("Error reading from stdin: {}", e);
                    break;
                }
            }
        }

        info!("STDIO MCP server shutdown complete");
        Ok(())
    }

    /// Process one message; requests get a response, notifications don't.
    async fn process_message(&mut self, line: &str) -> Result<Option<Value>> {
        let message: Value =
            serde_json::from_str(line).context("Failed to parse JSON-RPC message")?;

        if message.get("jsonrpc").and_then(|v| v.as_str()) != Some("2.0") {
            return Err(anyhow::anyhow!("Invalid JSON-RPC version"));
        }

        let method = message
            .get("method")
            .and_then(|v| v.as_str())
            .context("Missing or invalid 'method' field")?;

        let id = message.get("id").cloned();
        let params = message.get("params").cloned().unwrap_or(Value::Null);
        let is_notification = id.is_none();

        match (&self.state, method) {
            (McpState::WaitingForInitialize, "initialize") => {
                if is_notification {
                    return Err(anyhow::anyhow!(
                        "Initialize must be a request, not a notification"
                    ));
                }

                info!("Received initialize request");
                self.state = McpState::WaitingForInitialized;

                Ok(Some(json!({
                    "jsonrpc": "2.0",
                    "result": {
                        "protocolVersion": "2024-11-05",
                        "capabilities": {
                            "tools": {
                                "listChanged": true
                            }
                        },
                        "serverInfo": {
                            "name": "task-orchestrator",
                            "version": env!("CARGO_PKG_VERSION")
                        }
                    },
                    "id": id
                })))
            }

            (McpState::WaitingForInitialized, "notifications/initialized") => {
                if !is_notification {
                    return Err(anyhow::anyhow!(
                        "Initialized must be a notification, not a request"
                    ));
                }

                info!("Received initialized notification - server is ready");
                self.state = McpState::Ready;
                Ok(None)
            }

            (McpState::Ready, _) => {
                if is_notification {
                    match method {
                        "notifications/cancelled" => {
                            debug!("Received cancelled notification");
                            Ok(None)
                        }
                        _ => {
                            warn!("Unknown notification method: {}", method);
                            Ok(None)
                        }
                    }
                } else {
                    match method {
                        "tools/list" => Ok(Some(json!({
                            "jsonrpc": "2.0",
                            "result": tool_catalog(),
                            "id": id
                        }))),
                        "tools/call" => {
                            let tool_name = params
                                .get("name")
                                .and_then(|v| v.as_str())
                                .context("Missing tool name in tools/call")?
                                .to_string();
                            let arguments = params
                                .get("arguments")
                                .cloned()
                                .unwrap_or_else(|| json!({}));

                            let response = route_method(
                                self.handler.as_ref(),
                                &tool_name,
                                arguments,
                                id.clone(),
                            )
                            .await;

                            // Wrap the envelope as MCP tool-call content.
                            if let Some(result) = response.get("result") {
                                Ok(Some(json!({
                                    "jsonrpc": "2.0",
                                    "result": {
                                        "content": [{
                                            "type": "text",
                                            "text": serde_json::to_string_pretty(result)
                                                .unwrap_or_default()
                                        }]
                                    },
                                    "id": id
                                })))
                            } else {
                                Ok(Some(response))
                            }
                        }
                        _ => {
                            // Direct JSON-RPC method names also work.
                            Ok(Some(
                                route_method(self.handler.as_ref(), method, params, id).await,
                            ))
                        }
                    }
                }
            }

            _ => Err(anyhow::anyhow!(
                "Invalid method '{}' for current state {:?}",
                method,
                self.state
            )),
        }
    }
}

fn extract_id_from_line(line: &str) -> Option<Value> {
    serde_json::from_str::<Value>(line)
        .ok()
        .and_then(|v| v.get("id").cloned())
}

/// MCP tool catalog returned by `tools/list`.
fn tool_catalog() -> Value {
    let container_type = json!({"type": "string", "enum": ["project", "feature", "task"]});
    json!({
        "tools": [
            {
                "name": "manage_container",
                "description": "Create, read, update, set status on, or delete a project, feature, or task",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "op": {"type": "string", "enum": ["create", "get", "update", "set_status", "delete"]},
                        "container_type": container_type,
                        "id": {"type": "string"},
                        "status": {"type": "string"},
                        "summary": {"type": "string"},
                        "data": {"type": "object"}
                    },
                    "required": ["op", "container_type"]
                }
            },
            {
                "name": "query_container",
                "description": "Read projections: get, search, overview (metadata + counts), history",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "op": {"type": "string", "enum": ["get", "search", "overview", "history"]},
                        "container_type": container_type,
                        "id": {"type": "string"},
                        "filters": {"type": "object"}
                    },
                    "required": ["op", "container_type"]
                }
            },
            {
                "name": "manage_dependency",
                "description": "Create, delete, or list dependencies between tasks",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "op": {"type": "string", "enum": ["create", "delete", "list"]},
                        "id": {"type": "string"},
                        "from_task": {"type": "string"},
                        "to_task": {"type": "string"},
                        "dep_type": {"type": "string", "enum": ["BLOCKS", "IS_BLOCKED_BY", "RELATES_TO"]},
                        "unblock_at": {"type": "string", "enum": ["queue", "work", "review", "terminal"]},
                        "task_id": {"type": "string"},
                        "direction": {"type": "string", "enum": ["incoming", "outgoing", "both"]},
                        "include_task_info": {"type": "boolean"}
                    },
                    "required": ["op"]
                }
            },
            {
                "name": "query_dependencies",
                "description": "List a task's dependency edges",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "task_id": {"type": "string"},
                        "direction": {"type": "string", "enum": ["incoming", "outgoing", "both"]},
                        "include_task_info": {"type": "boolean"}
                    },
                    "required": ["task_id"]
                }
            },
            {
                "name": "get_next_item",
                "description": "Recommend the next unblocked task(s), quick wins first",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "project_id": {"type": "string"},
                        "feature_id": {"type": "string"},
                        "limit": {"type": "integer", "minimum": 1, "maximum": 20},
                        "detail": {"type": "boolean"}
                    }
                }
            },
            {
                "name": "get_blocked",
                "description": "List tasks with unsatisfied blocking dependencies",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "project_id": {"type": "string"},
                        "feature_id": {"type": "string"},
                        "detail": {"type": "boolean"}
                    }
                }
            },
            {
                "name": "progress",
                "description": "Recommend the next status, or check readiness for a target status",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "container_type": container_type,
                        "entity_id": {"type": "string"},
                        "tags": {"type": "array", "items": {"type": "string"}},
                        "current_status": {"type": "string"},
                        "target_status": {"type": "string"}
                    },
                    "required": ["container_type", "current_status"]
                }
            },
            {
                "name": "flow_path",
                "description": "Project the active flow for a container type and tag set",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "container_type": container_type,
                        "tags": {"type": "array", "items": {"type": "string"}},
                        "current_status": {"type": "string"}
                    },
                    "required": ["container_type"]
                }
            },
            {
                "name": "create_work_tree",
                "description": "Atomically create a project, features, tasks, and dependencies",
                "inputSchema": {
                    "type": "object",
                    "properties": {
                        "project": {"type": "object"},
                        "features": {"type": "array", "items": {"type": "object"}}
                    }
                }
            },
            {
                "name": "health_check",
                "description": "Check the health status of the server",
                "inputSchema": {"type": "object"}
            }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_catalog_lists_every_method() {
        let catalog = tool_catalog();
        let tools = catalog["tools"].as_array().unwrap();
        assert_eq!(tools.len(), 10);
        for tool in tools {
            assert!(tool["name"].is_string());
            assert!(tool["inputSchema"].is_object());
        }
    }

    #[test]
    fn extract_id_handles_garbage() {
        assert_eq!(extract_id_from_line("not json"), None);
        assert_eq!(
            extract_id_from_line(r#"{"jsonrpc":"2.0","id":5,"method":"x"}"#),
            Some(json!(5))
        );
    }
}
