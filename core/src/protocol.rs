//! Tool-surface types: operation parameters, the response envelope, and the
//! protocol handler trait the transport adapters drive.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::OrchestratorError,
    models::{ContainerType, DependencyType, Priority, UnblockThreshold, WorkTreeSpec},
    repository::EdgeDirection,
};

/// Response envelope every tool operation returns.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseEnvelope {
    pub success: bool,
    pub message: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<EnvelopeError>,
    pub metadata: ResponseMetadata,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EnvelopeError {
    /// Stable code string, e.g. `PREREQUISITE_NOT_MET`.
    pub code: String,
    /// Human-readable details.
    pub details: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseMetadata {
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl Default for ResponseMetadata {
    fn default() -> Self {
        Self {
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl ResponseEnvelope {
    pub fn ok(message: impl Into<String>, data: Option<serde_json::Value>) -> Self {
        Self {
            success: true,
            message: message.into(),
            data,
            error: None,
            metadata: ResponseMetadata::default(),
        }
    }

    pub fn failure(error: &OrchestratorError) -> Self {
        let suggestions = match error {
            OrchestratorError::PrerequisiteNotMet { suggestions, .. } => suggestions.clone(),
            _ => vec![],
        };
        Self {
            success: false,
            message: error.to_string(),
            data: None,
            error: Some(EnvelopeError {
                code: error.error_code().to_string(),
                details: error.to_string(),
                suggestions,
            }),
            metadata: ResponseMetadata::default(),
        }
    }

    /// Serialize `data` through serde; a serialization failure degrades to an
    /// internal-error envelope rather than panicking.
    pub fn ok_with<T: Serialize>(message: impl Into<String>, data: &T) -> Self {
        match serde_json::to_value(data) {
            Ok(value) => Self::ok(message, Some(value)),
            Err(e) => Self::failure(&OrchestratorError::Internal(format!(
                "response serialization failed: {e}"
            ))),
        }
    }
}

// --- manage_container -------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ManageOp {
    Create,
    Get,
    Update,
    SetStatus,
    Delete,
}

/// Write-path entry point. The `data` payload is deserialized per container
/// type by the handler (`NewProject` / `UpdateTask` / ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManageContainerParams {
    pub op: ManageOp,
    pub container_type: ContainerType,
    pub id: Option<Uuid>,
    /// Target status for `set_status`.
    pub status: Option<String>,
    /// Completion summary accompanying a `set_status` into terminal.
    pub summary: Option<String>,
    /// Creation / update payload.
    pub data: Option<serde_json::Value>,
}

// --- query_container --------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QueryOp {
    Get,
    Search,
    /// Metadata plus child status counts; no nested content.
    Overview,
    /// Role-transition audit trail for one entity.
    History,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct QueryFilters {
    pub project_id: Option<Uuid>,
    pub feature_id: Option<Uuid>,
    pub status: Option<String>,
    pub priority: Option<Priority>,
    pub tag: Option<String>,
    pub text: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryContainerParams {
    pub op: QueryOp,
    pub container_type: ContainerType,
    pub id: Option<Uuid>,
    #[serde(default)]
    pub filters: QueryFilters,
}

// --- dependencies -----------------------------------------------------------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DependencyOp {
    Create,
    Delete,
    List,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManageDependencyParams {
    pub op: DependencyOp,
    /// Edge id, for `delete`.
    pub id: Option<Uuid>,
    pub from_task: Option<Uuid>,
    pub to_task: Option<Uuid>,
    #[serde(default)]
    pub dep_type: DependencyType,
    pub unblock_at: Option<UnblockThreshold>,
    /// Task whose edges to list, for `list`.
    pub task_id: Option<Uuid>,
    #[serde(default)]
    pub direction: EdgeDirection,
    #[serde(default)]
    pub include_task_info: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryDependenciesParams {
    pub task_id: Uuid,
    #[serde(default)]
    pub direction: EdgeDirection,
    #[serde(default)]
    pub include_task_info: bool,
}

// --- recommendation & blocked set -------------------------------------------

fn default_limit() -> u32 {
    1
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetNextItemParams {
    pub project_id: Option<Uuid>,
    pub feature_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: u32,
    #[serde(default)]
    pub detail: bool,
}

impl Default for GetNextItemParams {
    fn default() -> Self {
        Self {
            project_id: None,
            feature_id: None,
            limit: default_limit(),
            detail: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct GetBlockedParams {
    pub project_id: Option<Uuid>,
    pub feature_id: Option<Uuid>,
    #[serde(default)]
    pub detail: bool,
}

// --- progression ------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressParams {
    pub container_type: ContainerType,
    pub entity_id: Option<Uuid>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub current_status: String,
    /// When present this is a readiness check against the given target
    /// instead of a next-step recommendation.
    pub target_status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowPathParams {
    pub container_type: ContainerType,
    #[serde(default)]
    pub tags: Vec<String>,
    pub current_status: Option<String>,
}

/// Health status response for MCP clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub store: bool,
    pub protocol: bool,
    pub timestamp: DateTime<Utc>,
    pub version: String,
}

impl Default for HealthStatus {
    fn default() -> Self {
        Self {
            status: "unknown".to_string(),
            store: false,
            protocol: false,
            timestamp: Utc::now(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// The tool surface the transport adapters drive.
///
/// Every method answers with the envelope; domain rejections are carried in
/// `error`, never as Rust errors, so a transport can serialize the result
/// unconditionally.
#[async_trait]
pub trait ProtocolHandler: Send + Sync {
    async fn manage_container(&self, params: ManageContainerParams) -> ResponseEnvelope;

    async fn query_container(&self, params: QueryContainerParams) -> ResponseEnvelope;

    async fn manage_dependency(&self, params: ManageDependencyParams) -> ResponseEnvelope;

    async fn query_dependencies(&self, params: QueryDependenciesParams) -> ResponseEnvelope;

    async fn get_next_item(&self, params: GetNextItemParams) -> ResponseEnvelope;

    async fn get_blocked(&self, params: GetBlockedParams) -> ResponseEnvelope;

    async fn progress(&self, params: ProgressParams) -> ResponseEnvelope;

    async fn flow_path(&self, params: FlowPathParams) -> ResponseEnvelope;

    async fn create_work_tree(&self, params: WorkTreeSpec) -> ResponseEnvelope;

    async fn health_check(&self) -> ResponseEnvelope;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_envelope_shape() {
        let envelope = ResponseEnvelope::ok("done", Some(serde_json::json!({"id": 1})));
        assert!(envelope.success);
        assert!(envelope.error.is_none());
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["message"], "done");
        assert_eq!(json["data"]["id"], 1);
        assert!(json["metadata"]["version"].is_string());
    }

    #[test]
    fn failure_envelope_carries_stable_code() {
        let error = OrchestratorError::prerequisite_with_suggestions(
            "missing summary",
            vec!["write a summary".to_string()],
        );
        let envelope = ResponseEnvelope::failure(&error);
        assert!(!envelope.success);
        let err = envelope.error.unwrap();
        assert_eq!(err.code, "PREREQUISITE_NOT_MET");
        assert_eq!(err.suggestions.len(), 1);
    }

    #[test]
    fn params_deserialize_with_defaults() {
        let params: GetNextItemParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params.limit, 1);
        assert!(!params.detail);

        let params: QueryDependenciesParams = serde_json::from_value(serde_json::json!({
            "task_id": Uuid::new_v4(),
        }))
        .unwrap();
        assert_eq!(params.direction, EdgeDirection::Both);
        assert!(!params.include_task_info);
    }

    #[test]
    fn manage_op_wire_names() {
        assert_eq!(
            serde_json::to_value(ManageOp::SetStatus).unwrap(),
            "set_status"
        );
        assert_eq!(serde_json::to_value(QueryOp::Overview).unwrap(), "overview");
    }
}
