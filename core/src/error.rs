use thiserror::Error;
use uuid::Uuid;

use crate::models::ContainerType;

/// Result type alias for orchestration operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

/// Error taxonomy for the orchestration engine.
///
/// Domain outcomes (transition checks, progression answers, cascade records)
/// are typed result enums returned by value; these errors cover the failure
/// kinds that cross component boundaries. Each kind maps to a stable error
/// code string for the response envelope.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OrchestratorError {
    /// Malformed input: bad UUID, out-of-range limit, unknown status,
    /// missing required field. Raised only at the tool layer.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Entity id resolved to nothing.
    #[error("{0} not found: {1}")]
    NotFound(ContainerType, String),

    /// The prerequisite validator rejected a transition.
    #[error("Prerequisite not met: {reason}")]
    PrerequisiteNotMet {
        reason: String,
        suggestions: Vec<String>,
    },

    /// A dependency creation would introduce a cycle in the blocking graph.
    #[error("Dependency cycle detected: {}", path_display(.path))]
    CycleDetected { path: Vec<Uuid> },

    /// A `(from, to, type)` edge already exists.
    #[error("Dependency already exists between {from} and {to}")]
    DuplicateDependency { from: Uuid, to: Uuid },

    /// Underlying persistence failure. Always surfaces to the caller.
    #[error("Store error: {0}")]
    Store(String),

    /// Workflow YAML parse failure. The loader swallows this into the
    /// default-config fallback; it never reaches the tool surface.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal invariant violation.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn path_display(path: &[Uuid]) -> String {
    path.iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}

impl OrchestratorError {
    pub fn not_found(entity_type: ContainerType, id: Uuid) -> Self {
        Self::NotFound(entity_type, id.to_string())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn empty_field(field: &str) -> Self {
        Self::Validation(format!("Field '{field}' cannot be empty"))
    }

    pub fn prerequisite(reason: impl Into<String>) -> Self {
        Self::PrerequisiteNotMet {
            reason: reason.into(),
            suggestions: vec![],
        }
    }

    pub fn prerequisite_with_suggestions(
        reason: impl Into<String>,
        suggestions: Vec<String>,
    ) -> Self {
        Self::PrerequisiteNotMet {
            reason: reason.into(),
            suggestions,
        }
    }

    pub fn store(msg: impl Into<String>) -> Self {
        Self::Store(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, OrchestratorError::NotFound(_, _))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, OrchestratorError::Validation(_))
    }

    pub fn is_store(&self) -> bool {
        matches!(self, OrchestratorError::Store(_))
    }

    /// Stable error code string carried in the response envelope.
    pub fn error_code(&self) -> &'static str {
        match self {
            OrchestratorError::Validation(_) => "VALIDATION_ERROR",
            OrchestratorError::NotFound(_, _) => "RESOURCE_NOT_FOUND",
            OrchestratorError::PrerequisiteNotMet { .. } => "PREREQUISITE_NOT_MET",
            OrchestratorError::CycleDetected { .. } => "CYCLE_DETECTED",
            OrchestratorError::DuplicateDependency { .. } => "DUPLICATE_DEPENDENCY",
            OrchestratorError::Store(_) => "STORE_ERROR",
            OrchestratorError::Config(_) => "CONFIGURATION_ERROR",
            OrchestratorError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
