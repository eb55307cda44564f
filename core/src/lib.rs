//! Orchestrator Core Library
//!
//! Domain models, business logic, and trait interfaces for the task
//! orchestration system: hierarchical projects / features / tasks with
//! config-driven status flows, prerequisite-gated transitions, cascading
//! status propagation, and dependency-aware work recommendation.
//!
//! # Architecture
//!
//! - [`models`] - Core domain models (Project, Feature, Task, Dependency, ...)
//! - [`error`] - Error taxonomy and result handling
//! - [`repository`] - Entity store trait the engine persists through
//! - [`workflow`] - Config loader, flow resolver, transition validator,
//!   progression service, and cascade engine
//! - [`services`] - Dependency graph, next-task recommendation, work trees
//! - [`protocol`] - Tool-surface parameter types and the response envelope
//! - [`validation`] - Input validation for the tool layer
//!
//! The engine performs no I/O beyond the store trait; transports and
//! persistence live in sibling crates.

pub mod error;
pub mod models;
pub mod protocol;
pub mod repository;
pub mod services;
pub mod validation;
pub mod workflow;

// Re-export commonly used types at the crate root for convenience
pub use error::{OrchestratorError, Result};
pub use models::{
    ContainerType, Dependency, DependencyType, Feature, FeatureQuery, NewDependency, NewFeature,
    NewProject, NewTask, Priority, Project, ProjectQuery, RoleTransition, StatusRole, Task,
    TaskQuery, UnblockThreshold, UpdateFeature, UpdateProject, UpdateTask, WorkScope,
    WorkTreeCreated, WorkTreeSpec,
};
pub use protocol::{
    FlowPathParams, GetBlockedParams, GetNextItemParams, HealthStatus, ManageContainerParams,
    ManageDependencyParams, ManageOp, ProgressParams, ProtocolHandler, QueryContainerParams,
    QueryDependenciesParams, QueryOp, ResponseEnvelope,
};
pub use repository::{EdgeDirection, EntityStore, StoreStats};
pub use services::{
    dependency::DependencyService, recommend::NextTaskService, work_tree::WorkTreeService,
};
pub use validation::RequestValidator;
pub use workflow::{
    cascade::{CascadeEngine, CascadeOutcome, CascadeRecord},
    config::WorkflowConfig,
    loader::WorkflowConfigLoader,
    progression::{Progression, ProgressionService},
    validation::{TransitionCheck, TransitionTrigger, TransitionValidator},
};

/// Current version of the core crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Current crate name
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crate_constants() {
        assert!(!VERSION.is_empty());
        assert_eq!(CRATE_NAME, "orchestrator-core");
    }

    #[test]
    fn test_re_exports() {
        let role = StatusRole::Work;
        assert!(role.at_least(StatusRole::Queue));

        let error = OrchestratorError::validation("bad input");
        assert!(error.is_validation());
    }
}
