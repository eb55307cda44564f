use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    error::Result,
    models::{
        ContainerType, Dependency, Feature, FeatureQuery, NewDependency, NewFeature, NewProject,
        NewTask, Project, ProjectQuery, RoleTransition, Task, TaskQuery, UpdateFeature,
        UpdateProject, UpdateTask, WorkTreeCreated, WorkTreeSpec,
    },
};

/// Which end of a task's blocking edges a query wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EdgeDirection {
    /// Edges pointing at the task (`BLOCKS` into it, `IS_BLOCKED_BY` out of it).
    Incoming,
    /// Edges the task points at.
    Outgoing,
    #[default]
    Both,
}

/// Store interface consumed by the orchestration engine.
///
/// Implementations must be thread-safe and linearizable: a read issued after
/// a committed write observes that write. Compound operations
/// (`create_work_tree`, the `delete_*` cascades) are atomic: they commit
/// together or not at all.
///
/// The engine performs no I/O besides calls on this trait.
#[async_trait]
pub trait EntityStore: Send + Sync {
    // --- Projects -----------------------------------------------------------

    /// Create a project.
    ///
    /// # Returns
    /// * `Ok(Project)` - The created project with assigned id and timestamps
    /// * `Err(OrchestratorError::Store)` - If the write fails
    async fn create_project(&self, project: NewProject, status: String) -> Result<Project>;

    /// * `Ok(Some(Project))` / `Ok(None)` - Lookup by id
    async fn get_project(&self, id: Uuid) -> Result<Option<Project>>;

    async fn list_projects(&self, query: ProjectQuery) -> Result<Vec<Project>>;

    /// Update non-status fields. Only `Some` fields are written.
    ///
    /// # Returns
    /// * `Err(OrchestratorError::NotFound)` - If the project doesn't exist
    async fn update_project(&self, id: Uuid, updates: UpdateProject) -> Result<Project>;

    /// Delete a project and cascade to its features, their tasks, and every
    /// edge/transition owned by the deleted entities.
    async fn delete_project(&self, id: Uuid) -> Result<()>;

    // --- Features -----------------------------------------------------------

    async fn create_feature(&self, feature: NewFeature, status: String) -> Result<Feature>;

    async fn get_feature(&self, id: Uuid) -> Result<Option<Feature>>;

    async fn list_features(&self, query: FeatureQuery) -> Result<Vec<Feature>>;

    /// Features parented by `project_id`, in creation order.
    async fn features_of_project(&self, project_id: Uuid) -> Result<Vec<Feature>>;

    async fn update_feature(&self, id: Uuid, updates: UpdateFeature) -> Result<Feature>;

    /// Delete a feature, cascading to tasks and their edges/transitions.
    async fn delete_feature(&self, id: Uuid) -> Result<()>;

    // --- Tasks --------------------------------------------------------------

    async fn create_task(&self, task: NewTask, status: String) -> Result<Task>;

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>>;

    async fn list_tasks(&self, query: TaskQuery) -> Result<Vec<Task>>;

    /// Tasks parented by `feature_id`, in creation order.
    async fn tasks_of_feature(&self, feature_id: Uuid) -> Result<Vec<Task>>;

    async fn update_task(&self, id: Uuid, updates: UpdateTask) -> Result<Task>;

    /// Delete a task, cascading to edges (either endpoint) and transitions.
    async fn delete_task(&self, id: Uuid) -> Result<()>;

    // --- Status writes ------------------------------------------------------

    /// Write a (already validated) status onto an entity and bump
    /// `modified_at`. The engine owns validation; the store just persists.
    ///
    /// # Returns
    /// * `Err(OrchestratorError::NotFound)` - If the entity doesn't exist
    async fn set_status(
        &self,
        entity_type: ContainerType,
        id: Uuid,
        status: String,
    ) -> Result<()>;

    // --- Dependencies -------------------------------------------------------

    /// Insert an edge. The caller has already run the cycle check.
    ///
    /// # Returns
    /// * `Err(OrchestratorError::DuplicateDependency)` - On a repeated
    ///   `(from, to, type)` triple
    async fn create_dependency(&self, dep: NewDependency) -> Result<Dependency>;

    async fn get_dependency(&self, id: Uuid) -> Result<Option<Dependency>>;

    async fn delete_dependency(&self, id: Uuid) -> Result<()>;

    /// Every edge touching `task_id` in the given direction, any type.
    async fn dependencies_for(
        &self,
        task_id: Uuid,
        direction: EdgeDirection,
    ) -> Result<Vec<Dependency>>;

    /// Blocking-type edges only (`BLOCKS` / `IS_BLOCKED_BY`), for the
    /// blocked-set and cycle computations.
    async fn find_blocking_edges(
        &self,
        task_id: Uuid,
        direction: EdgeDirection,
    ) -> Result<Vec<Dependency>>;

    // --- Role transitions ---------------------------------------------------

    /// Append an audit record. Records are never updated or deleted except
    /// by parent-entity cascade.
    async fn append_transition(&self, record: RoleTransition) -> Result<()>;

    async fn transitions_for(&self, entity_id: Uuid) -> Result<Vec<RoleTransition>>;

    async fn count_transitions(&self, entity_id: Uuid) -> Result<u64>;

    // --- Content substrate (out-of-scope side; counts only) -----------------

    /// Number of content sections attached to an entity. The cleanup policy
    /// treats any non-zero count as user-authored content worth retaining.
    async fn count_sections(&self, entity_id: Uuid) -> Result<u64>;

    // --- Bulk ---------------------------------------------------------------

    /// Atomically create a work tree (project, features, tasks, edges).
    /// Statuses arrive pre-resolved in `statuses` order-aligned with the
    /// payload's features/tasks. The cycle check has already run; the store
    /// still rolls the whole tree back on any constraint failure.
    async fn create_work_tree(
        &self,
        spec: WorkTreeSpec,
        project_status: String,
        feature_statuses: Vec<String>,
        task_statuses: Vec<String>,
    ) -> Result<WorkTreeCreated>;

    // --- Monitoring ---------------------------------------------------------

    /// * `Ok(())` - Store is reachable and healthy
    async fn health_check(&self) -> Result<()>;

    async fn get_stats(&self) -> Result<StoreStats>;
}

/// Store statistics for monitoring and the overview projection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StoreStats {
    pub total_projects: u64,
    pub total_features: u64,
    pub total_tasks: u64,
    pub total_dependencies: u64,
    /// Task counts keyed by raw status string.
    pub tasks_by_status: std::collections::HashMap<String, u64>,
}
