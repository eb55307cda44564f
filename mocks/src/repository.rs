//! Mock implementation of the EntityStore trait
//!
//! Provides a thread-safe in-memory store with:
//! - Error injection capabilities
//! - Call tracking for verification
//! - Deterministic creation ordering (insertion order, not wall clock)

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use orchestrator_core::{
    error::{OrchestratorError, Result},
    models::{
        ContainerType, Dependency, Feature, FeatureQuery, NewDependency, NewFeature, NewProject,
        NewTask, Project, ProjectQuery, RoleTransition, Task, TaskQuery, UpdateFeature,
        UpdateProject, UpdateTask, WorkTreeCreated, WorkTreeSpec,
    },
    repository::{EdgeDirection, EntityStore, StoreStats},
    workflow::config::status_eq,
};

#[derive(Default)]
struct State {
    projects: HashMap<Uuid, Project>,
    features: HashMap<Uuid, Feature>,
    tasks: HashMap<Uuid, Task>,
    dependencies: HashMap<Uuid, Dependency>,
    transitions: Vec<RoleTransition>,
    section_counts: HashMap<Uuid, u64>,
    /// Insertion order per entity kind; wall-clock timestamps may collide.
    project_order: Vec<Uuid>,
    feature_order: Vec<Uuid>,
    task_order: Vec<Uuid>,
}

/// Mock EntityStore for testing.
///
/// Features:
/// - Thread-safe concurrent access
/// - Error injection for failure testing
/// - Call history tracking for verification
/// - Atomic work-tree creation with rollback semantics
pub struct MockEntityStore {
    state: Arc<Mutex<State>>,
    error_injection: Arc<Mutex<Option<OrchestratorError>>>,
    call_history: Arc<Mutex<Vec<String>>>,
}

impl Default for MockEntityStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEntityStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            error_injection: Arc::new(Mutex::new(None)),
            call_history: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Inject error for the next operation
    pub fn inject_error(&self, error: OrchestratorError) {
        *self.error_injection.lock() = Some(error);
    }

    pub fn clear_error(&self) {
        *self.error_injection.lock() = None;
    }

    /// Get history of called methods
    pub fn call_history(&self) -> Vec<String> {
        self.call_history.lock().clone()
    }

    pub fn clear_history(&self) {
        self.call_history.lock().clear();
    }

    /// Assert a method was called at least once
    pub fn assert_called(&self, method: &str) {
        let history = self.call_history.lock();
        assert!(
            history.iter().any(|call| call.contains(method)),
            "Method '{}' was not called. Call history: {:?}",
            method,
            *history
        );
    }

    /// Pretend an entity has content sections attached (cleanup policy).
    pub fn set_section_count(&self, entity_id: Uuid, count: u64) {
        self.state.lock().section_counts.insert(entity_id, count);
    }

    /// Direct read of every stored transition, for audit assertions.
    pub fn all_transitions(&self) -> Vec<RoleTransition> {
        self.state.lock().transitions.clone()
    }

    fn check_error_injection(&self) -> Result<()> {
        let mut error_opt = self.error_injection.lock();
        if let Some(error) = error_opt.take() {
            return Err(error);
        }
        Ok(())
    }

    fn record_call(&self, method: &str) {
        self.call_history.lock().push(format!("{method}()"));
    }

    fn order_index(order: &[Uuid], id: &Uuid) -> usize {
        order.iter().position(|o| o == id).unwrap_or(usize::MAX)
    }
}

#[async_trait]
impl EntityStore for MockEntityStore {
    async fn create_project(&self, project: NewProject, status: String) -> Result<Project> {
        self.record_call("create_project");
        self.check_error_injection()?;

        let now = Utc::now();
        let created = Project {
            id: Uuid::new_v4(),
            name: project.name,
            summary: project.summary,
            status,
            tags: project.tags,
            created_at: now,
            modified_at: now,
        };
        let mut state = self.state.lock();
        state.project_order.push(created.id);
        state.projects.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_project(&self, id: Uuid) -> Result<Option<Project>> {
        self.record_call("get_project");
        self.check_error_injection()?;
        Ok(self.state.lock().projects.get(&id).cloned())
    }

    async fn list_projects(&self, query: ProjectQuery) -> Result<Vec<Project>> {
        self.record_call("list_projects");
        self.check_error_injection()?;
        let state = self.state.lock();
        let mut projects: Vec<Project> = state
            .projects
            .values()
            .filter(|p| {
                query
                    .status
                    .as_ref()
                    .map(|s| status_eq(s, &p.status))
                    .unwrap_or(true)
                    && query
                        .tag
                        .as_ref()
                        .map(|t| p.tags.iter().any(|pt| pt.eq_ignore_ascii_case(t)))
                        .unwrap_or(true)
                    && query
                        .text
                        .as_ref()
                        .map(|t| p.name.contains(t.as_str()) || p.summary.contains(t.as_str()))
                        .unwrap_or(true)
            })
            .cloned()
            .collect();
        projects.sort_by_key(|p| Self::order_index(&state.project_order, &p.id));
        apply_window(&mut projects, query.offset, query.limit);
        Ok(projects)
    }

    async fn update_project(&self, id: Uuid, updates: UpdateProject) -> Result<Project> {
        self.record_call("update_project");
        self.check_error_injection()?;
        let mut state = self.state.lock();
        let project = state
            .projects
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::not_found(ContainerType::Project, id))?;
        if let Some(name) = updates.name {
            project.name = name;
        }
        if let Some(summary) = updates.summary {
            project.summary = summary;
        }
        if let Some(tags) = updates.tags {
            project.tags = tags;
        }
        project.modified_at = Utc::now();
        Ok(project.clone())
    }

    async fn delete_project(&self, id: Uuid) -> Result<()> {
        self.record_call("delete_project");
        self.check_error_injection()?;
        let mut state = self.state.lock();
        if state.projects.remove(&id).is_none() {
            return Err(OrchestratorError::not_found(ContainerType::Project, id));
        }
        let feature_ids: Vec<Uuid> = state
            .features
            .values()
            .filter(|f| f.project_id == Some(id))
            .map(|f| f.id)
            .collect();
        for feature_id in feature_ids {
            remove_feature_cascade(&mut state, feature_id);
        }
        state.transitions.retain(|t| t.entity_id != id);
        state.section_counts.remove(&id);
        Ok(())
    }

    async fn create_feature(&self, feature: NewFeature, status: String) -> Result<Feature> {
        self.record_call("create_feature");
        self.check_error_injection()?;

        let mut state = self.state.lock();
        if let Some(project_id) = feature.project_id {
            if !state.projects.contains_key(&project_id) {
                return Err(OrchestratorError::not_found(
                    ContainerType::Project,
                    project_id,
                ));
            }
        }
        let now = Utc::now();
        let created = Feature {
            id: Uuid::new_v4(),
            project_id: feature.project_id,
            name: feature.name,
            summary: feature.summary,
            description: feature.description,
            status,
            priority: feature.priority,
            tags: feature.tags,
            requires_verification: feature.requires_verification,
            created_at: now,
            modified_at: now,
        };
        state.feature_order.push(created.id);
        state.features.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_feature(&self, id: Uuid) -> Result<Option<Feature>> {
        self.record_call("get_feature");
        self.check_error_injection()?;
        Ok(self.state.lock().features.get(&id).cloned())
    }

    async fn list_features(&self, query: FeatureQuery) -> Result<Vec<Feature>> {
        self.record_call("list_features");
        self.check_error_injection()?;
        let state = self.state.lock();
        let mut features: Vec<Feature> = state
            .features
            .values()
            .filter(|f| {
                query
                    .project_id
                    .map(|p| f.project_id == Some(p))
                    .unwrap_or(true)
                    && query
                        .status
                        .as_ref()
                        .map(|s| status_eq(s, &f.status))
                        .unwrap_or(true)
                    && query.priority.map(|p| f.priority == p).unwrap_or(true)
                    && query
                        .tag
                        .as_ref()
                        .map(|t| f.tags.iter().any(|ft| ft.eq_ignore_ascii_case(t)))
                        .unwrap_or(true)
                    && query
                        .text
                        .as_ref()
                        .map(|t| {
                            f.name.contains(t.as_str()) || f.description.contains(t.as_str())
                        })
                        .unwrap_or(true)
            })
            .cloned()
            .collect();
        features.sort_by_key(|f| Self::order_index(&state.feature_order, &f.id));
        apply_window(&mut features, query.offset, query.limit);
        Ok(features)
    }

    async fn features_of_project(&self, project_id: Uuid) -> Result<Vec<Feature>> {
        self.record_call("features_of_project");
        self.check_error_injection()?;
        let state = self.state.lock();
        let mut features: Vec<Feature> = state
            .features
            .values()
            .filter(|f| f.project_id == Some(project_id))
            .cloned()
            .collect();
        features.sort_by_key(|f| Self::order_index(&state.feature_order, &f.id));
        Ok(features)
    }

    async fn update_feature(&self, id: Uuid, updates: UpdateFeature) -> Result<Feature> {
        self.record_call("update_feature");
        self.check_error_injection()?;
        let mut state = self.state.lock();
        let feature = state
            .features
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::not_found(ContainerType::Feature, id))?;
        if let Some(project_id) = updates.project_id {
            feature.project_id = project_id;
        }
        if let Some(name) = updates.name {
            feature.name = name;
        }
        if let Some(summary) = updates.summary {
            feature.summary = summary;
        }
        if let Some(description) = updates.description {
            feature.description = description;
        }
        if let Some(priority) = updates.priority {
            feature.priority = priority;
        }
        if let Some(tags) = updates.tags {
            feature.tags = tags;
        }
        if let Some(requires_verification) = updates.requires_verification {
            feature.requires_verification = requires_verification;
        }
        feature.modified_at = Utc::now();
        Ok(feature.clone())
    }

    async fn delete_feature(&self, id: Uuid) -> Result<()> {
        self.record_call("delete_feature");
        self.check_error_injection()?;
        let mut state = self.state.lock();
        if !state.features.contains_key(&id) {
            return Err(OrchestratorError::not_found(ContainerType::Feature, id));
        }
        remove_feature_cascade(&mut state, id);
        Ok(())
    }

    async fn create_task(&self, task: NewTask, status: String) -> Result<Task> {
        self.record_call("create_task");
        self.check_error_injection()?;

        let mut state = self.state.lock();
        if let Some(feature_id) = task.feature_id {
            if !state.features.contains_key(&feature_id) {
                return Err(OrchestratorError::not_found(
                    ContainerType::Feature,
                    feature_id,
                ));
            }
        }
        let now = Utc::now();
        let created = Task {
            id: Uuid::new_v4(),
            feature_id: task.feature_id,
            title: task.title,
            summary: task.summary,
            description: task.description,
            status,
            priority: task.priority,
            complexity: task.complexity,
            tags: task.tags,
            created_at: now,
            modified_at: now,
        };
        state.task_order.push(created.id);
        state.tasks.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_task(&self, id: Uuid) -> Result<Option<Task>> {
        self.record_call("get_task");
        self.check_error_injection()?;
        Ok(self.state.lock().tasks.get(&id).cloned())
    }

    async fn list_tasks(&self, query: TaskQuery) -> Result<Vec<Task>> {
        self.record_call("list_tasks");
        self.check_error_injection()?;
        let state = self.state.lock();
        let project_features: Option<Vec<Uuid>> = query.project_id.map(|project_id| {
            state
                .features
                .values()
                .filter(|f| f.project_id == Some(project_id))
                .map(|f| f.id)
                .collect()
        });
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| {
                query
                    .feature_id
                    .map(|f| t.feature_id == Some(f))
                    .unwrap_or(true)
                    && project_features
                        .as_ref()
                        .map(|fs| t.feature_id.map(|f| fs.contains(&f)).unwrap_or(false))
                        .unwrap_or(true)
                    && query
                        .status
                        .as_ref()
                        .map(|s| status_eq(s, &t.status))
                        .unwrap_or(true)
                    && query.priority.map(|p| t.priority == p).unwrap_or(true)
                    && query
                        .tag
                        .as_ref()
                        .map(|tag| t.tags.iter().any(|tt| tt.eq_ignore_ascii_case(tag)))
                        .unwrap_or(true)
                    && query
                        .text
                        .as_ref()
                        .map(|txt| {
                            t.title.contains(txt.as_str()) || t.description.contains(txt.as_str())
                        })
                        .unwrap_or(true)
            })
            .cloned()
            .collect();
        tasks.sort_by_key(|t| Self::order_index(&state.task_order, &t.id));
        apply_window(&mut tasks, query.offset, query.limit);
        Ok(tasks)
    }

    async fn tasks_of_feature(&self, feature_id: Uuid) -> Result<Vec<Task>> {
        self.record_call("tasks_of_feature");
        self.check_error_injection()?;
        let state = self.state.lock();
        let mut tasks: Vec<Task> = state
            .tasks
            .values()
            .filter(|t| t.feature_id == Some(feature_id))
            .cloned()
            .collect();
        tasks.sort_by_key(|t| Self::order_index(&state.task_order, &t.id));
        Ok(tasks)
    }

    async fn update_task(&self, id: Uuid, updates: UpdateTask) -> Result<Task> {
        self.record_call("update_task");
        self.check_error_injection()?;
        let mut state = self.state.lock();
        let task = state
            .tasks
            .get_mut(&id)
            .ok_or_else(|| OrchestratorError::not_found(ContainerType::Task, id))?;
        if let Some(feature_id) = updates.feature_id {
            task.feature_id = feature_id;
        }
        if let Some(title) = updates.title {
            task.title = title;
        }
        if let Some(summary) = updates.summary {
            task.summary = summary;
        }
        if let Some(description) = updates.description {
            task.description = description;
        }
        if let Some(priority) = updates.priority {
            task.priority = priority;
        }
        if let Some(complexity) = updates.complexity {
            task.complexity = complexity;
        }
        if let Some(tags) = updates.tags {
            task.tags = tags;
        }
        task.modified_at = Utc::now();
        Ok(task.clone())
    }

    async fn delete_task(&self, id: Uuid) -> Result<()> {
        self.record_call("delete_task");
        self.check_error_injection()?;
        let mut state = self.state.lock();
        if state.tasks.remove(&id).is_none() {
            return Err(OrchestratorError::not_found(ContainerType::Task, id));
        }
        state
            .dependencies
            .retain(|_, d| d.from_task != id && d.to_task != id);
        state.transitions.retain(|t| t.entity_id != id);
        state.section_counts.remove(&id);
        state.task_order.retain(|t| *t != id);
        Ok(())
    }

    async fn set_status(
        &self,
        entity_type: ContainerType,
        id: Uuid,
        status: String,
    ) -> Result<()> {
        self.record_call("set_status");
        self.check_error_injection()?;
        let mut state = self.state.lock();
        let now = Utc::now();
        let found = match entity_type {
            ContainerType::Project => state.projects.get_mut(&id).map(|p| {
                p.status = status.clone();
                p.modified_at = now;
            }),
            ContainerType::Feature => state.features.get_mut(&id).map(|f| {
                f.status = status.clone();
                f.modified_at = now;
            }),
            ContainerType::Task => state.tasks.get_mut(&id).map(|t| {
                t.status = status.clone();
                t.modified_at = now;
            }),
        };
        found.ok_or_else(|| OrchestratorError::not_found(entity_type, id))
    }

    async fn create_dependency(&self, dep: NewDependency) -> Result<Dependency> {
        self.record_call("create_dependency");
        self.check_error_injection()?;
        let mut state = self.state.lock();
        if state.dependencies.values().any(|d| {
            d.from_task == dep.from_task && d.to_task == dep.to_task && d.dep_type == dep.dep_type
        }) {
            return Err(OrchestratorError::DuplicateDependency {
                from: dep.from_task,
                to: dep.to_task,
            });
        }
        let created = Dependency {
            id: Uuid::new_v4(),
            from_task: dep.from_task,
            to_task: dep.to_task,
            dep_type: dep.dep_type,
            unblock_at: dep.unblock_at,
            created_at: Utc::now(),
        };
        state.dependencies.insert(created.id, created.clone());
        Ok(created)
    }

    async fn get_dependency(&self, id: Uuid) -> Result<Option<Dependency>> {
        self.record_call("get_dependency");
        self.check_error_injection()?;
        Ok(self.state.lock().dependencies.get(&id).cloned())
    }

    async fn delete_dependency(&self, id: Uuid) -> Result<()> {
        self.record_call("delete_dependency");
        self.check_error_injection()?;
        let mut state = self.state.lock();
        state
            .dependencies
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| {
                OrchestratorError::NotFound(ContainerType::Task, format!("dependency {id}"))
            })
    }

    async fn dependencies_for(
        &self,
        task_id: Uuid,
        direction: EdgeDirection,
    ) -> Result<Vec<Dependency>> {
        self.record_call("dependencies_for");
        self.check_error_injection()?;
        let state = self.state.lock();
        let mut edges: Vec<Dependency> = state
            .dependencies
            .values()
            .filter(|d| match direction {
                EdgeDirection::Incoming => d.to_task == task_id,
                EdgeDirection::Outgoing => d.from_task == task_id,
                EdgeDirection::Both => d.from_task == task_id || d.to_task == task_id,
            })
            .cloned()
            .collect();
        edges.sort_by_key(|d| d.created_at);
        Ok(edges)
    }

    async fn find_blocking_edges(
        &self,
        task_id: Uuid,
        direction: EdgeDirection,
    ) -> Result<Vec<Dependency>> {
        self.record_call("find_blocking_edges");
        self.check_error_injection()?;
        let state = self.state.lock();
        let mut edges: Vec<Dependency> = state
            .dependencies
            .values()
            .filter(|d| d.dep_type.is_blocking())
            .filter(|d| {
                let Some((blocker, blocked)) = d.blocking_pair() else {
                    return false;
                };
                match direction {
                    EdgeDirection::Incoming => blocked == task_id,
                    EdgeDirection::Outgoing => blocker == task_id,
                    EdgeDirection::Both => blocker == task_id || blocked == task_id,
                }
            })
            .cloned()
            .collect();
        edges.sort_by_key(|d| d.created_at);
        Ok(edges)
    }

    async fn append_transition(&self, record: RoleTransition) -> Result<()> {
        self.record_call("append_transition");
        self.check_error_injection()?;
        self.state.lock().transitions.push(record);
        Ok(())
    }

    async fn transitions_for(&self, entity_id: Uuid) -> Result<Vec<RoleTransition>> {
        self.record_call("transitions_for");
        self.check_error_injection()?;
        Ok(self
            .state
            .lock()
            .transitions
            .iter()
            .filter(|t| t.entity_id == entity_id)
            .cloned()
            .collect())
    }

    async fn count_transitions(&self, entity_id: Uuid) -> Result<u64> {
        self.record_call("count_transitions");
        self.check_error_injection()?;
        Ok(self
            .state
            .lock()
            .transitions
            .iter()
            .filter(|t| t.entity_id == entity_id)
            .count() as u64)
    }

    async fn count_sections(&self, entity_id: Uuid) -> Result<u64> {
        self.record_call("count_sections");
        self.check_error_injection()?;
        Ok(*self
            .state
            .lock()
            .section_counts
            .get(&entity_id)
            .unwrap_or(&0))
    }

    async fn create_work_tree(
        &self,
        spec: WorkTreeSpec,
        project_status: String,
        feature_statuses: Vec<String>,
        task_statuses: Vec<String>,
    ) -> Result<WorkTreeCreated> {
        self.record_call("create_work_tree");
        self.check_error_injection()?;

        // Stage everything first; commit only when the whole tree is valid.
        let mut staged_projects: Vec<Project> = Vec::new();
        let mut staged_features: Vec<Feature> = Vec::new();
        let mut staged_tasks: Vec<Task> = Vec::new();
        let mut staged_deps: Vec<Dependency> = Vec::new();
        let mut created = WorkTreeCreated::default();
        let now = Utc::now();

        let project_id = spec.project.as_ref().map(|p| {
            let project = Project {
                id: Uuid::new_v4(),
                name: p.name.clone(),
                summary: p.summary.clone(),
                status: project_status.clone(),
                tags: p.tags.clone(),
                created_at: now,
                modified_at: now,
            };
            let id = project.id;
            staged_projects.push(project);
            created.project_id = Some(id);
            id
        });

        let mut task_status_iter = task_statuses.into_iter();
        for (entry, feature_status) in spec.features.iter().zip(feature_statuses) {
            let feature = Feature {
                id: Uuid::new_v4(),
                project_id: entry.feature.project_id.or(project_id),
                name: entry.feature.name.clone(),
                summary: entry.feature.summary.clone(),
                description: entry.feature.description.clone(),
                status: feature_status,
                priority: entry.feature.priority,
                tags: entry.feature.tags.clone(),
                requires_verification: entry.feature.requires_verification,
                created_at: now,
                modified_at: now,
            };
            let feature_id = feature.id;
            created.feature_ids.push(feature_id);
            staged_features.push(feature);

            let mut local_ids = Vec::with_capacity(entry.tasks.len());
            for task in &entry.tasks {
                let status = task_status_iter
                    .next()
                    .ok_or_else(|| OrchestratorError::Internal("task status underrun".into()))?;
                let task = Task {
                    id: Uuid::new_v4(),
                    feature_id: Some(feature_id),
                    title: task.title.clone(),
                    summary: task.summary.clone(),
                    description: task.description.clone(),
                    status,
                    priority: task.priority,
                    complexity: task.complexity,
                    tags: task.tags.clone(),
                    created_at: now,
                    modified_at: now,
                };
                local_ids.push(task.id);
                created.task_ids.push(task.id);
                staged_tasks.push(task);
            }

            for edge in &entry.dependencies {
                let from = *local_ids.get(edge.from_index).ok_or_else(|| {
                    OrchestratorError::validation("dependency from_index out of range")
                })?;
                let to = *local_ids.get(edge.to_index).ok_or_else(|| {
                    OrchestratorError::validation("dependency to_index out of range")
                })?;
                if staged_deps.iter().any(|d| {
                    d.from_task == from && d.to_task == to && d.dep_type == edge.dep_type
                }) {
                    return Err(OrchestratorError::DuplicateDependency { from, to });
                }
                let dep = Dependency {
                    id: Uuid::new_v4(),
                    from_task: from,
                    to_task: to,
                    dep_type: edge.dep_type,
                    unblock_at: edge.unblock_at,
                    created_at: now,
                };
                created.dependency_ids.push(dep.id);
                staged_deps.push(dep);
            }
        }

        let mut state = self.state.lock();
        for project in staged_projects {
            state.project_order.push(project.id);
            state.projects.insert(project.id, project);
        }
        for feature in staged_features {
            state.feature_order.push(feature.id);
            state.features.insert(feature.id, feature);
        }
        for task in staged_tasks {
            state.task_order.push(task.id);
            state.tasks.insert(task.id, task);
        }
        for dep in staged_deps {
            state.dependencies.insert(dep.id, dep);
        }
        Ok(created)
    }

    async fn health_check(&self) -> Result<()> {
        self.record_call("health_check");
        self.check_error_injection()?;
        Ok(())
    }

    async fn get_stats(&self) -> Result<StoreStats> {
        self.record_call("get_stats");
        self.check_error_injection()?;
        let state = self.state.lock();
        let mut stats = StoreStats {
            total_projects: state.projects.len() as u64,
            total_features: state.features.len() as u64,
            total_tasks: state.tasks.len() as u64,
            total_dependencies: state.dependencies.len() as u64,
            ..Default::default()
        };
        for task in state.tasks.values() {
            *stats.tasks_by_status.entry(task.status.clone()).or_insert(0) += 1;
        }
        Ok(stats)
    }
}

fn remove_feature_cascade(state: &mut State, feature_id: Uuid) {
    state.features.remove(&feature_id);
    state.feature_order.retain(|f| *f != feature_id);
    let task_ids: Vec<Uuid> = state
        .tasks
        .values()
        .filter(|t| t.feature_id == Some(feature_id))
        .map(|t| t.id)
        .collect();
    for task_id in task_ids {
        state.tasks.remove(&task_id);
        state.task_order.retain(|t| *t != task_id);
        state
            .dependencies
            .retain(|_, d| d.from_task != task_id && d.to_task != task_id);
        state.transitions.retain(|t| t.entity_id != task_id);
        state.section_counts.remove(&task_id);
    }
    state.transitions.retain(|t| t.entity_id != feature_id);
    state.section_counts.remove(&feature_id);
}

fn apply_window<T>(items: &mut Vec<T>, offset: Option<u32>, limit: Option<u32>) {
    if let Some(offset) = offset {
        let offset = offset as usize;
        if offset >= items.len() {
            items.clear();
        } else {
            items.drain(..offset);
        }
    }
    if let Some(limit) = limit {
        items.truncate(limit as usize);
    }
}
