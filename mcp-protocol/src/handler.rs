//! MCP Tool Handler
//!
//! Implements the ProtocolHandler trait over the core services. Every
//! operation answers with the response envelope; domain rejections ride in
//! the envelope's error block, Rust errors never escape to the transport.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use uuid::Uuid;

use orchestrator_core::{
    error::{OrchestratorError, Result},
    models::{
        ContainerType, FeatureQuery, NewDependency, NewFeature, NewProject, NewTask, ProjectQuery,
        RoleTransition, TaskQuery, UpdateFeature, UpdateProject, UpdateTask, WorkScope,
        WorkTreeSpec,
    },
    protocol::{
        DependencyOp, FlowPathParams, GetBlockedParams, GetNextItemParams, HealthStatus,
        ManageContainerParams, ManageDependencyParams, ManageOp, ProgressParams, ProtocolHandler,
        QueryContainerParams, QueryDependenciesParams, QueryOp, ResponseEnvelope,
    },
    repository::EntityStore,
    services::{
        dependency::DependencyService, recommend::NextTaskService, work_tree::WorkTreeService,
    },
    validation::RequestValidator,
    workflow::{
        cascade::CascadeEngine,
        flows::FlowResolver,
        loader::WorkflowConfigLoader,
        progression::ProgressionService,
        validation::{TransitionCheck, TransitionRequest, TransitionTrigger, TransitionValidator},
    },
};

/// Tool handler bridging the MCP surface with the orchestration engine.
pub struct McpToolHandler<S> {
    store: Arc<S>,
    loader: Arc<WorkflowConfigLoader>,
    progression: ProgressionService<S>,
    cascade: CascadeEngine<S>,
    deps: DependencyService<S>,
    next: NextTaskService<S>,
    work_tree: WorkTreeService<S>,
    validator: TransitionValidator<S>,
}

impl<S: EntityStore> McpToolHandler<S> {
    pub fn new(store: Arc<S>, loader: Arc<WorkflowConfigLoader>) -> Self {
        Self {
            progression: ProgressionService::new(store.clone(), loader.clone()),
            cascade: CascadeEngine::new(store.clone(), loader.clone()),
            deps: DependencyService::new(store.clone(), loader.clone()),
            next: NextTaskService::new(store.clone(), loader.clone()),
            work_tree: WorkTreeService::new(store.clone(), loader.clone()),
            validator: TransitionValidator::new(store.clone(), loader.clone()),
            store,
            loader,
        }
    }

    /// Get a clone of the store Arc for transport wiring.
    pub fn store(&self) -> Arc<S> {
        self.store.clone()
    }

    pub fn loader(&self) -> Arc<WorkflowConfigLoader> {
        self.loader.clone()
    }

    fn require<T>(value: Option<T>, field: &str) -> Result<T> {
        value.ok_or_else(|| {
            OrchestratorError::validation(format!("missing required field '{field}'"))
        })
    }

    fn payload(params: &ManageContainerParams) -> Result<serde_json::Value> {
        Self::require(params.data.clone(), "data")
    }

    fn decode<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> Result<T> {
        serde_json::from_value(value)
            .map_err(|e| OrchestratorError::validation(format!("invalid payload: {e}")))
    }

    async fn create_container(&self, params: ManageContainerParams) -> Result<ResponseEnvelope> {
        let config = self.loader.load();
        let resolver = FlowResolver::new(&config);
        let container_type = params.container_type;

        // Explicit creation statuses must be known to the configuration.
        let resolve_status = |status: Option<String>, tags: &[String]| -> Result<String> {
            match status {
                Some(status) => {
                    if !resolver.knows_status(container_type, &status) {
                        return Err(OrchestratorError::validation(format!(
                            "unknown {container_type} status '{status}'"
                        )));
                    }
                    Ok(orchestrator_core::workflow::config::normalize_status(&status))
                }
                None => Ok(resolver.initial_status(container_type, tags)),
            }
        };

        match container_type {
            ContainerType::Project => {
                let new: NewProject = Self::decode(Self::payload(&params)?)?;
                RequestValidator::validate_new_project(&new)?;
                let status = resolve_status(new.status.clone(), &new.tags)?;
                let project = self.store.create_project(new, status).await?;
                Ok(ResponseEnvelope::ok_with("project created", &project))
            }
            ContainerType::Feature => {
                let new: NewFeature = Self::decode(Self::payload(&params)?)?;
                RequestValidator::validate_new_feature(&new)?;
                let status = resolve_status(new.status.clone(), &new.tags)?;
                let feature = self.store.create_feature(new, status).await?;
                Ok(ResponseEnvelope::ok_with("feature created", &feature))
            }
            ContainerType::Task => {
                let new: NewTask = Self::decode(Self::payload(&params)?)?;
                RequestValidator::validate_new_task(&new)?;
                let status = resolve_status(new.status.clone(), &new.tags)?;
                let task = self.store.create_task(new, status).await?;
                Ok(ResponseEnvelope::ok_with("task created", &task))
            }
        }
    }

    async fn get_container(
        &self,
        container_type: ContainerType,
        id: Uuid,
    ) -> Result<ResponseEnvelope> {
        match container_type {
            ContainerType::Project => match self.store.get_project(id).await? {
                Some(project) => Ok(ResponseEnvelope::ok_with("project", &project)),
                None => Err(OrchestratorError::not_found(container_type, id)),
            },
            ContainerType::Feature => match self.store.get_feature(id).await? {
                Some(feature) => Ok(ResponseEnvelope::ok_with("feature", &feature)),
                None => Err(OrchestratorError::not_found(container_type, id)),
            },
            ContainerType::Task => match self.store.get_task(id).await? {
                Some(task) => Ok(ResponseEnvelope::ok_with("task", &task)),
                None => Err(OrchestratorError::not_found(container_type, id)),
            },
        }
    }

    async fn update_container(&self, params: ManageContainerParams) -> Result<ResponseEnvelope> {
        let id = Self::require(params.id, "id")?;
        match params.container_type {
            ContainerType::Project => {
                let updates: UpdateProject = Self::decode(Self::payload(&params)?)?;
                let project = self.store.update_project(id, updates).await?;
                Ok(ResponseEnvelope::ok_with("project updated", &project))
            }
            ContainerType::Feature => {
                let updates: UpdateFeature = Self::decode(Self::payload(&params)?)?;
                let feature = self.store.update_feature(id, updates).await?;
                Ok(ResponseEnvelope::ok_with("feature updated", &feature))
            }
            ContainerType::Task => {
                let updates: UpdateTask = Self::decode(Self::payload(&params)?)?;
                let task = self.store.update_task(id, updates).await?;
                Ok(ResponseEnvelope::ok_with("task updated", &task))
            }
        }
    }

    /// The write path: validate, persist, audit, cascade.
    async fn set_container_status(
        &self,
        params: ManageContainerParams,
    ) -> Result<ResponseEnvelope> {
        let id = Self::require(params.id, "id")?;
        let new_status = Self::require(params.status.clone(), "status")?;
        let container_type = params.container_type;

        let (current_status, tags) = match container_type {
            ContainerType::Project => {
                let p = self
                    .store
                    .get_project(id)
                    .await?
                    .ok_or_else(|| OrchestratorError::not_found(container_type, id))?;
                (p.status, p.tags)
            }
            ContainerType::Feature => {
                let f = self
                    .store
                    .get_feature(id)
                    .await?
                    .ok_or_else(|| OrchestratorError::not_found(container_type, id))?;
                (f.status, f.tags)
            }
            ContainerType::Task => {
                let t = self
                    .store
                    .get_task(id)
                    .await?
                    .ok_or_else(|| OrchestratorError::not_found(container_type, id))?;
                (t.status, t.tags)
            }
        };

        let check = self
            .validator
            .check(TransitionRequest {
                container_type,
                entity_id: Some(id),
                tags: &tags,
                current_status: &current_status,
                new_status: &new_status,
                trigger: TransitionTrigger::Manual,
                summary: params.summary.as_deref(),
            })
            .await?;

        let advisory = match check {
            TransitionCheck::Valid => None,
            TransitionCheck::ValidWithAdvisory(note) => Some(note),
            TransitionCheck::Invalid {
                reason,
                suggestions,
            } => {
                return Err(OrchestratorError::prerequisite_with_suggestions(
                    reason,
                    suggestions,
                ))
            }
        };

        // A completion summary travels with the status change.
        if container_type == ContainerType::Task {
            if let Some(summary) = &params.summary {
                self.store
                    .update_task(
                        id,
                        UpdateTask {
                            summary: Some(summary.clone()),
                            ..Default::default()
                        },
                    )
                    .await?;
            }
        }

        let config = self.loader.load();
        let resolver = FlowResolver::new(&config);
        let from_role = resolver.role(container_type, &tags, &current_status);
        let to_role = resolver.role(container_type, &tags, &new_status);

        let normalized =
            orchestrator_core::workflow::config::normalize_status(&new_status);
        self.store
            .set_status(container_type, id, normalized.clone())
            .await?;

        if from_role != to_role {
            self.store
                .append_transition(RoleTransition {
                    id: Uuid::new_v4(),
                    entity_id: id,
                    entity_type: container_type,
                    from_role,
                    to_role,
                    from_status: current_status.clone(),
                    to_status: normalized.clone(),
                    trigger: TransitionTrigger::Manual.as_str().to_string(),
                    summary: params.summary.clone(),
                    created_at: chrono::Utc::now(),
                })
                .await?;
        }

        let outcome = self.cascade.apply(container_type, id).await?;

        tracing::info!(
            entity_type = %container_type,
            entity = %id,
            from = %current_status,
            to = %normalized,
            cascades = outcome.records.len(),
            "status updated"
        );

        Ok(ResponseEnvelope::ok(
            format!("{container_type} moved to '{normalized}'"),
            Some(json!({
                "id": id,
                "previous_status": current_status,
                "status": normalized,
                "advisory": advisory,
                "cascades": outcome.records,
                "unblocked_tasks": outcome.unblocked_tasks,
                "cleanup": outcome.cleanup,
            })),
        ))
    }

    async fn delete_container(
        &self,
        container_type: ContainerType,
        id: Uuid,
    ) -> Result<ResponseEnvelope> {
        match container_type {
            ContainerType::Project => self.store.delete_project(id).await?,
            ContainerType::Feature => self.store.delete_feature(id).await?,
            ContainerType::Task => self.store.delete_task(id).await?,
        }
        Ok(ResponseEnvelope::ok(
            format!("{container_type} deleted"),
            Some(json!({ "id": id })),
        ))
    }

    async fn search_containers(&self, params: &QueryContainerParams) -> Result<ResponseEnvelope> {
        let f = &params.filters;
        match params.container_type {
            ContainerType::Project => {
                let projects = self
                    .store
                    .list_projects(ProjectQuery {
                        status: f.status.clone(),
                        tag: f.tag.clone(),
                        text: f.text.clone(),
                        limit: f.limit,
                        offset: f.offset,
                    })
                    .await?;
                Ok(ResponseEnvelope::ok_with(
                    format!("{} project(s)", projects.len()),
                    &projects,
                ))
            }
            ContainerType::Feature => {
                let features = self
                    .store
                    .list_features(FeatureQuery {
                        project_id: f.project_id,
                        status: f.status.clone(),
                        priority: f.priority,
                        tag: f.tag.clone(),
                        text: f.text.clone(),
                        limit: f.limit,
                        offset: f.offset,
                    })
                    .await?;
                Ok(ResponseEnvelope::ok_with(
                    format!("{} feature(s)", features.len()),
                    &features,
                ))
            }
            ContainerType::Task => {
                let tasks = self
                    .store
                    .list_tasks(TaskQuery {
                        feature_id: f.feature_id,
                        project_id: f.project_id,
                        status: f.status.clone(),
                        priority: f.priority,
                        tag: f.tag.clone(),
                        text: f.text.clone(),
                        limit: f.limit,
                        offset: f.offset,
                    })
                    .await?;
                Ok(ResponseEnvelope::ok_with(
                    format!("{} task(s)", tasks.len()),
                    &tasks,
                ))
            }
        }
    }

    /// Metadata plus child status counts; the cheap-read mode.
    async fn overview(&self, container_type: ContainerType, id: Uuid) -> Result<ResponseEnvelope> {
        match container_type {
            ContainerType::Project => {
                let project = self
                    .store
                    .get_project(id)
                    .await?
                    .ok_or_else(|| OrchestratorError::not_found(container_type, id))?;
                let features = self.store.features_of_project(id).await?;
                let tasks = self
                    .store
                    .list_tasks(TaskQuery {
                        project_id: Some(id),
                        ..Default::default()
                    })
                    .await?;
                Ok(ResponseEnvelope::ok(
                    "project overview",
                    Some(json!({
                        "project": project,
                        "feature_count": features.len(),
                        "task_count": tasks.len(),
                        "tasks_by_status": count_by_status(tasks.iter().map(|t| t.status.as_str())),
                        "features_by_status": count_by_status(features.iter().map(|f| f.status.as_str())),
                    })),
                ))
            }
            ContainerType::Feature => {
                let feature = self
                    .store
                    .get_feature(id)
                    .await?
                    .ok_or_else(|| OrchestratorError::not_found(container_type, id))?;
                let tasks = self.store.tasks_of_feature(id).await?;
                Ok(ResponseEnvelope::ok(
                    "feature overview",
                    Some(json!({
                        "feature": feature,
                        "task_count": tasks.len(),
                        "tasks_by_status": count_by_status(tasks.iter().map(|t| t.status.as_str())),
                    })),
                ))
            }
            ContainerType::Task => {
                let task = self
                    .store
                    .get_task(id)
                    .await?
                    .ok_or_else(|| OrchestratorError::not_found(container_type, id))?;
                let edges = self
                    .store
                    .dependencies_for(id, orchestrator_core::repository::EdgeDirection::Both)
                    .await?;
                let sections = self.store.count_sections(id).await?;
                Ok(ResponseEnvelope::ok(
                    "task overview",
                    Some(json!({
                        "task": task,
                        "dependency_count": edges.len(),
                        "section_count": sections,
                    })),
                ))
            }
        }
    }

    async fn history(&self, id: Uuid) -> Result<ResponseEnvelope> {
        let transitions = self.store.transitions_for(id).await?;
        Ok(ResponseEnvelope::ok_with(
            format!("{} transition(s)", transitions.len()),
            &transitions,
        ))
    }
}

fn count_by_status<'a>(statuses: impl Iterator<Item = &'a str>) -> serde_json::Value {
    let mut counts: std::collections::BTreeMap<&str, u64> = Default::default();
    for status in statuses {
        *counts.entry(status).or_insert(0) += 1;
    }
    json!(counts)
}

#[async_trait]
impl<S: EntityStore + 'static> ProtocolHandler for McpToolHandler<S> {
    async fn manage_container(&self, params: ManageContainerParams) -> ResponseEnvelope {
        let result = match params.op {
            ManageOp::Create => self.create_container(params).await,
            ManageOp::Get => match Self::require(params.id, "id") {
                Ok(id) => self.get_container(params.container_type, id).await,
                Err(e) => Err(e),
            },
            ManageOp::Update => self.update_container(params).await,
            ManageOp::SetStatus => self.set_container_status(params).await,
            ManageOp::Delete => match Self::require(params.id, "id") {
                Ok(id) => self.delete_container(params.container_type, id).await,
                Err(e) => Err(e),
            },
        };
        result.unwrap_or_else(|e| ResponseEnvelope::failure(&e))
    }

    async fn query_container(&self, params: QueryContainerParams) -> ResponseEnvelope {
        let result = match params.op {
            QueryOp::Get => match Self::require(params.id, "id") {
                Ok(id) => self.get_container(params.container_type, id).await,
                Err(e) => Err(e),
            },
            QueryOp::Search => self.search_containers(&params).await,
            QueryOp::Overview => match Self::require(params.id, "id") {
                Ok(id) => self.overview(params.container_type, id).await,
                Err(e) => Err(e),
            },
            QueryOp::History => match Self::require(params.id, "id") {
                Ok(id) => self.history(id).await,
                Err(e) => Err(e),
            },
        };
        result.unwrap_or_else(|e| ResponseEnvelope::failure(&e))
    }

    async fn manage_dependency(&self, params: ManageDependencyParams) -> ResponseEnvelope {
        let result: Result<ResponseEnvelope> = async {
            match params.op {
                DependencyOp::Create => {
                    let from = Self::require(params.from_task, "from_task")?;
                    let to = Self::require(params.to_task, "to_task")?;
                    let dep = self
                        .deps
                        .create(NewDependency {
                            from_task: from,
                            to_task: to,
                            dep_type: params.dep_type,
                            unblock_at: params.unblock_at,
                        })
                        .await?;
                    Ok(ResponseEnvelope::ok_with("dependency created", &dep))
                }
                DependencyOp::Delete => {
                    let id = Self::require(params.id, "id")?;
                    self.deps.delete(id).await?;
                    Ok(ResponseEnvelope::ok(
                        "dependency deleted",
                        Some(json!({ "id": id })),
                    ))
                }
                DependencyOp::List => {
                    let task_id = Self::require(params.task_id, "task_id")?;
                    let records = self
                        .deps
                        .list(task_id, params.direction, params.include_task_info)
                        .await?;
                    Ok(ResponseEnvelope::ok_with(
                        format!("{} dependenc(ies)", records.len()),
                        &records,
                    ))
                }
            }
        }
        .await;
        result.unwrap_or_else(|e| ResponseEnvelope::failure(&e))
    }

    async fn query_dependencies(&self, params: QueryDependenciesParams) -> ResponseEnvelope {
        let result = self
            .deps
            .list(params.task_id, params.direction, params.include_task_info)
            .await
            .map(|records| {
                ResponseEnvelope::ok_with(format!("{} dependenc(ies)", records.len()), &records)
            });
        result.unwrap_or_else(|e| ResponseEnvelope::failure(&e))
    }

    async fn get_next_item(&self, params: GetNextItemParams) -> ResponseEnvelope {
        let scope = WorkScope {
            project_id: params.project_id,
            feature_id: params.feature_id,
        };
        let result = self
            .next
            .next_tasks(scope, params.limit, params.detail)
            .await
            .map(|next| {
                ResponseEnvelope::ok_with(
                    format!(
                        "{} recommendation(s) from {} candidate(s)",
                        next.items.len(),
                        next.total_candidates
                    ),
                    &next,
                )
            });
        result.unwrap_or_else(|e| ResponseEnvelope::failure(&e))
    }

    async fn get_blocked(&self, params: GetBlockedParams) -> ResponseEnvelope {
        let scope = WorkScope {
            project_id: params.project_id,
            feature_id: params.feature_id,
        };
        let result = self.deps.blocked_tasks(scope).await.map(|mut blocked| {
            if !params.detail {
                // Compact mode: only the unsatisfied edges per task.
                for task in &mut blocked {
                    task.blockers.retain(|b| !b.satisfied);
                }
            }
            ResponseEnvelope::ok_with(format!("{} blocked task(s)", blocked.len()), &blocked)
        });
        result.unwrap_or_else(|e| ResponseEnvelope::failure(&e))
    }

    async fn progress(&self, params: ProgressParams) -> ResponseEnvelope {
        let result: Result<ResponseEnvelope> = async {
            match &params.target_status {
                Some(target) => {
                    let readiness = self
                        .progression
                        .readiness(
                            params.container_type,
                            &params.tags,
                            &params.current_status,
                            target,
                            params.entity_id,
                        )
                        .await?;
                    let (allowed, advisory, blockers, suggestions) = match &readiness.check {
                        TransitionCheck::Valid => (true, None, vec![], vec![]),
                        TransitionCheck::ValidWithAdvisory(note) => {
                            (true, Some(note.clone()), vec![], vec![])
                        }
                        TransitionCheck::Invalid {
                            reason,
                            suggestions,
                        } => (false, None, vec![reason.clone()], suggestions.clone()),
                    };
                    Ok(ResponseEnvelope::ok(
                        "readiness",
                        Some(json!({
                            "target": readiness.target,
                            "allowed": allowed,
                            "advisory": advisory,
                            "blockers": blockers,
                            "suggestions": suggestions,
                            "flow_name": readiness.flow_name,
                            "current_position": readiness.current_position,
                            "target_position": readiness.target_position,
                        })),
                    ))
                }
                None => {
                    let progression = self
                        .progression
                        .next_status(
                            params.container_type,
                            &params.tags,
                            &params.current_status,
                            params.entity_id,
                        )
                        .await?;
                    Ok(ResponseEnvelope::ok_with("progression", &progression))
                }
            }
        }
        .await;
        result.unwrap_or_else(|e| ResponseEnvelope::failure(&e))
    }

    async fn flow_path(&self, params: FlowPathParams) -> ResponseEnvelope {
        let path = self.progression.flow_path(
            params.container_type,
            &params.tags,
            params.current_status.as_deref(),
        );
        ResponseEnvelope::ok_with("flow path", &path)
    }

    async fn create_work_tree(&self, params: WorkTreeSpec) -> ResponseEnvelope {
        let result = self
            .work_tree
            .create(params)
            .await
            .map(|created| ResponseEnvelope::ok_with("work tree created", &created));
        result.unwrap_or_else(|e| ResponseEnvelope::failure(&e))
    }

    async fn health_check(&self) -> ResponseEnvelope {
        match self.store.health_check().await {
            Ok(()) => {
                let health = HealthStatus {
                    status: "healthy".to_string(),
                    store: true,
                    protocol: true,
                    timestamp: chrono::Utc::now(),
                    version: env!("CARGO_PKG_VERSION").to_string(),
                };
                ResponseEnvelope::ok_with("healthy", &health)
            }
            Err(e) => ResponseEnvelope::failure(&e),
        }
    }
}
