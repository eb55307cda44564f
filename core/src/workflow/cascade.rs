//! Cascade engine: after a successful status write, detect follow-on
//! transitions across the hierarchy and apply them, bounded-depth.
//!
//! Every cascade step re-validates through the prerequisite gate, so a
//! cascade can never move an entity somewhere a user could not. Steps that
//! fail validation are recorded, not raised; cascade is best-effort beyond
//! the originating write.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::Result,
    models::{ContainerType, RoleTransition, StatusRole, Task},
    repository::EntityStore,
    services::dependency::{DependencyService, TaskBrief},
    workflow::{
        config::WorkflowConfig,
        flows::{ActiveFlow, FlowResolver},
        loader::WorkflowConfigLoader,
        validation::{TransitionCheck, TransitionRequest, TransitionTrigger, TransitionValidator},
    },
};

/// Named conditions that propose a follow-on write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeEvent {
    FirstChildStarted,
    AllChildrenInReview,
    AllTasksComplete,
    FeatureSelfAdvancement,
    AllFeaturesComplete,
}

impl CascadeEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            CascadeEvent::FirstChildStarted => "first_child_started",
            CascadeEvent::AllChildrenInReview => "all_children_in_review",
            CascadeEvent::AllTasksComplete => "all_tasks_complete",
            CascadeEvent::FeatureSelfAdvancement => "feature_self_advancement",
            CascadeEvent::AllFeaturesComplete => "all_features_complete",
        }
    }
}

/// One node of the cascade result tree.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CascadeRecord {
    pub event: CascadeEvent,
    pub target_type: ContainerType,
    pub target_id: Uuid,
    pub previous_status: String,
    pub new_status: String,
    pub applied: bool,
    pub reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cleanup: Option<CleanupReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unblocked_tasks: Vec<TaskBrief>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub child_cascades: Vec<CascadeRecord>,
}

/// What completion cleanup did to a feature's leftover tasks.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct CleanupReport {
    /// Tasks deleted: empty summary, no transitions, no content sections.
    pub removed_task_ids: Vec<Uuid>,
    /// Tasks kept because they carry user-authored content.
    pub retained: Vec<RetainedTask>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RetainedTask {
    pub id: Uuid,
    pub title: String,
    pub status: String,
}

/// Result of one `apply` pass.
#[derive(Debug, Clone, Serialize, PartialEq, Default)]
pub struct CascadeOutcome {
    pub records: Vec<CascadeRecord>,
    /// Downstream tasks released when the triggering entity was a task that
    /// reached a terminal role.
    pub unblocked_tasks: Vec<TaskBrief>,
    /// Cleanup performed when the triggering entity was a feature that
    /// reached a terminal role (cascade targets carry theirs per record).
    pub cleanup: Option<CleanupReport>,
}

/// One candidate follow-on write.
struct Candidate {
    event: CascadeEvent,
    target_type: ContainerType,
    target_id: Uuid,
    proposed: String,
}

/// Cascade engine over an entity store.
pub struct CascadeEngine<S> {
    store: Arc<S>,
    loader: Arc<WorkflowConfigLoader>,
    validator: TransitionValidator<S>,
    deps: DependencyService<S>,
}

impl<S: EntityStore> CascadeEngine<S> {
    pub fn new(store: Arc<S>, loader: Arc<WorkflowConfigLoader>) -> Self {
        Self {
            validator: TransitionValidator::new(store.clone(), loader.clone()),
            deps: DependencyService::new(store.clone(), loader.clone()),
            store,
            loader,
        }
    }

    /// Run the cascade pass for an entity whose status was just written.
    pub async fn apply(&self, entity_type: ContainerType, id: Uuid) -> Result<CascadeOutcome> {
        let config = self.loader.load();
        if !config.auto_cascade.enabled {
            return Ok(CascadeOutcome::default());
        }

        let mut outcome = CascadeOutcome {
            records: vec![],
            unblocked_tasks: vec![],
            cleanup: None,
        };
        let resolver = FlowResolver::new(&config);

        // A feature completed directly (not as a cascade target) still gets
        // its scaffolding cleanup before events are evaluated.
        if entity_type == ContainerType::Feature && config.auto_cascade.completion_cleanup {
            if let Some(feature) = self.store.get_feature(id).await? {
                if resolver.role(ContainerType::Feature, &feature.tags, &feature.status)
                    == StatusRole::Terminal
                {
                    outcome.cleanup = Some(self.cleanup_feature(id, &resolver).await?);
                }
            }
        }

        outcome.records = self.cascade_from(entity_type, id, 0, &config).await?;

        // Unblock detection for the triggering task itself; cascade targets
        // are parents, so this is the only place a task completion reports
        // its released downstream work.
        if entity_type == ContainerType::Task {
            if let Some(task) = self.store.get_task(id).await? {
                if resolver.role(ContainerType::Task, &task.tags, &task.status)
                    == StatusRole::Terminal
                {
                    outcome.unblocked_tasks = self.deps.newly_unblocked(id).await?;
                }
            }
        }
        Ok(outcome)
    }

    fn cascade_from<'a>(
        &'a self,
        entity_type: ContainerType,
        id: Uuid,
        depth: u32,
        config: &'a WorkflowConfig,
    ) -> std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Vec<CascadeRecord>>> + Send + 'a>,
    > {
        Box::pin(async move {
            if depth >= config.auto_cascade.max_depth {
                tracing::warn!(
                    entity = %id,
                    depth,
                    max_depth = config.auto_cascade.max_depth,
                    "cascade depth cap reached, truncating"
                );
                return Ok(vec![]);
            }

            let candidates = self.detect(entity_type, id, config).await?;
            let mut records = Vec::with_capacity(candidates.len());
            for candidate in candidates {
                records.push(self.apply_candidate(candidate, depth, config).await?);
            }
            Ok(records)
        })
    }

    /// Compute candidate events for the changed entity.
    async fn detect(
        &self,
        entity_type: ContainerType,
        id: Uuid,
        config: &WorkflowConfig,
    ) -> Result<Vec<Candidate>> {
        let resolver = FlowResolver::new(config);
        match entity_type {
            ContainerType::Task => self.detect_for_task(id, &resolver, config).await,
            ContainerType::Feature => self.detect_for_feature(id, &resolver, config).await,
            // Projects are top-level; nothing cascades upward from them.
            ContainerType::Project => Ok(vec![]),
        }
    }

    async fn detect_for_task(
        &self,
        id: Uuid,
        resolver: &FlowResolver<'_>,
        config: &WorkflowConfig,
    ) -> Result<Vec<Candidate>> {
        let Some(task) = self.store.get_task(id).await? else {
            return Ok(vec![]);
        };
        let Some(feature_id) = task.feature_id else {
            return Ok(vec![]);
        };
        let Some(feature) = self.store.get_feature(feature_id).await? else {
            return Ok(vec![]);
        };

        let task_role = resolver.role(ContainerType::Task, &task.tags, &task.status);
        let feature_role = resolver.role(ContainerType::Feature, &feature.tags, &feature.status);
        let feature_flow = resolver.active_flow(ContainerType::Feature, &feature.tags);
        let siblings = self.store.tasks_of_feature(feature_id).await?;
        let sibling_role =
            |t: &Task| resolver.role(ContainerType::Task, &t.tags, &t.status);

        let mut candidates = Vec::new();

        if config.auto_cascade.start_cascade
            && task_role == StatusRole::Work
            && feature_role == StatusRole::Queue
        {
            if let Some(proposed) = next_step(&feature_flow, &feature.status) {
                candidates.push(Candidate {
                    event: CascadeEvent::FirstChildStarted,
                    target_type: ContainerType::Feature,
                    target_id: feature_id,
                    proposed,
                });
            }
        }

        if task_role == StatusRole::Review
            && feature_role == StatusRole::Work
            && siblings
                .iter()
                .all(|t| sibling_role(t).at_least(StatusRole::Review))
        {
            if let Some(proposed) = next_step(&feature_flow, &feature.status) {
                // This event only carries the feature into review; the
                // terminal advance belongs to the completion event.
                let proposed_role =
                    resolver.role(ContainerType::Feature, &feature.tags, &proposed);
                if proposed_role == StatusRole::Review {
                    candidates.push(Candidate {
                        event: CascadeEvent::AllChildrenInReview,
                        target_type: ContainerType::Feature,
                        target_id: feature_id,
                        proposed,
                    });
                }
            }
        }

        if task_role == StatusRole::Terminal
            && siblings
                .iter()
                .all(|t| sibling_role(t) == StatusRole::Terminal)
        {
            if let Some(proposed) = next_step(&feature_flow, &feature.status) {
                let proposed_role =
                    resolver.role(ContainerType::Feature, &feature.tags, &proposed);
                if proposed_role == StatusRole::Terminal && feature.requires_verification {
                    tracing::info!(
                        feature = %feature_id,
                        "all tasks complete but feature requires verification, suppressing"
                    );
                } else {
                    candidates.push(Candidate {
                        event: CascadeEvent::AllTasksComplete,
                        target_type: ContainerType::Feature,
                        target_id: feature_id,
                        proposed,
                    });
                }
            }
        }

        Ok(candidates)
    }

    async fn detect_for_feature(
        &self,
        id: Uuid,
        resolver: &FlowResolver<'_>,
        config: &WorkflowConfig,
    ) -> Result<Vec<Candidate>> {
        let Some(feature) = self.store.get_feature(id).await? else {
            return Ok(vec![]);
        };
        let feature_role = resolver.role(ContainerType::Feature, &feature.tags, &feature.status);
        let feature_flow = resolver.active_flow(ContainerType::Feature, &feature.tags);

        let mut candidates = Vec::new();

        // Keep a finished feature stepping through its mid-pipeline statuses.
        if feature_role != StatusRole::Terminal {
            let tasks = self.store.tasks_of_feature(id).await?;
            let all_done = !tasks.is_empty()
                && tasks.iter().all(|t| {
                    resolver.role(ContainerType::Task, &t.tags, &t.status) == StatusRole::Terminal
                });
            if all_done {
                if let Some(proposed) = next_step(&feature_flow, &feature.status) {
                    let proposed_role =
                        resolver.role(ContainerType::Feature, &feature.tags, &proposed);
                    if proposed_role == StatusRole::Terminal && feature.requires_verification {
                        tracing::info!(
                            feature = %id,
                            "self-advancement into terminal suppressed, verification required"
                        );
                    } else {
                        candidates.push(Candidate {
                            event: CascadeEvent::FeatureSelfAdvancement,
                            target_type: ContainerType::Feature,
                            target_id: id,
                            proposed,
                        });
                    }
                }
            }
        }

        let Some(project_id) = feature.project_id else {
            return Ok(candidates);
        };
        let Some(project) = self.store.get_project(project_id).await? else {
            return Ok(candidates);
        };
        let project_role = resolver.role(ContainerType::Project, &project.tags, &project.status);
        let project_flow = resolver.active_flow(ContainerType::Project, &project.tags);

        if config.auto_cascade.start_cascade
            && feature_role == StatusRole::Work
            && project_role == StatusRole::Queue
        {
            if let Some(proposed) = next_step(&project_flow, &project.status) {
                candidates.push(Candidate {
                    event: CascadeEvent::FirstChildStarted,
                    target_type: ContainerType::Project,
                    target_id: project_id,
                    proposed,
                });
            }
        }

        if feature_role == StatusRole::Terminal {
            let siblings = self.store.features_of_project(project_id).await?;
            let all_done = siblings.iter().all(|f| {
                resolver.role(ContainerType::Feature, &f.tags, &f.status) == StatusRole::Terminal
            });
            if all_done {
                if let Some(proposed) = next_step(&project_flow, &project.status) {
                    candidates.push(Candidate {
                        event: CascadeEvent::AllFeaturesComplete,
                        target_type: ContainerType::Project,
                        target_id: project_id,
                        proposed,
                    });
                }
            }
        }

        Ok(candidates)
    }

    /// Apply one candidate: re-fetch, skip-if-done, validate, persist, audit,
    /// clean up, recurse.
    async fn apply_candidate(
        &self,
        candidate: Candidate,
        depth: u32,
        config: &WorkflowConfig,
    ) -> Result<CascadeRecord> {
        let resolver = FlowResolver::new(config);

        // Re-fetch: an earlier step of this pass may have moved the target.
        let (current_status, tags) = match candidate.target_type {
            ContainerType::Feature => match self.store.get_feature(candidate.target_id).await? {
                Some(f) => (f.status, f.tags),
                None => {
                    return Ok(self.unapplied(&candidate, "", "target no longer exists"));
                }
            },
            ContainerType::Project => match self.store.get_project(candidate.target_id).await? {
                Some(p) => (p.status, p.tags),
                None => {
                    return Ok(self.unapplied(&candidate, "", "target no longer exists"));
                }
            },
            ContainerType::Task => {
                return Ok(self.unapplied(&candidate, "", "tasks are never cascade targets"));
            }
        };

        if crate::workflow::config::status_eq(&current_status, &candidate.proposed) {
            return Ok(self.unapplied(
                &candidate,
                &current_status,
                "target already at proposed status",
            ));
        }

        let check = self
            .validator
            .check(TransitionRequest {
                container_type: candidate.target_type,
                entity_id: Some(candidate.target_id),
                tags: &tags,
                current_status: &current_status,
                new_status: &candidate.proposed,
                trigger: TransitionTrigger::Cascade,
                summary: None,
            })
            .await?;

        if let TransitionCheck::Invalid { reason, .. } = check {
            tracing::debug!(
                event = candidate.event.as_str(),
                target = %candidate.target_id,
                %reason,
                "cascade step rejected"
            );
            return Ok(self.unapplied(&candidate, &current_status, &reason));
        }

        let from_role = resolver.role(candidate.target_type, &tags, &current_status);
        let to_role = resolver.role(candidate.target_type, &tags, &candidate.proposed);

        self.store
            .set_status(
                candidate.target_type,
                candidate.target_id,
                candidate.proposed.clone(),
            )
            .await?;

        if from_role != to_role {
            self.store
                .append_transition(RoleTransition {
                    id: Uuid::new_v4(),
                    entity_id: candidate.target_id,
                    entity_type: candidate.target_type,
                    from_role,
                    to_role,
                    from_status: current_status.clone(),
                    to_status: candidate.proposed.clone(),
                    trigger: candidate.event.as_str().to_string(),
                    summary: None,
                    created_at: chrono::Utc::now(),
                })
                .await?;
        }

        tracing::info!(
            event = candidate.event.as_str(),
            target_type = %candidate.target_type,
            target = %candidate.target_id,
            from = %current_status,
            to = %candidate.proposed,
            depth,
            "cascade applied"
        );

        let cleanup = if candidate.target_type == ContainerType::Feature
            && to_role == StatusRole::Terminal
            && config.auto_cascade.completion_cleanup
        {
            Some(self.cleanup_feature(candidate.target_id, &resolver).await?)
        } else {
            None
        };

        let child_cascades = self
            .cascade_from(candidate.target_type, candidate.target_id, depth + 1, config)
            .await?;

        Ok(CascadeRecord {
            event: candidate.event,
            target_type: candidate.target_type,
            target_id: candidate.target_id,
            previous_status: current_status,
            new_status: candidate.proposed,
            applied: true,
            reason: format!("{} at depth {depth}", candidate.event.as_str()),
            error: None,
            cleanup,
            unblocked_tasks: vec![],
            child_cascades,
        })
    }

    /// Delete a completed feature's abandoned scaffolding tasks.
    ///
    /// Removable: still non-terminal, empty summary, no recorded role
    /// transitions, no content sections. Anything else is reported back as
    /// retained and left alone.
    async fn cleanup_feature(
        &self,
        feature_id: Uuid,
        resolver: &FlowResolver<'_>,
    ) -> Result<CleanupReport> {
        let mut report = CleanupReport::default();
        for task in self.store.tasks_of_feature(feature_id).await? {
            let role = resolver.role(ContainerType::Task, &task.tags, &task.status);
            if role == StatusRole::Terminal {
                continue;
            }
            let untouched = task.summary.trim().is_empty()
                && self.store.count_transitions(task.id).await? == 0
                && self.store.count_sections(task.id).await? == 0;
            if untouched {
                self.store.delete_task(task.id).await?;
                report.removed_task_ids.push(task.id);
            } else {
                report.retained.push(RetainedTask {
                    id: task.id,
                    title: task.title,
                    status: task.status,
                });
            }
        }
        if !report.removed_task_ids.is_empty() {
            tracing::info!(
                feature = %feature_id,
                removed = report.removed_task_ids.len(),
                retained = report.retained.len(),
                "completion cleanup finished"
            );
        }
        Ok(report)
    }

    fn unapplied(&self, candidate: &Candidate, current: &str, reason: &str) -> CascadeRecord {
        CascadeRecord {
            event: candidate.event,
            target_type: candidate.target_type,
            target_id: candidate.target_id,
            previous_status: current.to_string(),
            new_status: candidate.proposed.clone(),
            applied: false,
            reason: reason.to_string(),
            error: None,
            cleanup: None,
            unblocked_tasks: vec![],
            child_cascades: vec![],
        }
    }
}

/// One step forward in a flow from `status`, `None` at the end or when the
/// status is not a flow step.
fn next_step(flow: &ActiveFlow, status: &str) -> Option<String> {
    let pos = flow.position(status)?;
    flow.statuses.get(pos + 1).cloned()
}
