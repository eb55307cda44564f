//! Prerequisite validation for status transitions.
//!
//! The single write-time authority on whether a transition is legal: flow
//! membership, terminal gates, direction, and the structural prerequisites
//! that tie containers to their children and tasks to their blockers.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    error::Result,
    models::{ContainerType, StatusRole, Task},
    repository::{EdgeDirection, EntityStore},
    workflow::{
        config::{normalize_status, status_eq},
        flows::FlowResolver,
        loader::WorkflowConfigLoader,
    },
};

/// Task summaries must land in this range (inclusive) for flow completion.
pub const SUMMARY_MIN: usize = 300;
pub const SUMMARY_MAX: usize = 500;

/// What initiated a transition. Cascade-initiated moves may not complete a
/// feature that requires verification; manual ones may.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionTrigger {
    Manual,
    Cascade,
}

impl TransitionTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransitionTrigger::Manual => "manual",
            TransitionTrigger::Cascade => "cascade",
        }
    }
}

/// Outcome of a prerequisite check. Domain result, not an error: the caller
/// decides how a rejection surfaces.
#[derive(Debug, Clone, PartialEq)]
pub enum TransitionCheck {
    Valid,
    /// Legal, but worth telling the operator about.
    ValidWithAdvisory(String),
    Invalid {
        reason: String,
        suggestions: Vec<String>,
    },
}

impl TransitionCheck {
    pub fn invalid(reason: impl Into<String>) -> Self {
        TransitionCheck::Invalid {
            reason: reason.into(),
            suggestions: vec![],
        }
    }

    pub fn invalid_with(reason: impl Into<String>, suggestions: Vec<String>) -> Self {
        TransitionCheck::Invalid {
            reason: reason.into(),
            suggestions,
        }
    }

    pub fn is_allowed(&self) -> bool {
        !matches!(self, TransitionCheck::Invalid { .. })
    }
}

/// A transition to validate. `entity_id` unlocks the structural checks that
/// need store reads; without it only flow-level rules run.
#[derive(Debug, Clone)]
pub struct TransitionRequest<'a> {
    pub container_type: ContainerType,
    pub entity_id: Option<Uuid>,
    pub tags: &'a [String],
    pub current_status: &'a str,
    pub new_status: &'a str,
    pub trigger: TransitionTrigger,
    /// Summary candidate accompanying the transition; falls back to the
    /// stored task summary when absent.
    pub summary: Option<&'a str>,
}

/// Write-time transition gate over the entity store.
pub struct TransitionValidator<S> {
    store: Arc<S>,
    loader: Arc<WorkflowConfigLoader>,
}

impl<S: EntityStore> TransitionValidator<S> {
    pub fn new(store: Arc<S>, loader: Arc<WorkflowConfigLoader>) -> Self {
        Self { store, loader }
    }

    /// Run every gate in order; the first failure wins.
    pub async fn check(&self, request: TransitionRequest<'_>) -> Result<TransitionCheck> {
        let config = self.loader.load();
        let resolver = FlowResolver::new(&config);

        let container_type = request.container_type;
        let current = normalize_status(request.current_status);
        let target = normalize_status(request.new_status);

        if current == target {
            return Ok(TransitionCheck::invalid(format!(
                "{container_type} is already in status '{current}'"
            )));
        }

        let flow = resolver.active_flow(container_type, request.tags);
        let emergency_target = resolver.is_emergency(container_type, &target);

        // 1. Structural membership: the target must be a step of the active
        //    flow, a terminal status, or an emergency transition.
        let target_position = flow.position(&target);
        let target_terminal = resolver.is_terminal(container_type, &target);
        if target_position.is_none() && !target_terminal && !emergency_target {
            let mut suggestions: Vec<String> = Vec::new();
            if let Some(pos) = flow.position(&current) {
                if let Some(next) = flow.statuses.get(pos + 1) {
                    suggestions.push(format!("next status in '{}' is '{next}'", flow.name));
                }
            }
            suggestions.extend(
                config
                    .container(container_type)
                    .emergency_transitions
                    .iter()
                    .map(|s| format!("emergency transition '{s}' is always available")),
            );
            return Ok(TransitionCheck::invalid_with(
                format!(
                    "status '{target}' is not part of the active flow '{}' for {container_type}s",
                    flow.name
                ),
                suggestions,
            ));
        }

        // 2. Terminal gate: only emergency transitions leave a terminal status.
        if resolver.is_terminal(container_type, &current) && !emergency_target {
            return Ok(TransitionCheck::invalid_with(
                format!("'{current}' is terminal; only an emergency transition may leave it"),
                config
                    .container(container_type)
                    .emergency_transitions
                    .iter()
                    .map(|s| format!("emergency transition '{s}'"))
                    .collect(),
            ));
        }

        // Emergency targets bypass direction and structural prerequisites:
        // cancelling or parking an entity must always be possible.
        if emergency_target {
            return Ok(TransitionCheck::Valid);
        }

        // 3. Direction: backward movement needs the flow's opt-in.
        if let (Some(cur_pos), Some(new_pos)) = (flow.position(&current), target_position) {
            if new_pos < cur_pos && !config.container(container_type).allows_backward(&flow.name) {
                return Ok(TransitionCheck::invalid(format!(
                    "backward transition '{current}' -> '{target}' is not allowed in flow '{}'",
                    flow.name
                )));
            }
        }

        let target_role = resolver.role(container_type, request.tags, &target);

        match container_type {
            ContainerType::Feature => {
                self.check_feature(&resolver, &request, &current, &target, target_role)
                    .await
            }
            ContainerType::Task => self.check_task(&resolver, &request, target_role).await,
            ContainerType::Project => {
                self.check_project(&resolver, &request, target_role).await
            }
        }
    }

    /// Feature gates: children exist before leaving planning, children are
    /// not leapfrogged, terminal entry needs every child finished.
    async fn check_feature(
        &self,
        resolver: &FlowResolver<'_>,
        request: &TransitionRequest<'_>,
        current: &str,
        target: &str,
        target_role: StatusRole,
    ) -> Result<TransitionCheck> {
        let feature_id = match request.entity_id {
            Some(id) => id,
            None => return Ok(TransitionCheck::Valid),
        };
        let children = self.store.tasks_of_feature(feature_id).await?;

        let current_role = resolver.role(ContainerType::Feature, request.tags, current);
        if current_role == StatusRole::Queue && children.is_empty() {
            return Ok(TransitionCheck::invalid_with(
                format!("feature cannot leave '{current}' without any tasks"),
                vec!["create at least one task under this feature first".to_string()],
            ));
        }

        let child_role = |task: &Task| resolver.role(ContainerType::Task, &task.tags, &task.status);

        match target_role {
            StatusRole::Work => {
                // A feature may not run ahead of every child: something must
                // already be at or beyond the target role.
                let any_at_pace = children.iter().any(|t| {
                    let role = child_role(t);
                    role != StatusRole::Blocked && role.at_least(StatusRole::Work)
                });
                if !children.is_empty() && !any_at_pace {
                    return Ok(TransitionCheck::invalid_with(
                        format!(
                            "no task of this feature has started; cannot move feature to '{target}'"
                        ),
                        vec!["start one of the feature's tasks first".to_string()],
                    ));
                }
            }
            StatusRole::Review => {
                let lagging = children
                    .iter()
                    .filter(|t| {
                        let role = child_role(t);
                        role != StatusRole::Blocked && !role.at_least(StatusRole::Review)
                    })
                    .count();
                if lagging > 0 {
                    return Ok(TransitionCheck::ValidWithAdvisory(format!(
                        "{lagging} task(s) have not reached review yet"
                    )));
                }
            }
            StatusRole::Terminal => {
                // Untouched scaffolding (empty summary, no transitions, no
                // sections) does not hold a feature open when completion
                // cleanup will delete it anyway.
                let cleanup_enabled = self.loader.load().auto_cascade.completion_cleanup;
                let mut open: Vec<&Task> = Vec::new();
                for task in children
                    .iter()
                    .filter(|t| child_role(t) != StatusRole::Terminal)
                {
                    if cleanup_enabled && self.is_untouched(task).await? {
                        continue;
                    }
                    open.push(task);
                }
                if !open.is_empty() {
                    return Ok(TransitionCheck::invalid_with(
                        format!(
                            "{} of {} task(s) are not completed or cancelled",
                            open.len(),
                            children.len()
                        ),
                        open.iter()
                            .take(5)
                            .map(|t| format!("task '{}' is '{}'", t.title, t.status))
                            .collect(),
                    ));
                }
                if request.trigger == TransitionTrigger::Cascade {
                    if let Some(feature) = self.store.get_feature(feature_id).await? {
                        if feature.requires_verification {
                            return Ok(TransitionCheck::invalid(
                                "feature requires verification; completion must be triggered manually",
                            ));
                        }
                    }
                }
            }
            StatusRole::Queue | StatusRole::Blocked => {}
        }

        Ok(TransitionCheck::Valid)
    }

    /// Task gates: the 300-500 character summary on completion, and blocker
    /// thresholds on starting.
    async fn check_task(
        &self,
        resolver: &FlowResolver<'_>,
        request: &TransitionRequest<'_>,
        target_role: StatusRole,
    ) -> Result<TransitionCheck> {
        let task = match request.entity_id {
            Some(id) => self.store.get_task(id).await?,
            None => None,
        };

        if target_role == StatusRole::Terminal {
            let summary_len = request
                .summary
                .map(|s| s.chars().count())
                .or_else(|| task.as_ref().map(|t| t.summary.chars().count()))
                .unwrap_or(0);
            if summary_len < SUMMARY_MIN {
                return Ok(TransitionCheck::invalid_with(
                    format!(
                        "completion summary is {summary_len} characters; at least {SUMMARY_MIN} required"
                    ),
                    vec![format!(
                        "write a summary of {SUMMARY_MIN}-{SUMMARY_MAX} characters describing the outcome"
                    )],
                ));
            }
            if summary_len > SUMMARY_MAX {
                return Ok(TransitionCheck::invalid_with(
                    format!(
                        "completion summary is {summary_len} characters; at most {SUMMARY_MAX} allowed"
                    ),
                    vec![format!("shorten the summary to {SUMMARY_MAX} characters or fewer")],
                ));
            }
        }

        if target_role == StatusRole::Work {
            if let Some(task) = &task {
                let unsatisfied = self.unsatisfied_blockers(resolver, task.id).await?;
                if !unsatisfied.is_empty() {
                    return Ok(TransitionCheck::invalid_with(
                        format!(
                            "task is blocked by {} unsatisfied dependenc{}",
                            unsatisfied.len(),
                            if unsatisfied.len() == 1 { "y" } else { "ies" }
                        ),
                        unsatisfied,
                    ));
                }

                // Starting work under a parked parent is legal but worth a note.
                if let Some(feature_id) = task.feature_id {
                    if let Some(feature) = self.store.get_feature(feature_id).await? {
                        let feature_role = resolver.role(
                            ContainerType::Feature,
                            &feature.tags,
                            &feature.status,
                        );
                        if feature_role == StatusRole::Blocked {
                            return Ok(TransitionCheck::ValidWithAdvisory(format!(
                                "parent feature '{}' is on hold",
                                feature.name
                            )));
                        }
                    }
                }
            }
        }

        Ok(TransitionCheck::Valid)
    }

    /// Project gates mirror the feature ones over child features.
    async fn check_project(
        &self,
        resolver: &FlowResolver<'_>,
        request: &TransitionRequest<'_>,
        target_role: StatusRole,
    ) -> Result<TransitionCheck> {
        let project_id = match request.entity_id {
            Some(id) => id,
            None => return Ok(TransitionCheck::Valid),
        };
        let children = self.store.features_of_project(project_id).await?;
        let child_role =
            |f: &crate::models::Feature| resolver.role(ContainerType::Feature, &f.tags, &f.status);

        match target_role {
            StatusRole::Work => {
                let any_at_pace = children.iter().any(|f| {
                    let role = child_role(f);
                    role != StatusRole::Blocked && role.at_least(StatusRole::Work)
                });
                if !children.is_empty() && !any_at_pace {
                    return Ok(TransitionCheck::invalid(
                        "no feature of this project has started",
                    ));
                }
            }
            StatusRole::Terminal => {
                let open = children
                    .iter()
                    .filter(|f| child_role(f) != StatusRole::Terminal)
                    .count();
                if open > 0 {
                    return Ok(TransitionCheck::invalid(format!(
                        "{open} of {} feature(s) are not terminal",
                        children.len()
                    )));
                }
            }
            _ => {}
        }
        Ok(TransitionCheck::Valid)
    }

    /// Whether a task carries no user-authored content at all.
    async fn is_untouched(&self, task: &Task) -> Result<bool> {
        Ok(task.summary.trim().is_empty()
            && self.store.count_transitions(task.id).await? == 0
            && self.store.count_sections(task.id).await? == 0)
    }

    /// Human-readable list of blocking edges not yet at their threshold.
    async fn unsatisfied_blockers(
        &self,
        resolver: &FlowResolver<'_>,
        task_id: Uuid,
    ) -> Result<Vec<String>> {
        let edges = self
            .store
            .find_blocking_edges(task_id, EdgeDirection::Incoming)
            .await?;
        let mut unsatisfied = Vec::new();
        for edge in edges {
            let Some((blocker_id, _)) = edge.blocking_pair() else {
                continue;
            };
            let Some(blocker) = self.store.get_task(blocker_id).await? else {
                continue;
            };
            let role = resolver.role(ContainerType::Task, &blocker.tags, &blocker.status);
            if !edge.threshold().satisfied_by(role) {
                unsatisfied.push(format!(
                    "'{}' must reach {} (currently '{}')",
                    blocker.title,
                    edge.threshold(),
                    blocker.status
                ));
            }
        }
        Ok(unsatisfied)
    }
}

/// Convenience: does `status` equal any member of `set` after normalization.
pub fn status_in(status: &str, set: &[String]) -> bool {
    set.iter().any(|s| status_eq(s, status))
}
