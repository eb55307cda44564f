//! Status progression: what comes next in an entity's flow, and whether a
//! user-chosen target is reachable right now.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::Result,
    models::ContainerType,
    repository::EntityStore,
    workflow::{
        config::normalize_status,
        flows::FlowResolver,
        loader::WorkflowConfigLoader,
        validation::{TransitionCheck, TransitionRequest, TransitionTrigger, TransitionValidator},
    },
};

/// Answer to "what should this entity do next".
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Progression {
    /// The next step is legal right now.
    Ready {
        recommended: String,
        flow_name: String,
        sequence: Vec<String>,
        position: usize,
        matched_tags: Vec<String>,
        reason: String,
        advisory: Option<String>,
    },
    /// A next step exists but prerequisites reject it.
    Blocked {
        current: String,
        candidate: String,
        blockers: Vec<String>,
        suggestions: Vec<String>,
        flow_name: String,
    },
    /// Nothing follows: terminal status or end of flow.
    Terminal {
        current: String,
        flow_name: String,
        reason: String,
    },
}

/// Pure projection of the active flow, for rendering progress bars.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowPath {
    pub flow_name: String,
    pub sequence: Vec<String>,
    /// Index of the current status, `None` when it is not a flow step.
    pub position: Option<usize>,
    pub matched_tags: Vec<String>,
    pub terminal_statuses: Vec<String>,
}

/// Readiness report for a user-supplied target status.
#[derive(Debug, Clone, PartialEq)]
pub struct Readiness {
    pub target: String,
    pub check: TransitionCheck,
    pub flow_name: String,
    pub current_position: Option<usize>,
    pub target_position: Option<usize>,
}

/// Read-side progression queries. Recommendation only; the write path
/// revalidates through the same gate before committing.
pub struct ProgressionService<S> {
    loader: Arc<WorkflowConfigLoader>,
    validator: TransitionValidator<S>,
}

impl<S: EntityStore> ProgressionService<S> {
    pub fn new(store: Arc<S>, loader: Arc<WorkflowConfigLoader>) -> Self {
        Self {
            validator: TransitionValidator::new(store, loader.clone()),
            loader,
        }
    }

    /// Recommend the next status for an entity.
    pub async fn next_status(
        &self,
        container_type: ContainerType,
        tags: &[String],
        current_status: &str,
        entity_id: Option<Uuid>,
    ) -> Result<Progression> {
        let config = self.loader.load();
        let resolver = FlowResolver::new(&config);
        let flow = resolver.active_flow(container_type, tags);
        let current = normalize_status(current_status);

        if resolver.is_terminal(container_type, &current) {
            return Ok(Progression::Terminal {
                current,
                flow_name: flow.name,
                reason: "status is terminal".to_string(),
            });
        }

        let position = match flow.position(&current) {
            Some(pos) => pos,
            None => {
                return Ok(Progression::Blocked {
                    candidate: String::new(),
                    blockers: vec![format!(
                        "status '{current}' is not a step of flow '{}'",
                        flow.name
                    )],
                    suggestions: flow
                        .statuses
                        .first()
                        .map(|s| vec![format!("move to '{s}' to enter the flow")])
                        .unwrap_or_default(),
                    flow_name: flow.name,
                    current,
                })
            }
        };

        let candidate = match flow.statuses.get(position + 1) {
            Some(next) => next.clone(),
            None => {
                return Ok(Progression::Terminal {
                    current,
                    flow_name: flow.name,
                    reason: "already at the last step of the flow".to_string(),
                })
            }
        };

        let check = self
            .validator
            .check(TransitionRequest {
                container_type,
                entity_id,
                tags,
                current_status: &current,
                new_status: &candidate,
                trigger: TransitionTrigger::Manual,
                summary: None,
            })
            .await?;

        Ok(match check {
            TransitionCheck::Valid => Progression::Ready {
                recommended: candidate,
                reason: format!("step {} of {}", position + 2, flow.statuses.len()),
                flow_name: flow.name,
                sequence: flow.statuses,
                position,
                matched_tags: flow.matched_tags,
                advisory: None,
            },
            TransitionCheck::ValidWithAdvisory(advisory) => Progression::Ready {
                recommended: candidate,
                reason: format!("step {} of {}", position + 2, flow.statuses.len()),
                flow_name: flow.name,
                sequence: flow.statuses,
                position,
                matched_tags: flow.matched_tags,
                advisory: Some(advisory),
            },
            TransitionCheck::Invalid {
                reason,
                suggestions,
            } => Progression::Blocked {
                current,
                candidate,
                blockers: vec![reason],
                suggestions,
                flow_name: flow.name,
            },
        })
    }

    /// Project the active flow without touching the store.
    pub fn flow_path(
        &self,
        container_type: ContainerType,
        tags: &[String],
        current_status: Option<&str>,
    ) -> FlowPath {
        let config = self.loader.load();
        let resolver = FlowResolver::new(&config);
        let flow = resolver.active_flow(container_type, tags);
        FlowPath {
            position: current_status.and_then(|s| flow.position(s)),
            flow_name: flow.name,
            sequence: flow.statuses,
            matched_tags: flow.matched_tags,
            terminal_statuses: resolver.terminal_statuses(container_type).to_vec(),
        }
    }

    /// Validate a user-supplied target instead of the computed next step.
    pub async fn readiness(
        &self,
        container_type: ContainerType,
        tags: &[String],
        current_status: &str,
        target_status: &str,
        entity_id: Option<Uuid>,
    ) -> Result<Readiness> {
        let config = self.loader.load();
        let resolver = FlowResolver::new(&config);
        let flow = resolver.active_flow(container_type, tags);
        let target = normalize_status(target_status);

        let check = self
            .validator
            .check(TransitionRequest {
                container_type,
                entity_id,
                tags,
                current_status,
                new_status: &target,
                trigger: TransitionTrigger::Manual,
                summary: None,
            })
            .await?;

        Ok(Readiness {
            current_position: flow.position(current_status),
            target_position: flow.position(&target),
            target,
            check,
            flow_name: flow.name,
        })
    }
}
