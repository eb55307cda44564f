//! Next-task recommendation: the priority-ordered unblocked frontier.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{OrchestratorError, Result},
    models::{ContainerType, Priority, StatusRole, Task, WorkScope},
    repository::EntityStore,
    services::dependency::DependencyService,
    workflow::{flows::FlowResolver, loader::WorkflowConfigLoader},
};

/// Inclusive bounds for the `limit` parameter.
pub const LIMIT_MIN: u32 = 1;
pub const LIMIT_MAX: u32 = 20;

/// One recommended task. The wide fields only appear when `detail` was set.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TaskRecommendation {
    pub id: Uuid,
    pub title: String,
    pub status: String,
    pub priority: Priority,
    pub complexity: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
}

/// Recommendation result plus frontier diagnostics.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NextTasks {
    pub items: Vec<TaskRecommendation>,
    /// Queue-role tasks in scope before blocking was considered.
    pub total_candidates: usize,
    /// How many of those were excluded as blocked.
    pub blocked_count: usize,
}

/// Next-task recommender.
pub struct NextTaskService<S> {
    store: Arc<S>,
    loader: Arc<WorkflowConfigLoader>,
    deps: DependencyService<S>,
}

impl<S: EntityStore> NextTaskService<S> {
    pub fn new(store: Arc<S>, loader: Arc<WorkflowConfigLoader>) -> Self {
        Self {
            deps: DependencyService::new(store.clone(), loader.clone()),
            store,
            loader,
        }
    }

    /// Top `limit` unblocked queue-role tasks in scope, quick wins first.
    ///
    /// Sort order: priority (HIGH first), complexity ascending with unsized
    /// tasks last, creation time ascending as the stable tiebreak.
    pub async fn next_tasks(
        &self,
        scope: WorkScope,
        limit: u32,
        detail: bool,
    ) -> Result<NextTasks> {
        if !(LIMIT_MIN..=LIMIT_MAX).contains(&limit) {
            return Err(OrchestratorError::validation(format!(
                "limit must be between {LIMIT_MIN} and {LIMIT_MAX}, got {limit}"
            )));
        }

        let config = self.loader.load();
        let resolver = FlowResolver::new(&config);

        let mut candidates: Vec<Task> = self
            .deps
            .tasks_in_scope(scope)
            .await?
            .into_iter()
            .filter(|t| {
                resolver.role(ContainerType::Task, &t.tags, &t.status) == StatusRole::Queue
            })
            .collect();
        let total_candidates = candidates.len();

        let mut unblocked = Vec::with_capacity(candidates.len());
        for task in candidates.drain(..) {
            let blockers = self.deps.blockers_of(&resolver, task.id).await?;
            if blockers.iter().all(|b| b.satisfied) {
                unblocked.push(task);
            }
        }
        let blocked_count = total_candidates - unblocked.len();

        unblocked.sort_by(|a, b| {
            let key = |t: &Task| {
                (
                    t.priority.rank(),
                    t.complexity.unwrap_or(u8::MAX),
                    t.created_at,
                )
            };
            key(a).cmp(&key(b))
        });

        let items = unblocked
            .into_iter()
            .take(limit as usize)
            .map(|t| TaskRecommendation {
                id: t.id,
                title: t.title,
                status: t.status,
                priority: t.priority,
                complexity: t.complexity,
                summary: detail.then_some(t.summary),
                tags: detail.then_some(t.tags),
                parent_id: if detail { t.feature_id } else { None },
            })
            .collect();

        Ok(NextTasks {
            items,
            total_candidates,
            blocked_count,
        })
    }

    /// Access the underlying store, for handler wiring.
    pub fn store(&self) -> Arc<S> {
        self.store.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_bounds_are_inclusive() {
        assert_eq!(LIMIT_MIN, 1);
        assert_eq!(LIMIT_MAX, 20);
    }

    #[test]
    fn detail_fields_are_omitted_when_none() {
        let rec = TaskRecommendation {
            id: Uuid::new_v4(),
            title: "t".into(),
            status: "pending".into(),
            priority: Priority::Medium,
            complexity: Some(3),
            summary: None,
            tags: None,
            parent_id: None,
        };
        let json = serde_json::to_value(&rec).unwrap();
        assert!(json.get("summary").is_none());
        assert!(json.get("tags").is_none());
        assert_eq!(json["complexity"], 3);
    }
}
