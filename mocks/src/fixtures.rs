//! Canned stores and workflow documents for scenario tests.

use std::sync::Arc;

use orchestrator_core::{
    error::Result,
    models::{Feature, NewDependency, Task},
    repository::EntityStore,
    workflow::loader::WorkflowConfigLoader,
};

use crate::builders::{FeatureBuilder, TaskBuilder};
use crate::repository::MockEntityStore;

/// A loader that always serves the bundled default configuration.
pub fn default_loader() -> Arc<WorkflowConfigLoader> {
    Arc::new(WorkflowConfigLoader::new(None))
}

/// A feature in the default flow with `count` pending MEDIUM/complexity-5
/// tasks and no dependencies.
pub async fn feature_with_tasks(
    store: &MockEntityStore,
    count: usize,
) -> Result<(Feature, Vec<Task>)> {
    let feature = store
        .create_feature(FeatureBuilder::named("fixture feature").build(), "planning".into())
        .await?;
    let mut tasks = Vec::with_capacity(count);
    for i in 0..count {
        let task = store
            .create_task(
                TaskBuilder::titled(format!("task {}", i + 1))
                    .feature(feature.id)
                    .complexity(5)
                    .build(),
                "pending".into(),
            )
            .await?;
        tasks.push(task);
    }
    Ok((feature, tasks))
}

/// Chain tasks with BLOCKS edges: `tasks[0] -> tasks[1] -> ...`.
pub async fn chain_with_blocks(store: &MockEntityStore, tasks: &[Task]) -> Result<()> {
    for pair in tasks.windows(2) {
        store
            .create_dependency(NewDependency {
                from_task: pair[0].id,
                to_task: pair[1].id,
                dep_type: orchestrator_core::models::DependencyType::Blocks,
                unblock_at: None,
            })
            .await?;
    }
    Ok(())
}

/// A workflow document with a two-step task flow, for tests that need fast
/// terminal transitions.
pub const SHORT_TASK_FLOW: &str = r#"
status_progression:
  tasks:
    default_flow: [pending, completed]
    terminal_statuses: [completed, cancelled]
    emergency_transitions: [cancelled]
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixture_builds_feature_and_tasks() {
        let store = MockEntityStore::new();
        let (feature, tasks) = feature_with_tasks(&store, 3).await.unwrap();
        assert_eq!(tasks.len(), 3);
        assert!(tasks.iter().all(|t| t.feature_id == Some(feature.id)));
        chain_with_blocks(&store, &tasks).await.unwrap();
    }
}
