//! End-to-end scenarios over the tool handler and the in-memory store.

use std::sync::Arc;

use mcp_protocol::McpToolHandler;
use mocks::{
    blocks_at, chain_with_blocks, default_loader, feature_with_tasks, valid_summary,
    FeatureBuilder, MockEntityStore, TaskBuilder,
};
use orchestrator_core::{
    models::{ContainerType, UnblockThreshold, WorkScope},
    protocol::{ManageContainerParams, ManageOp, ProtocolHandler},
    repository::EntityStore,
    services::{dependency::DependencyService, recommend::NextTaskService},
};
use uuid::Uuid;

fn handler_over(store: Arc<MockEntityStore>) -> McpToolHandler<MockEntityStore> {
    McpToolHandler::new(store, default_loader())
}

async fn set_status(
    handler: &McpToolHandler<MockEntityStore>,
    container_type: ContainerType,
    id: Uuid,
    status: &str,
    summary: Option<String>,
) -> orchestrator_core::protocol::ResponseEnvelope {
    handler
        .manage_container(ManageContainerParams {
            op: ManageOp::SetStatus,
            container_type,
            id: Some(id),
            status: Some(status.to_string()),
            summary,
            data: None,
        })
        .await
}

/// Scenario 1: four unblocked tasks come back in creation order.
#[tokio::test]
async fn full_parallel_start() {
    let store = Arc::new(MockEntityStore::new());
    let (feature, tasks) = feature_with_tasks(&store, 4).await.unwrap();

    let next = NextTaskService::new(store.clone(), default_loader());
    let result = next
        .next_tasks(WorkScope::feature(feature.id), 4, false)
        .await
        .unwrap();

    assert_eq!(result.total_candidates, 4);
    assert_eq!(result.blocked_count, 0);
    let ids: Vec<Uuid> = result.items.iter().map(|i| i.id).collect();
    let expected: Vec<Uuid> = tasks.iter().map(|t| t.id).collect();
    assert_eq!(ids, expected, "stable creation-order tiebreak");
}

/// Scenario 2: a BLOCKS chain releases exactly one task at a time.
#[tokio::test]
async fn linear_chain() {
    let store = Arc::new(MockEntityStore::new());
    let mut tasks = Vec::new();
    for i in 1..=4 {
        tasks.push(
            store
                .create_task(TaskBuilder::titled(format!("T{i}")).build(), "pending".into())
                .await
                .unwrap(),
        );
    }
    chain_with_blocks(&store, &tasks).await.unwrap();

    let handler = handler_over(store.clone());
    let next = NextTaskService::new(store.clone(), default_loader());

    for i in 0..4 {
        let frontier = next.next_tasks(WorkScope::default(), 4, false).await.unwrap();
        let ids: Vec<Uuid> = frontier.items.iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![tasks[i].id], "only the chain head is unblocked");

        let envelope = set_status(
            &handler,
            ContainerType::Task,
            tasks[i].id,
            "completed",
            Some(valid_summary()),
        )
        .await;
        assert!(envelope.success, "{:?}", envelope.error);

        // Completion reports the next link as newly unblocked.
        if i < 3 {
            let unblocked = envelope.data.unwrap()["unblocked_tasks"].clone();
            let unblocked: Vec<serde_json::Value> =
                serde_json::from_value(unblocked).unwrap();
            assert_eq!(unblocked.len(), 1);
            assert_eq!(unblocked[0]["id"], tasks[i + 1].id.to_string());
        }
    }

    let frontier = next.next_tasks(WorkScope::default(), 4, false).await.unwrap();
    assert!(frontier.items.is_empty());
    assert_eq!(frontier.total_candidates, 0);
}

/// Scenario 3: a `work` threshold releases the dependent as soon as the
/// blocker starts; the in-progress blocker itself leaves the frontier.
#[tokio::test]
async fn partial_unblock_threshold() {
    let store = Arc::new(MockEntityStore::new());
    let t1 = store
        .create_task(TaskBuilder::titled("T1").build(), "pending".into())
        .await
        .unwrap();
    let t2 = store
        .create_task(TaskBuilder::titled("T2").build(), "pending".into())
        .await
        .unwrap();
    store
        .create_dependency(blocks_at(t1.id, t2.id, UnblockThreshold::Work))
        .await
        .unwrap();

    let handler = handler_over(store.clone());
    let next = NextTaskService::new(store.clone(), default_loader());

    // Before T1 starts, T2 is blocked.
    let frontier = next.next_tasks(WorkScope::default(), 4, false).await.unwrap();
    assert_eq!(
        frontier.items.iter().map(|t| t.id).collect::<Vec<_>>(),
        vec![t1.id]
    );
    assert_eq!(frontier.blocked_count, 1);

    let envelope = set_status(&handler, ContainerType::Task, t1.id, "in-progress", None).await;
    assert!(envelope.success, "{:?}", envelope.error);

    // T1 is no longer queue-role, T2's threshold is satisfied.
    let frontier = next.next_tasks(WorkScope::default(), 4, false).await.unwrap();
    assert_eq!(
        frontier.items.iter().map(|t| t.id).collect::<Vec<_>>(),
        vec![t2.id]
    );
    assert_eq!(frontier.blocked_count, 0);
}

/// Scenario 4: a cyclic work tree is rejected before anything persists.
#[tokio::test]
async fn circular_dependency_rejection() {
    use orchestrator_core::models::{
        DependencyType, WorkTreeEdge, WorkTreeFeature, WorkTreeSpec,
    };
    use orchestrator_core::services::work_tree::WorkTreeService;

    let store = Arc::new(MockEntityStore::new());
    let service = WorkTreeService::new(store.clone(), default_loader());

    let edge = |from, to| WorkTreeEdge {
        from_index: from,
        to_index: to,
        dep_type: DependencyType::Blocks,
        unblock_at: None,
    };
    let spec = WorkTreeSpec {
        project: None,
        features: vec![WorkTreeFeature {
            feature: FeatureBuilder::named("cyclic").build(),
            tasks: (1..=3)
                .map(|i| TaskBuilder::titled(format!("T{i}")).build())
                .collect(),
            dependencies: vec![edge(0, 1), edge(1, 2), edge(2, 0)],
        }],
    };

    let err = service.create(spec).await.unwrap_err();
    assert_eq!(err.error_code(), "CYCLE_DETECTED");

    let stats = store.get_stats().await.unwrap();
    assert_eq!(stats.total_features, 0);
    assert_eq!(stats.total_tasks, 0);
    assert_eq!(stats.total_dependencies, 0);
}

/// Scenario 5: start cascade lifts the feature out of planning; completing
/// every task walks it through the remaining statuses to terminal.
#[tokio::test]
async fn cascade_all_done_reaches_feature_terminal() {
    let store = Arc::new(MockEntityStore::new());
    let (feature, tasks) = feature_with_tasks(&store, 2).await.unwrap();
    let handler = handler_over(store.clone());

    // First start: feature advances planning -> in-development.
    let envelope = set_status(
        &handler,
        ContainerType::Task,
        tasks[0].id,
        "in-progress",
        None,
    )
    .await;
    assert!(envelope.success);
    let cascades = envelope.data.unwrap()["cascades"].clone();
    assert_eq!(cascades[0]["event"], "first_child_started");
    assert_eq!(cascades[0]["applied"], true);
    let stored = store.get_feature(feature.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "in-development");

    // Complete both tasks.
    let envelope = set_status(
        &handler,
        ContainerType::Task,
        tasks[0].id,
        "completed",
        Some(valid_summary()),
    )
    .await;
    assert!(envelope.success);

    let envelope = set_status(
        &handler,
        ContainerType::Task,
        tasks[1].id,
        "completed",
        Some(valid_summary()),
    )
    .await;
    assert!(envelope.success, "{:?}", envelope.error);

    let data = envelope.data.unwrap();
    let cascades = &data["cascades"];
    assert_eq!(cascades[0]["event"], "all_tasks_complete");
    assert_eq!(cascades[0]["applied"], true);

    // The recursion kept stepping the feature to terminal.
    let stored = store.get_feature(feature.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "completed");
}

/// Scenario 5b: `requires_verification` parks the feature one step short.
#[tokio::test]
async fn requires_verification_stops_before_terminal() {
    let store = Arc::new(MockEntityStore::new());
    let feature = store
        .create_feature(
            FeatureBuilder::named("guarded").requires_verification().build(),
            "planning".into(),
        )
        .await
        .unwrap();
    let task = store
        .create_task(
            TaskBuilder::titled("only").feature(feature.id).build(),
            "pending".into(),
        )
        .await
        .unwrap();

    let handler = handler_over(store.clone());
    set_status(&handler, ContainerType::Task, task.id, "in-progress", None).await;
    let envelope = set_status(
        &handler,
        ContainerType::Task,
        task.id,
        "completed",
        Some(valid_summary()),
    )
    .await;
    assert!(envelope.success);

    // Walks through testing and validating but never into completed.
    let stored = store.get_feature(feature.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "validating");

    // Manual completion is still allowed.
    let envelope = set_status(
        &handler,
        ContainerType::Feature,
        feature.id,
        "completed",
        None,
    )
    .await;
    assert!(envelope.success, "{:?}", envelope.error);
    let stored = store.get_feature(feature.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "completed");
}

/// Scenario 6: a `prototype` tag selects the shortened flow; one completed
/// task carries the feature straight to terminal.
#[tokio::test]
async fn alternative_flow_via_tag() {
    let store = Arc::new(MockEntityStore::new());
    let feature = store
        .create_feature(
            FeatureBuilder::named("spike").tags(&["prototype"]).build(),
            "planning".into(),
        )
        .await
        .unwrap();
    let task = store
        .create_task(
            TaskBuilder::titled("try it").feature(feature.id).build(),
            "pending".into(),
        )
        .await
        .unwrap();

    let handler = handler_over(store.clone());
    set_status(&handler, ContainerType::Task, task.id, "in-progress", None).await;
    let stored = store.get_feature(feature.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "in-development");

    let envelope = set_status(
        &handler,
        ContainerType::Task,
        task.id,
        "completed",
        Some(valid_summary()),
    )
    .await;
    assert!(envelope.success, "{:?}", envelope.error);

    // No testing/validating stages in the rapid flow.
    let stored = store.get_feature(feature.id).await.unwrap().unwrap();
    assert_eq!(stored.status, "completed");
}

/// RELATES_TO edges are invisible to every blocking computation.
#[tokio::test]
async fn relates_to_never_blocks() {
    let store = Arc::new(MockEntityStore::new());
    let t1 = store
        .create_task(TaskBuilder::titled("a").build(), "pending".into())
        .await
        .unwrap();
    let t2 = store
        .create_task(TaskBuilder::titled("b").build(), "pending".into())
        .await
        .unwrap();
    store
        .create_dependency(mocks::relates(t1.id, t2.id))
        .await
        .unwrap();

    let deps = DependencyService::new(store.clone(), default_loader());
    assert!(deps.blocked_tasks(WorkScope::default()).await.unwrap().is_empty());
    assert!(!deps.is_blocked(t2.id).await.unwrap());

    let next = NextTaskService::new(store.clone(), default_loader());
    let frontier = next.next_tasks(WorkScope::default(), 4, false).await.unwrap();
    assert_eq!(frontier.items.len(), 2);
}
