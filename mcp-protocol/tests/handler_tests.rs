//! Tool-handler integration tests over the in-memory store.

use std::sync::Arc;

use serde_json::json;

use mcp_protocol::McpToolHandler;
use mocks::{default_loader, valid_summary, FeatureBuilder, MockEntityStore, TaskBuilder};
use orchestrator_core::{
    models::ContainerType,
    repository::EntityStore,
    protocol::{
        GetNextItemParams, ManageContainerParams, ManageOp, ProgressParams, ProtocolHandler,
        QueryContainerParams, QueryOp,
    },
};

fn handler() -> (Arc<MockEntityStore>, McpToolHandler<MockEntityStore>) {
    let store = Arc::new(MockEntityStore::new());
    let handler = McpToolHandler::new(store.clone(), default_loader());
    (store, handler)
}

fn create_params(container_type: ContainerType, data: serde_json::Value) -> ManageContainerParams {
    ManageContainerParams {
        op: ManageOp::Create,
        container_type,
        id: None,
        status: None,
        summary: None,
        data: Some(data),
    }
}

#[tokio::test]
async fn create_task_defaults_to_flow_head() {
    let (_, handler) = handler();
    let envelope = handler
        .manage_container(create_params(
            ContainerType::Task,
            json!({"feature_id": null, "title": "first task"}),
        ))
        .await;
    assert!(envelope.success, "{:?}", envelope.error);
    let data = envelope.data.unwrap();
    assert_eq!(data["status"], "pending");
    assert_eq!(data["title"], "first task");
}

#[tokio::test]
async fn create_with_unknown_status_is_rejected() {
    let (_, handler) = handler();
    let envelope = handler
        .manage_container(create_params(
            ContainerType::Task,
            json!({"feature_id": null, "title": "t", "status": "galloping"}),
        ))
        .await;
    assert!(!envelope.success);
    assert_eq!(envelope.error.unwrap().code, "VALIDATION_ERROR");
}

#[tokio::test]
async fn set_status_without_summary_fails_completion() {
    let (store, handler) = handler();
    let task = store
        .create_task(TaskBuilder::titled("t").build(), "in-progress".into())
        .await
        .unwrap();

    let envelope = handler
        .manage_container(ManageContainerParams {
            op: ManageOp::SetStatus,
            container_type: ContainerType::Task,
            id: Some(task.id),
            status: Some("completed".into()),
            summary: None,
            data: None,
        })
        .await;
    assert!(!envelope.success);
    let error = envelope.error.unwrap();
    assert_eq!(error.code, "PREREQUISITE_NOT_MET");
    assert!(error.details.contains("0 characters"));
}

#[tokio::test]
async fn set_status_with_summary_completes_and_cascades() {
    let (store, handler) = handler();
    let feature = store
        .create_feature(FeatureBuilder::named("f").build(), "planning".into())
        .await
        .unwrap();
    let task = store
        .create_task(
            TaskBuilder::titled("only task").feature(feature.id).build(),
            "in-progress".into(),
        )
        .await
        .unwrap();

    let envelope = handler
        .manage_container(ManageContainerParams {
            op: ManageOp::SetStatus,
            container_type: ContainerType::Task,
            id: Some(task.id),
            status: Some("completed".into()),
            summary: Some(valid_summary()),
            data: None,
        })
        .await;
    assert!(envelope.success, "{:?}", envelope.error);
    let data = envelope.data.unwrap();
    assert_eq!(data["status"], "completed");
    // all_tasks_complete fires against the parent feature
    let cascades = data["cascades"].as_array().unwrap();
    assert!(!cascades.is_empty());

    let stored = store.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(stored.summary.chars().count(), 400);
}

#[tokio::test]
async fn next_item_limit_zero_is_validation_error() {
    let (_, handler) = handler();
    let envelope = handler
        .get_next_item(GetNextItemParams {
            limit: 0,
            ..Default::default()
        })
        .await;
    assert!(!envelope.success);
    assert_eq!(envelope.error.unwrap().code, "VALIDATION_ERROR");
}

#[tokio::test]
async fn overview_counts_children() {
    let (store, handler) = handler();
    let feature = store
        .create_feature(FeatureBuilder::named("f").build(), "planning".into())
        .await
        .unwrap();
    for i in 0..3 {
        store
            .create_task(
                TaskBuilder::titled(format!("t{i}")).feature(feature.id).build(),
                "pending".into(),
            )
            .await
            .unwrap();
    }

    let envelope = handler
        .query_container(QueryContainerParams {
            op: QueryOp::Overview,
            container_type: ContainerType::Feature,
            id: Some(feature.id),
            filters: Default::default(),
        })
        .await;
    assert!(envelope.success);
    let data = envelope.data.unwrap();
    assert_eq!(data["task_count"], 3);
    assert_eq!(data["tasks_by_status"]["pending"], 3);
}

#[tokio::test]
async fn progress_recommends_next_flow_step() {
    let (_, handler) = handler();
    let envelope = handler
        .progress(ProgressParams {
            container_type: ContainerType::Task,
            entity_id: None,
            tags: vec![],
            current_status: "pending".into(),
            target_status: None,
        })
        .await;
    assert!(envelope.success);
    let data = envelope.data.unwrap();
    assert_eq!(data["state"], "ready");
    assert_eq!(data["recommended"], "in-progress");
}

#[tokio::test]
async fn get_missing_entity_reports_not_found() {
    let (_, handler) = handler();
    let envelope = handler
        .query_container(QueryContainerParams {
            op: QueryOp::Get,
            container_type: ContainerType::Project,
            id: Some(uuid::Uuid::new_v4()),
            filters: Default::default(),
        })
        .await;
    assert!(!envelope.success);
    assert_eq!(envelope.error.unwrap().code, "RESOURCE_NOT_FOUND");
}
