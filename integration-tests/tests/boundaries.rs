//! Boundary behavior of the engine: summary lengths,
//! recommendation limits, cascade idempotence, depth caps.

use std::io::Write;
use std::sync::Arc;

use integration_tests::TestRig;
use mocks::{summary_of_len, FeatureBuilder, TaskBuilder};
use orchestrator_core::{
    models::{ContainerType, WorkScope},
    repository::EntityStore,
    workflow::{
        loader::{WorkflowConfigLoader, WORKFLOW_FILE},
        progression::Progression,
        validation::{TransitionCheck, TransitionRequest, TransitionTrigger},
    },
};

async fn completion_check(rig: &TestRig, summary_len: usize) -> TransitionCheck {
    let task = rig
        .store
        .create_task(
            TaskBuilder::titled("boundary")
                .summary(summary_of_len(summary_len))
                .build(),
            "in-progress".into(),
        )
        .await
        .unwrap();
    rig.validator
        .check(TransitionRequest {
            container_type: ContainerType::Task,
            entity_id: Some(task.id),
            tags: &[],
            current_status: "in-progress",
            new_status: "completed",
            trigger: TransitionTrigger::Manual,
            summary: None,
        })
        .await
        .unwrap()
}

#[tokio::test]
async fn summary_length_bounds_are_inclusive() {
    let rig = TestRig::new();
    assert!(!completion_check(&rig, 299).await.is_allowed());
    assert!(completion_check(&rig, 300).await.is_allowed());
    assert!(completion_check(&rig, 500).await.is_allowed());
    assert!(!completion_check(&rig, 501).await.is_allowed());

    // The rejection names the offending length.
    match completion_check(&rig, 299).await {
        TransitionCheck::Invalid { reason, .. } => assert!(reason.contains("299")),
        other => panic!("expected Invalid, got {other:?}"),
    }
}

#[tokio::test]
async fn next_item_limit_bounds() {
    let rig = TestRig::new();
    for i in 0..3 {
        rig.store
            .create_task(TaskBuilder::titled(format!("t{i}")).build(), "pending".into())
            .await
            .unwrap();
    }

    assert!(rig.next.next_tasks(WorkScope::default(), 0, false).await.is_err());
    assert!(rig.next.next_tasks(WorkScope::default(), 21, false).await.is_err());

    let one = rig.next.next_tasks(WorkScope::default(), 1, false).await.unwrap();
    assert_eq!(one.items.len(), 1);
    let twenty = rig.next.next_tasks(WorkScope::default(), 20, false).await.unwrap();
    assert_eq!(twenty.items.len(), 3);
}

#[tokio::test]
async fn cascade_is_idempotent_without_state_change() {
    let rig = TestRig::new();
    let feature = rig
        .store
        .create_feature(FeatureBuilder::named("f").build(), "planning".into())
        .await
        .unwrap();
    let task = rig
        .store
        .create_task(
            TaskBuilder::titled("t").feature(feature.id).build(),
            "in-progress".into(),
        )
        .await
        .unwrap();

    let first = rig.cascade.apply(ContainerType::Task, task.id).await.unwrap();
    assert!(first.records.iter().any(|r| r.applied));

    // Second pass proposes nothing new; every step is skip-guarded.
    let second = rig.cascade.apply(ContainerType::Task, task.id).await.unwrap();
    assert!(second.records.iter().all(|r| !r.applied));
    let feature_after = rig.store.get_feature(feature.id).await.unwrap().unwrap();
    assert_eq!(feature_after.status, "in-development");
}

#[tokio::test]
async fn cascade_depth_cap_truncates_but_commits() {
    let dir = tempfile::tempdir().unwrap();
    let mut file = std::fs::File::create(dir.path().join(WORKFLOW_FILE)).unwrap();
    file.write_all(
        br#"
auto_cascade:
  enabled: true
  max_depth: 1
status_progression:
  tasks:
    default_flow: [pending, in-progress, completed]
    terminal_statuses: [completed, cancelled]
    emergency_transitions: [cancelled]
  features:
    default_flow: [planning, in-development, testing, validating, completed]
    terminal_statuses: [completed, cancelled]
    emergency_transitions: [cancelled]
  projects:
    default_flow: [planning, in-development, completed]
    terminal_statuses: [completed, cancelled]
    emergency_transitions: [cancelled]
"#,
    )
    .unwrap();

    let loader = Arc::new(WorkflowConfigLoader::new(Some(dir.path().to_path_buf())));
    let rig = TestRig::with_loader(loader);

    let feature = rig
        .store
        .create_feature(FeatureBuilder::named("deep").build(), "in-development".into())
        .await
        .unwrap();
    let task = rig
        .store
        .create_task(
            TaskBuilder::titled("t")
                .feature(feature.id)
                .summary(summary_of_len(400))
                .build(),
            "completed".into(),
        )
        .await
        .unwrap();

    let outcome = rig.cascade.apply(ContainerType::Task, task.id).await.unwrap();
    // all_tasks_complete applied at depth 0, recursion truncated at depth 1.
    let record = &outcome.records[0];
    assert!(record.applied);
    assert!(record.child_cascades.is_empty());

    let feature_after = rig.store.get_feature(feature.id).await.unwrap().unwrap();
    assert_eq!(feature_after.status, "testing");
}

#[tokio::test]
async fn flow_path_position_is_none_off_flow() {
    let rig = TestRig::new();
    let path = rig
        .progression
        .flow_path(ContainerType::Task, &[], Some("cancelled"));
    assert_eq!(path.position, None);
    let path = rig
        .progression
        .flow_path(ContainerType::Task, &[], Some("In_Progress"));
    assert_eq!(path.position, Some(1));
}

#[tokio::test]
async fn next_status_then_set_advances_exactly_one() {
    let rig = TestRig::new();
    let task = rig
        .store
        .create_task(
            TaskBuilder::titled("walk")
                .summary(summary_of_len(350))
                .build(),
            "pending".into(),
        )
        .await
        .unwrap();

    let first = rig
        .progression
        .next_status(ContainerType::Task, &[], "pending", Some(task.id))
        .await
        .unwrap();
    let recommended = match &first {
        Progression::Ready { recommended, position, .. } => {
            assert_eq!(*position, 0);
            recommended.clone()
        }
        other => panic!("expected Ready, got {other:?}"),
    };
    assert_eq!(recommended, "in-progress");

    rig.store
        .set_status(ContainerType::Task, task.id, recommended.clone())
        .await
        .unwrap();

    let second = rig
        .progression
        .next_status(ContainerType::Task, &[], &recommended, Some(task.id))
        .await
        .unwrap();
    match second {
        Progression::Ready { recommended, position, .. } => {
            assert_eq!(position, 1);
            assert_eq!(recommended, "completed");
        }
        other => panic!("expected Ready, got {other:?}"),
    }
}
