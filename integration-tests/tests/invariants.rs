//! Structural invariants the engine must preserve in every reachable state.

use integration_tests::TestRig;
use mocks::{summary_of_len, valid_summary, FeatureBuilder, ProjectBuilder, TaskBuilder};
use orchestrator_core::{
    models::ContainerType,
    repository::EntityStore,
    workflow::validation::{TransitionCheck, TransitionRequest, TransitionTrigger},
};

async fn check(
    rig: &TestRig,
    container_type: ContainerType,
    entity_id: Option<uuid::Uuid>,
    current: &str,
    target: &str,
) -> TransitionCheck {
    rig.validator
        .check(TransitionRequest {
            container_type,
            entity_id,
            tags: &[],
            current_status: current,
            new_status: target,
            trigger: TransitionTrigger::Manual,
            summary: None,
        })
        .await
        .unwrap()
}

/// A feature cannot reach terminal while any child task is open.
#[tokio::test]
async fn feature_terminal_requires_children_closed() {
    let rig = TestRig::new();
    let feature = rig
        .store
        .create_feature(FeatureBuilder::named("f").build(), "validating".into())
        .await
        .unwrap();
    rig.store
        .create_task(
            TaskBuilder::titled("open").feature(feature.id).build(),
            "in-progress".into(),
        )
        .await
        .unwrap();

    let result = check(
        &rig,
        ContainerType::Feature,
        Some(feature.id),
        "validating",
        "completed",
    )
    .await;
    match result {
        TransitionCheck::Invalid { reason, suggestions } => {
            assert!(reason.contains("not completed or cancelled"));
            assert!(!suggestions.is_empty());
        }
        other => panic!("expected Invalid, got {other:?}"),
    }
}

/// Terminal statuses only release through emergency transitions.
#[tokio::test]
async fn terminal_gate_holds() {
    let rig = TestRig::new();
    let task = rig
        .store
        .create_task(
            TaskBuilder::titled("done").summary(valid_summary()).build(),
            "completed".into(),
        )
        .await
        .unwrap();

    let back = check(
        &rig,
        ContainerType::Task,
        Some(task.id),
        "completed",
        "in-progress",
    )
    .await;
    assert!(!back.is_allowed());

    // on-hold is configured as an emergency transition.
    let emergency = check(
        &rig,
        ContainerType::Task,
        Some(task.id),
        "completed",
        "on-hold",
    )
    .await;
    assert!(emergency.is_allowed());
}

/// Unknown statuses fail the structural gate with suggestions.
#[tokio::test]
async fn unknown_status_fails_structurally() {
    let rig = TestRig::new();
    let result = check(&rig, ContainerType::Task, None, "pending", "warp-speed").await;
    match result {
        TransitionCheck::Invalid { reason, suggestions } => {
            assert!(reason.contains("warp-speed"));
            assert!(suggestions.iter().any(|s| s.contains("in-progress")));
        }
        other => panic!("expected Invalid, got {other:?}"),
    }
}

/// Backward movement is rejected unless the flow opts in.
#[tokio::test]
async fn backward_movement_is_manual_opt_in() {
    let rig = TestRig::new();
    let result = check(&rig, ContainerType::Task, None, "in-progress", "pending").await;
    match result {
        TransitionCheck::Invalid { reason, .. } => assert!(reason.contains("backward")),
        other => panic!("expected Invalid, got {other:?}"),
    }
}

/// Every recorded role transition crosses a role boundary.
#[tokio::test]
async fn role_transitions_always_cross_roles() {
    let rig = TestRig::new();
    let feature = rig
        .store
        .create_feature(FeatureBuilder::named("f").build(), "planning".into())
        .await
        .unwrap();
    let task = rig
        .store
        .create_task(
            TaskBuilder::titled("t")
                .feature(feature.id)
                .summary(summary_of_len(400))
                .build(),
            "pending".into(),
        )
        .await
        .unwrap();

    // Drive the whole lifecycle through the cascade engine's audit path.
    rig.store
        .set_status(ContainerType::Task, task.id, "in-progress".into())
        .await
        .unwrap();
    rig.cascade.apply(ContainerType::Task, task.id).await.unwrap();
    rig.store
        .set_status(ContainerType::Task, task.id, "completed".into())
        .await
        .unwrap();
    rig.cascade.apply(ContainerType::Task, task.id).await.unwrap();

    let transitions = rig.store.all_transitions();
    assert!(!transitions.is_empty());
    for transition in transitions {
        assert_ne!(
            transition.from_role, transition.to_role,
            "transition {transition:?} does not cross a role boundary"
        );
    }
}

/// A feature cannot leave planning with no tasks at all.
#[tokio::test]
async fn feature_needs_children_to_leave_planning() {
    let rig = TestRig::new();
    let feature = rig
        .store
        .create_feature(FeatureBuilder::named("empty").build(), "planning".into())
        .await
        .unwrap();

    let result = check(
        &rig,
        ContainerType::Feature,
        Some(feature.id),
        "planning",
        "in-development",
    )
    .await;
    assert!(!result.is_allowed());
}

/// A project cannot reach terminal while a feature is open.
#[tokio::test]
async fn project_terminal_requires_features_closed() {
    let rig = TestRig::new();
    let project = rig
        .store
        .create_project(ProjectBuilder::named("p").build(), "in-development".into())
        .await
        .unwrap();
    rig.store
        .create_feature(
            FeatureBuilder::named("wip").project(project.id).build(),
            "in-development".into(),
        )
        .await
        .unwrap();

    let result = check(
        &rig,
        ContainerType::Project,
        Some(project.id),
        "in-development",
        "completed",
    )
    .await;
    assert!(!result.is_allowed());
}

/// Untouched scaffolding neither blocks completion nor survives it;
/// authored open tasks do block it.
#[tokio::test]
async fn completion_cleanup_spares_authored_tasks() {
    let rig = TestRig::new();
    let feature = rig
        .store
        .create_feature(FeatureBuilder::named("f").build(), "validating".into())
        .await
        .unwrap();
    rig.store
        .create_task(
            TaskBuilder::titled("done")
                .feature(feature.id)
                .summary(valid_summary())
                .build(),
            "completed".into(),
        )
        .await
        .unwrap();
    let scaffold = rig
        .store
        .create_task(
            TaskBuilder::titled("scaffold").feature(feature.id).build(),
            "pending".into(),
        )
        .await
        .unwrap();
    let authored = rig
        .store
        .create_task(
            TaskBuilder::titled("authored").feature(feature.id).build(),
            "pending".into(),
        )
        .await
        .unwrap();
    rig.store.set_section_count(authored.id, 2);

    // The authored open task holds the feature open.
    let blocked = check(
        &rig,
        ContainerType::Feature,
        Some(feature.id),
        "validating",
        "completed",
    )
    .await;
    assert!(!blocked.is_allowed());

    // Once the authored task is closed, only untouched scaffolding remains
    // and completion goes through.
    rig.store
        .set_status(ContainerType::Task, authored.id, "cancelled".into())
        .await
        .unwrap();
    let allowed = check(
        &rig,
        ContainerType::Feature,
        Some(feature.id),
        "validating",
        "completed",
    )
    .await;
    assert!(allowed.is_allowed());

    rig.store
        .set_status(ContainerType::Feature, feature.id, "completed".into())
        .await
        .unwrap();
    let outcome = rig
        .cascade
        .apply(ContainerType::Feature, feature.id)
        .await
        .unwrap();

    let cleanup = outcome.cleanup.expect("cleanup report expected");
    assert_eq!(cleanup.removed_task_ids, vec![scaffold.id]);
    // The cancelled authored task is terminal and untouched by cleanup.
    assert!(cleanup.retained.is_empty());
    assert!(rig.store.get_task(scaffold.id).await.unwrap().is_none());
    assert!(rig.store.get_task(authored.id).await.unwrap().is_some());
}
