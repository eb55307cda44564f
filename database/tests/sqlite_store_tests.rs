//! SQLite store integration tests over a temporary database file.

use database::SqliteEntityStore;
use orchestrator_core::{
    models::{
        ContainerType, DependencyType, NewDependency, NewFeature, NewProject, NewTask, Priority,
        TaskQuery, UpdateTask, WorkTreeEdge, WorkTreeFeature, WorkTreeSpec,
    },
    repository::{EdgeDirection, EntityStore},
};

async fn store() -> (tempfile::TempDir, SqliteEntityStore) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("orchestrator.sqlite");
    let store = SqliteEntityStore::new(&format!("sqlite://{}", path.display()))
        .await
        .unwrap();
    store.migrate().await.unwrap();
    (dir, store)
}

fn new_project(name: &str) -> NewProject {
    NewProject {
        name: name.to_string(),
        summary: String::new(),
        status: None,
        tags: vec![],
    }
}

fn new_feature(name: &str, project_id: Option<uuid::Uuid>) -> NewFeature {
    NewFeature {
        project_id,
        name: name.to_string(),
        summary: String::new(),
        description: String::new(),
        status: None,
        priority: Priority::Medium,
        tags: vec!["backend".to_string()],
        requires_verification: false,
    }
}

#[tokio::test]
async fn entity_round_trip() {
    let (_dir, store) = store().await;

    let project = store
        .create_project(new_project("p"), "planning".into())
        .await
        .unwrap();
    let feature = store
        .create_feature(new_feature("f", Some(project.id)), "planning".into())
        .await
        .unwrap();
    let task = store
        .create_task(NewTask::titled(Some(feature.id), "t"), "pending".into())
        .await
        .unwrap();

    let fetched = store.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(fetched.title, "t");
    assert_eq!(fetched.feature_id, Some(feature.id));
    assert_eq!(fetched.priority, Priority::Medium);

    let fetched = store.get_feature(feature.id).await.unwrap().unwrap();
    assert_eq!(fetched.tags, vec!["backend"]);
    assert!(!fetched.requires_verification);

    store
        .set_status(ContainerType::Task, task.id, "in-progress".into())
        .await
        .unwrap();
    let fetched = store.get_task(task.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, "in-progress");
    assert!(fetched.modified_at >= fetched.created_at);
}

#[tokio::test]
async fn set_status_on_missing_entity_is_not_found() {
    let (_dir, store) = store().await;
    let err = store
        .set_status(ContainerType::Task, uuid::Uuid::new_v4(), "pending".into())
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn duplicate_edge_hits_unique_constraint() {
    let (_dir, store) = store().await;
    let a = store
        .create_task(NewTask::titled(None, "a"), "pending".into())
        .await
        .unwrap();
    let b = store
        .create_task(NewTask::titled(None, "b"), "pending".into())
        .await
        .unwrap();

    let dep = NewDependency {
        from_task: a.id,
        to_task: b.id,
        dep_type: DependencyType::Blocks,
        unblock_at: None,
    };
    store.create_dependency(dep.clone()).await.unwrap();
    let err = store.create_dependency(dep).await.unwrap_err();
    assert_eq!(err.error_code(), "DUPLICATE_DEPENDENCY");
}

#[tokio::test]
async fn blocking_edge_queries_normalize_direction() {
    let (_dir, store) = store().await;
    let a = store
        .create_task(NewTask::titled(None, "a"), "pending".into())
        .await
        .unwrap();
    let b = store
        .create_task(NewTask::titled(None, "b"), "pending".into())
        .await
        .unwrap();

    // a BLOCKS b, plus an informational edge that must never show up.
    store
        .create_dependency(NewDependency {
            from_task: a.id,
            to_task: b.id,
            dep_type: DependencyType::Blocks,
            unblock_at: None,
        })
        .await
        .unwrap();
    store
        .create_dependency(NewDependency {
            from_task: b.id,
            to_task: a.id,
            dep_type: DependencyType::RelatesTo,
            unblock_at: None,
        })
        .await
        .unwrap();

    let incoming = store
        .find_blocking_edges(b.id, EdgeDirection::Incoming)
        .await
        .unwrap();
    assert_eq!(incoming.len(), 1);
    assert_eq!(incoming[0].blocking_pair(), Some((a.id, b.id)));

    let outgoing = store
        .find_blocking_edges(a.id, EdgeDirection::Outgoing)
        .await
        .unwrap();
    assert_eq!(outgoing.len(), 1);

    let all = store.dependencies_for(a.id, EdgeDirection::Both).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn delete_feature_cascades_to_tasks_and_edges() {
    let (_dir, store) = store().await;
    let feature = store
        .create_feature(new_feature("f", None), "planning".into())
        .await
        .unwrap();
    let a = store
        .create_task(NewTask::titled(Some(feature.id), "a"), "pending".into())
        .await
        .unwrap();
    let b = store
        .create_task(NewTask::titled(Some(feature.id), "b"), "pending".into())
        .await
        .unwrap();
    store
        .create_dependency(NewDependency {
            from_task: a.id,
            to_task: b.id,
            dep_type: DependencyType::Blocks,
            unblock_at: None,
        })
        .await
        .unwrap();

    store.delete_feature(feature.id).await.unwrap();

    assert!(store.get_task(a.id).await.unwrap().is_none());
    assert!(store.get_task(b.id).await.unwrap().is_none());
    let stats = store.get_stats().await.unwrap();
    assert_eq!(stats.total_tasks, 0);
    assert_eq!(stats.total_dependencies, 0);
}

#[tokio::test]
async fn work_tree_creates_whole_hierarchy() {
    let (_dir, store) = store().await;
    let spec = WorkTreeSpec {
        project: Some(new_project("tree")),
        features: vec![WorkTreeFeature {
            feature: new_feature("f1", None),
            tasks: vec![
                NewTask::titled(None, "t1"),
                NewTask::titled(None, "t2"),
            ],
            dependencies: vec![WorkTreeEdge {
                from_index: 0,
                to_index: 1,
                dep_type: DependencyType::Blocks,
                unblock_at: None,
            }],
        }],
    };

    let created = store
        .create_work_tree(
            spec,
            "planning".into(),
            vec!["planning".into()],
            vec!["pending".into(), "pending".into()],
        )
        .await
        .unwrap();

    assert!(created.project_id.is_some());
    assert_eq!(created.feature_ids.len(), 1);
    assert_eq!(created.task_ids.len(), 2);
    assert_eq!(created.dependency_ids.len(), 1);

    // The feature was re-parented under the new project.
    let feature = store
        .get_feature(created.feature_ids[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(feature.project_id, created.project_id);

    let tasks = store
        .list_tasks(TaskQuery {
            project_id: created.project_id,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(tasks.len(), 2);
}

#[tokio::test]
async fn update_task_round_trips_optional_fields() {
    let (_dir, store) = store().await;
    let task = store
        .create_task(NewTask::titled(None, "t"), "pending".into())
        .await
        .unwrap();

    let updated = store
        .update_task(
            task.id,
            UpdateTask {
                summary: Some("did the thing".into()),
                complexity: Some(Some(7)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.summary, "did the thing");
    assert_eq!(updated.complexity, Some(7));

    let cleared = store
        .update_task(
            task.id,
            UpdateTask {
                complexity: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.complexity, None);
    assert_eq!(cleared.summary, "did the thing");
}
