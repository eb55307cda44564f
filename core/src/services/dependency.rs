//! Dependency graph services: edge creation with cycle rejection, blocked-set
//! queries, and unblock detection after completions.

use std::collections::HashSet;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::{
    error::{OrchestratorError, Result},
    models::{
        ContainerType, Dependency, DependencyType, NewDependency, Priority, StatusRole, Task,
        UnblockThreshold, WorkScope,
    },
    repository::{EdgeDirection, EntityStore},
    workflow::{flows::FlowResolver, loader::WorkflowConfigLoader},
};

/// One blocking edge seen from the blocked task's side.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BlockerInfo {
    pub task_id: Uuid,
    pub title: String,
    pub status: String,
    pub priority: Priority,
    pub threshold: UnblockThreshold,
    pub satisfied: bool,
}

/// A task with at least one unsatisfied blocking edge.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct BlockedTask {
    pub id: Uuid,
    pub title: String,
    pub status: String,
    pub priority: Priority,
    pub blockers: Vec<BlockerInfo>,
}

/// Edge plus (optionally) the task at the far end, for the list query.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DependencyRecord {
    #[serde(flatten)]
    pub dependency: Dependency,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub other_task: Option<TaskBrief>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TaskBrief {
    pub id: Uuid,
    pub title: String,
    pub status: String,
    pub priority: Priority,
}

impl TaskBrief {
    pub fn of(task: &Task) -> Self {
        Self {
            id: task.id,
            title: task.title.clone(),
            status: task.status.clone(),
            priority: task.priority,
        }
    }
}

/// Dependency graph operations: edges, blocked sets, unblock detection.
pub struct DependencyService<S> {
    store: Arc<S>,
    loader: Arc<WorkflowConfigLoader>,
}

impl<S: EntityStore> DependencyService<S> {
    pub fn new(store: Arc<S>, loader: Arc<WorkflowConfigLoader>) -> Self {
        Self { store, loader }
    }

    /// Create an edge. Blocking edges are cycle-checked before the insert;
    /// `RELATES_TO` edges only need distinct endpoints that exist.
    pub async fn create(&self, dep: NewDependency) -> Result<Dependency> {
        if dep.from_task == dep.to_task {
            return Err(OrchestratorError::validation(
                "a task cannot depend on itself",
            ));
        }
        for id in [dep.from_task, dep.to_task] {
            if self.store.get_task(id).await?.is_none() {
                return Err(OrchestratorError::not_found(ContainerType::Task, id));
            }
        }

        if dep.dep_type.is_blocking() {
            let (blocker, blocked) = match dep.dep_type {
                DependencyType::Blocks => (dep.from_task, dep.to_task),
                DependencyType::IsBlockedBy => (dep.to_task, dep.from_task),
                DependencyType::RelatesTo => unreachable!(),
            };
            if let Some(mut path) = self.find_path(blocked, blocker).await? {
                // Close the loop for the error message.
                path.push(blocked);
                return Err(OrchestratorError::CycleDetected { path });
            }
        }

        self.store.create_dependency(dep).await
    }

    pub async fn delete(&self, id: Uuid) -> Result<()> {
        if self.store.get_dependency(id).await?.is_none() {
            return Err(OrchestratorError::NotFound(
                ContainerType::Task,
                format!("dependency {id}"),
            ));
        }
        self.store.delete_dependency(id).await
    }

    /// Edges touching a task, optionally embedding the far endpoint.
    pub async fn list(
        &self,
        task_id: Uuid,
        direction: EdgeDirection,
        include_task_info: bool,
    ) -> Result<Vec<DependencyRecord>> {
        if self.store.get_task(task_id).await?.is_none() {
            return Err(OrchestratorError::not_found(ContainerType::Task, task_id));
        }
        let edges = self.store.dependencies_for(task_id, direction).await?;
        let mut records = Vec::with_capacity(edges.len());
        for edge in edges {
            let other = if edge.from_task == task_id {
                edge.to_task
            } else {
                edge.from_task
            };
            let other_task = if include_task_info {
                self.store.get_task(other).await?.as_ref().map(TaskBrief::of)
            } else {
                None
            };
            records.push(DependencyRecord {
                dependency: edge,
                other_task,
            });
        }
        Ok(records)
    }

    /// Non-terminal tasks in scope that have at least one unsatisfied
    /// blocking edge, with their blocker lists.
    pub async fn blocked_tasks(&self, scope: WorkScope) -> Result<Vec<BlockedTask>> {
        let config = self.loader.load();
        let resolver = FlowResolver::new(&config);

        let candidates = self.tasks_in_scope(scope).await?;
        let mut blocked = Vec::new();
        for task in candidates {
            let role = resolver.role(ContainerType::Task, &task.tags, &task.status);
            if role == StatusRole::Terminal {
                continue;
            }
            let blockers = self.blockers_of(&resolver, task.id).await?;
            if blockers.iter().any(|b| !b.satisfied) {
                blocked.push(BlockedTask {
                    id: task.id,
                    title: task.title,
                    status: task.status,
                    priority: task.priority,
                    blockers,
                });
            }
        }
        Ok(blocked)
    }

    /// Whether a single task currently has an unsatisfied blocking edge.
    pub async fn is_blocked(&self, task_id: Uuid) -> Result<bool> {
        let config = self.loader.load();
        let resolver = FlowResolver::new(&config);
        let blockers = self.blockers_of(&resolver, task_id).await?;
        Ok(blockers.iter().any(|b| !b.satisfied))
    }

    /// Downstream tasks fully released by `completed_task` having reached a
    /// terminal role: every blocking edge of theirs is now satisfied and they
    /// are themselves still open.
    pub async fn newly_unblocked(&self, completed_task: Uuid) -> Result<Vec<TaskBrief>> {
        let config = self.loader.load();
        let resolver = FlowResolver::new(&config);

        let edges = self
            .store
            .find_blocking_edges(completed_task, EdgeDirection::Both)
            .await?;
        let mut downstream: Vec<Uuid> = Vec::new();
        for edge in &edges {
            if let Some((blocker, blocked)) = edge.blocking_pair() {
                if blocker == completed_task && !downstream.contains(&blocked) {
                    downstream.push(blocked);
                }
            }
        }

        let mut released = Vec::new();
        for id in downstream {
            let Some(task) = self.store.get_task(id).await? else {
                continue;
            };
            let role = resolver.role(ContainerType::Task, &task.tags, &task.status);
            if role == StatusRole::Terminal {
                continue;
            }
            let blockers = self.blockers_of(&resolver, id).await?;
            if blockers.iter().all(|b| b.satisfied) {
                released.push(TaskBrief::of(&task));
            }
        }
        Ok(released)
    }

    /// All blocking edges pointed at `task_id`, resolved against current
    /// blocker statuses. `RELATES_TO` edges never appear here.
    pub(crate) async fn blockers_of(
        &self,
        resolver: &FlowResolver<'_>,
        task_id: Uuid,
    ) -> Result<Vec<BlockerInfo>> {
        let edges = self
            .store
            .find_blocking_edges(task_id, EdgeDirection::Incoming)
            .await?;
        let mut blockers = Vec::with_capacity(edges.len());
        for edge in edges {
            let Some((blocker_id, _)) = edge.blocking_pair() else {
                continue;
            };
            let Some(blocker) = self.store.get_task(blocker_id).await? else {
                continue;
            };
            let role = resolver.role(ContainerType::Task, &blocker.tags, &blocker.status);
            blockers.push(BlockerInfo {
                task_id: blocker_id,
                title: blocker.title,
                status: blocker.status,
                priority: blocker.priority,
                threshold: edge.threshold(),
                satisfied: edge.threshold().satisfied_by(role),
            });
        }
        Ok(blockers)
    }

    pub(crate) async fn tasks_in_scope(&self, scope: WorkScope) -> Result<Vec<Task>> {
        let query = crate::models::TaskQuery {
            feature_id: scope.feature_id,
            project_id: if scope.feature_id.is_some() {
                None
            } else {
                scope.project_id
            },
            ..Default::default()
        };
        self.store.list_tasks(query).await
    }

    /// DFS in the "this blocks that" direction. Returns the path from
    /// `start` to `goal` when one exists.
    async fn find_path(&self, start: Uuid, goal: Uuid) -> Result<Option<Vec<Uuid>>> {
        if start == goal {
            return Ok(Some(vec![start]));
        }
        let mut visited: HashSet<Uuid> = HashSet::new();
        let mut stack: Vec<(Uuid, Vec<Uuid>)> = vec![(start, vec![start])];

        while let Some((node, path)) = stack.pop() {
            if !visited.insert(node) {
                continue;
            }
            let edges = self
                .store
                .find_blocking_edges(node, EdgeDirection::Both)
                .await?;
            for edge in edges {
                let Some((blocker, blocked)) = edge.blocking_pair() else {
                    continue;
                };
                if blocker != node {
                    continue;
                }
                if blocked == goal {
                    let mut path = path.clone();
                    path.push(blocked);
                    return Ok(Some(path));
                }
                if !visited.contains(&blocked) {
                    let mut next_path = path.clone();
                    next_path.push(blocked);
                    stack.push((blocked, next_path));
                }
            }
        }
        Ok(None)
    }
}

/// Cycle check over a not-yet-persisted edge set, for bulk creation.
/// Edges are `(blocker, blocked)` pairs; returns the cycle path if the set
/// is cyclic on its own.
pub fn detect_cycle_in(edges: &[(Uuid, Uuid)]) -> Option<Vec<Uuid>> {
    // Iterative coloring DFS over the in-memory adjacency.
    let mut adjacency: std::collections::HashMap<Uuid, Vec<Uuid>> = Default::default();
    let mut nodes: HashSet<Uuid> = HashSet::new();
    for (blocker, blocked) in edges {
        adjacency.entry(*blocker).or_default().push(*blocked);
        nodes.insert(*blocker);
        nodes.insert(*blocked);
    }

    let mut done: HashSet<Uuid> = HashSet::new();
    for &root in &nodes {
        if done.contains(&root) {
            continue;
        }
        let mut on_path: Vec<Uuid> = Vec::new();
        let mut on_path_set: HashSet<Uuid> = HashSet::new();
        // (node, next child index)
        let mut stack: Vec<(Uuid, usize)> = vec![(root, 0)];
        while let Some((node, child_idx)) = stack.pop() {
            if child_idx == 0 {
                on_path.push(node);
                on_path_set.insert(node);
            }
            let children = adjacency.get(&node).map(|v| v.as_slice()).unwrap_or(&[]);
            if child_idx < children.len() {
                let child = children[child_idx];
                stack.push((node, child_idx + 1));
                if on_path_set.contains(&child) {
                    let cycle_start = on_path.iter().position(|n| *n == child).unwrap_or(0);
                    let mut cycle: Vec<Uuid> = on_path[cycle_start..].to_vec();
                    cycle.push(child);
                    return Some(cycle);
                }
                if !done.contains(&child) {
                    stack.push((child, 0));
                }
            } else {
                on_path.pop();
                on_path_set.remove(&node);
                done.insert(node);
            }
        }
    }
    None
}
