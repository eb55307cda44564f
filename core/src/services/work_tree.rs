//! Bulk work-tree creation: one atomic write of a project, its features,
//! their tasks, and the dependencies between them.

use std::sync::Arc;

use uuid::Uuid;

use crate::{
    error::{OrchestratorError, Result},
    models::{ContainerType, WorkTreeCreated, WorkTreeSpec},
    repository::EntityStore,
    services::dependency::detect_cycle_in,
    workflow::{flows::FlowResolver, loader::WorkflowConfigLoader},
};

/// Creates whole work trees in one store transaction.
///
/// The cycle check runs over the in-memory payload before any insert; a
/// cyclic payload rejects the whole tree and nothing persists.
pub struct WorkTreeService<S> {
    store: Arc<S>,
    loader: Arc<WorkflowConfigLoader>,
}

impl<S> WorkTreeService<S> {
    pub fn new(store: Arc<S>, loader: Arc<WorkflowConfigLoader>) -> Self {
        Self { store, loader }
    }
}

impl<S: EntityStore> WorkTreeService<S> {
    pub async fn create(&self, spec: WorkTreeSpec) -> Result<WorkTreeCreated> {
        self.validate(&spec)?;

        let config = self.loader.load();
        let resolver = FlowResolver::new(&config);

        let project_status = spec
            .project
            .as_ref()
            .map(|p| {
                p.status
                    .clone()
                    .unwrap_or_else(|| resolver.initial_status(ContainerType::Project, &p.tags))
            })
            .unwrap_or_default();

        let mut feature_statuses = Vec::with_capacity(spec.features.len());
        let mut task_statuses = Vec::new();
        for entry in &spec.features {
            feature_statuses.push(entry.feature.status.clone().unwrap_or_else(|| {
                resolver.initial_status(ContainerType::Feature, &entry.feature.tags)
            }));
            for task in &entry.tasks {
                task_statuses.push(
                    task.status
                        .clone()
                        .unwrap_or_else(|| resolver.initial_status(ContainerType::Task, &task.tags)),
                );
            }
        }

        self.store
            .create_work_tree(spec, project_status, feature_statuses, task_statuses)
            .await
    }
}

impl<S> WorkTreeService<S> {
    /// Structural validation and the pre-insert cycle check.
    fn validate(&self, spec: &WorkTreeSpec) -> Result<()> {
        if spec.project.is_none() && spec.features.is_empty() {
            return Err(OrchestratorError::validation(
                "work tree must contain a project or at least one feature",
            ));
        }

        // Placeholder ids per task index; edges reference tasks by position.
        for (feature_idx, entry) in spec.features.iter().enumerate() {
            if entry.feature.name.trim().is_empty() {
                return Err(OrchestratorError::empty_field("feature.name"));
            }
            for task in &entry.tasks {
                if task.title.trim().is_empty() {
                    return Err(OrchestratorError::empty_field("task.title"));
                }
            }

            let placeholders: Vec<Uuid> =
                entry.tasks.iter().map(|_| Uuid::new_v4()).collect();
            let mut edges = Vec::with_capacity(entry.dependencies.len());
            for edge in &entry.dependencies {
                let from = placeholders.get(edge.from_index).copied().ok_or_else(|| {
                    OrchestratorError::validation(format!(
                        "feature {feature_idx}: dependency from_index {} out of range",
                        edge.from_index
                    ))
                })?;
                let to = placeholders.get(edge.to_index).copied().ok_or_else(|| {
                    OrchestratorError::validation(format!(
                        "feature {feature_idx}: dependency to_index {} out of range",
                        edge.to_index
                    ))
                })?;
                if from == to {
                    return Err(OrchestratorError::validation(
                        "a task cannot depend on itself",
                    ));
                }
                match edge.dep_type {
                    crate::models::DependencyType::Blocks => edges.push((from, to)),
                    crate::models::DependencyType::IsBlockedBy => edges.push((to, from)),
                    crate::models::DependencyType::RelatesTo => {}
                }
            }
            if let Some(path) = detect_cycle_in(&edges) {
                return Err(OrchestratorError::CycleDetected { path });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DependencyType, NewFeature, NewTask, WorkTreeEdge, WorkTreeFeature};

    fn feature_entry(task_count: usize, deps: Vec<WorkTreeEdge>) -> WorkTreeFeature {
        WorkTreeFeature {
            feature: NewFeature {
                project_id: None,
                name: "feature".into(),
                summary: String::new(),
                description: String::new(),
                status: None,
                priority: Default::default(),
                tags: vec![],
                requires_verification: false,
            },
            tasks: (0..task_count)
                .map(|i| NewTask::titled(None, format!("task {i}")))
                .collect(),
            dependencies: deps,
        }
    }

    fn edge(from: usize, to: usize) -> WorkTreeEdge {
        WorkTreeEdge {
            from_index: from,
            to_index: to,
            dep_type: DependencyType::Blocks,
            unblock_at: None,
        }
    }

    #[test]
    fn cyclic_spec_is_rejected_before_any_write() {
        let spec = WorkTreeSpec {
            project: None,
            features: vec![feature_entry(3, vec![edge(0, 1), edge(1, 2), edge(2, 0)])],
        };
        let service = WorkTreeService {
            store: Arc::new(()),
            loader: Arc::new(crate::workflow::loader::WorkflowConfigLoader::new(None)),
        };
        let err = service.validate(&spec).unwrap_err();
        assert_eq!(err.error_code(), "CYCLE_DETECTED");
    }

    #[test]
    fn linear_chain_passes_validation() {
        let spec = WorkTreeSpec {
            project: None,
            features: vec![feature_entry(4, vec![edge(0, 1), edge(1, 2), edge(2, 3)])],
        };
        let service = WorkTreeService {
            store: Arc::new(()),
            loader: Arc::new(crate::workflow::loader::WorkflowConfigLoader::new(None)),
        };
        assert!(service.validate(&spec).is_ok());
    }

    #[test]
    fn out_of_range_edge_is_a_validation_error() {
        let spec = WorkTreeSpec {
            project: None,
            features: vec![feature_entry(2, vec![edge(0, 5)])],
        };
        let service = WorkTreeService {
            store: Arc::new(()),
            loader: Arc::new(crate::workflow::loader::WorkflowConfigLoader::new(None)),
        };
        assert_eq!(
            service.validate(&spec).unwrap_err().error_code(),
            "VALIDATION_ERROR"
        );
    }
}
