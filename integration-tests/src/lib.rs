//! Shared helpers for the end-to-end scenario tests.

use std::sync::Arc;

use mocks::MockEntityStore;
use orchestrator_core::{
    services::{dependency::DependencyService, recommend::NextTaskService},
    workflow::{
        cascade::CascadeEngine, loader::WorkflowConfigLoader, progression::ProgressionService,
        validation::TransitionValidator,
    },
};

/// Everything a scenario needs, wired over one mock store.
pub struct TestRig {
    pub store: Arc<MockEntityStore>,
    pub loader: Arc<WorkflowConfigLoader>,
    pub validator: TransitionValidator<MockEntityStore>,
    pub progression: ProgressionService<MockEntityStore>,
    pub cascade: CascadeEngine<MockEntityStore>,
    pub deps: DependencyService<MockEntityStore>,
    pub next: NextTaskService<MockEntityStore>,
}

impl TestRig {
    /// Rig over the bundled default workflow configuration.
    pub fn new() -> Self {
        Self::with_loader(Arc::new(WorkflowConfigLoader::new(None)))
    }

    /// Rig over a caller-supplied loader (custom workflow documents).
    pub fn with_loader(loader: Arc<WorkflowConfigLoader>) -> Self {
        let store = Arc::new(MockEntityStore::new());
        Self {
            validator: TransitionValidator::new(store.clone(), loader.clone()),
            progression: ProgressionService::new(store.clone(), loader.clone()),
            cascade: CascadeEngine::new(store.clone(), loader.clone()),
            deps: DependencyService::new(store.clone(), loader.clone()),
            next: NextTaskService::new(store.clone(), loader.clone()),
            store,
            loader,
        }
    }
}

impl Default for TestRig {
    fn default() -> Self {
        Self::new()
    }
}
