//! Builders for creation DTOs, keeping scenario tests terse.

use orchestrator_core::models::{
    DependencyType, NewDependency, NewFeature, NewProject, NewTask, Priority, UnblockThreshold,
};
use uuid::Uuid;

/// Builder for NewProject with sensible defaults.
pub struct ProjectBuilder {
    project: NewProject,
}

impl ProjectBuilder {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            project: NewProject {
                name: name.into(),
                summary: String::new(),
                status: None,
                tags: vec![],
            },
        }
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.project.summary = summary.into();
        self
    }

    pub fn status(mut self, status: impl Into<String>) -> Self {
        self.project.status = Some(status.into());
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.project.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn build(self) -> NewProject {
        self.project
    }
}

/// Builder for NewFeature with sensible defaults.
pub struct FeatureBuilder {
    feature: NewFeature,
}

impl FeatureBuilder {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            feature: NewFeature {
                project_id: None,
                name: name.into(),
                summary: String::new(),
                description: String::new(),
                status: None,
                priority: Priority::Medium,
                tags: vec![],
                requires_verification: false,
            },
        }
    }

    pub fn project(mut self, project_id: Uuid) -> Self {
        self.feature.project_id = Some(project_id);
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.feature.priority = priority;
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.feature.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn requires_verification(mut self) -> Self {
        self.feature.requires_verification = true;
        self
    }

    pub fn build(self) -> NewFeature {
        self.feature
    }
}

/// Builder for NewTask with sensible defaults.
pub struct TaskBuilder {
    task: NewTask,
}

impl TaskBuilder {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            task: NewTask::titled(None, title),
        }
    }

    pub fn feature(mut self, feature_id: Uuid) -> Self {
        self.task.feature_id = Some(feature_id);
        self
    }

    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.task.summary = summary.into();
        self
    }

    pub fn priority(mut self, priority: Priority) -> Self {
        self.task.priority = priority;
        self
    }

    pub fn complexity(mut self, complexity: u8) -> Self {
        self.task.complexity = Some(complexity);
        self
    }

    pub fn tags(mut self, tags: &[&str]) -> Self {
        self.task.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    pub fn build(self) -> NewTask {
        self.task
    }
}

/// Shorthand for a blocking edge with the default threshold.
pub fn blocks(from: Uuid, to: Uuid) -> NewDependency {
    NewDependency {
        from_task: from,
        to_task: to,
        dep_type: DependencyType::Blocks,
        unblock_at: None,
    }
}

/// Blocking edge with an explicit unblock threshold.
pub fn blocks_at(from: Uuid, to: Uuid, threshold: UnblockThreshold) -> NewDependency {
    NewDependency {
        from_task: from,
        to_task: to,
        dep_type: DependencyType::Blocks,
        unblock_at: Some(threshold),
    }
}

/// Informational edge; never participates in blocking.
pub fn relates(from: Uuid, to: Uuid) -> NewDependency {
    NewDependency {
        from_task: from,
        to_task: to,
        dep_type: DependencyType::RelatesTo,
        unblock_at: None,
    }
}

/// A summary long enough to pass the completion gate (400 characters).
pub fn valid_summary() -> String {
    "x".repeat(400)
}

/// A summary of an exact character count, for boundary tests.
pub fn summary_of_len(len: usize) -> String {
    "x".repeat(len)
}
