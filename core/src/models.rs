use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Container types managed by the orchestration engine.
///
/// Projects own features, features own tasks. Each container type has its
/// own set of workflow flows in the configuration document.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ContainerType {
    Project,
    Feature,
    Task,
}

impl ContainerType {
    /// Configuration key for this container type (`tasks`, `features`, `projects`).
    pub fn config_key(&self) -> &'static str {
        match self {
            ContainerType::Project => "projects",
            ContainerType::Feature => "features",
            ContainerType::Task => "tasks",
        }
    }
}

impl std::fmt::Display for ContainerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ContainerType::Project => write!(f, "project"),
            ContainerType::Feature => write!(f, "feature"),
            ContainerType::Task => write!(f, "task"),
        }
    }
}

/// Coarse-grained bucket a status maps to.
///
/// All cascade triggers and unblock thresholds compare roles, never raw
/// status strings. Ordering is `Queue < Work < Review < Terminal`; `Blocked`
/// is orthogonal to the progression axis and never satisfies a threshold.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StatusRole {
    /// Pre-work: backlog, planning, pending.
    Queue,
    /// Active effort: in-progress, in-development.
    Work,
    /// Under inspection: testing, validating, pending-review.
    Review,
    /// Temporarily held; outside the progression ordering.
    Blocked,
    /// Completed, cancelled, archived. Only emergency transitions leave it.
    Terminal,
}

impl StatusRole {
    /// Position on the progression axis, `None` for the orthogonal `Blocked`.
    pub fn rank(&self) -> Option<u8> {
        match self {
            StatusRole::Queue => Some(0),
            StatusRole::Work => Some(1),
            StatusRole::Review => Some(2),
            StatusRole::Blocked => None,
            StatusRole::Terminal => Some(3),
        }
    }

    /// True when this role is at or beyond `other` on the progression axis.
    ///
    /// A `Blocked` role on either side never satisfies the comparison.
    pub fn at_least(&self, other: StatusRole) -> bool {
        match (self.rank(), other.rank()) {
            (Some(a), Some(b)) => a >= b,
            _ => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StatusRole::Terminal)
    }
}

impl std::fmt::Display for StatusRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatusRole::Queue => write!(f, "queue"),
            StatusRole::Work => write!(f, "work"),
            StatusRole::Review => write!(f, "review"),
            StatusRole::Blocked => write!(f, "blocked"),
            StatusRole::Terminal => write!(f, "terminal"),
        }
    }
}

/// Task and feature priority.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Sort rank used by the recommender: HIGH=0, MEDIUM=1, LOW=2.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }

    pub fn parse(s: &str) -> Option<Priority> {
        match s.to_ascii_uppercase().as_str() {
            "HIGH" => Some(Priority::High),
            "MEDIUM" => Some(Priority::Medium),
            "LOW" => Some(Priority::Low),
            _ => None,
        }
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Priority::High => write!(f, "HIGH"),
            Priority::Medium => write!(f, "MEDIUM"),
            Priority::Low => write!(f, "LOW"),
        }
    }
}

/// Top-level container grouping related features.
///
/// Status strings come from the project flows in the workflow configuration;
/// the engine never interprets them directly, only through the flow resolver.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Project {
    pub id: Uuid,
    pub name: String,
    pub summary: String,
    /// Current status; must appear in some project flow.
    pub status: String,
    /// Tags drive flow selection via the configured flow mappings.
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Mid-level container, optionally parented by a project.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Feature {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub name: String,
    pub summary: String,
    pub description: String,
    pub status: String,
    pub priority: Priority,
    pub tags: Vec<String>,
    /// When set, automatic cascade may not move this feature into a terminal
    /// status; only an explicit user-triggered completion may.
    pub requires_verification: bool,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Leaf unit of work, optionally parented by a feature.
///
/// The summary is free text while the task is open; completing a task
/// through its flow requires a summary of 300-500 characters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub id: Uuid,
    pub feature_id: Option<Uuid>,
    pub title: String,
    pub summary: String,
    pub description: String,
    pub status: String,
    pub priority: Priority,
    /// Effort estimate 1-10; `None` when not yet sized.
    pub complexity: Option<u8>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub modified_at: DateTime<Utc>,
}

/// Kinds of directed edges between two tasks.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DependencyType {
    /// `from` blocks `to`: `to` cannot start until `from` reaches the
    /// edge's unblock threshold.
    #[default]
    Blocks,
    /// Inverse edge: `from` is blocked by `to`.
    IsBlockedBy,
    /// Informational only; ignored by every blocking computation.
    RelatesTo,
}

impl DependencyType {
    pub fn is_blocking(&self) -> bool {
        matches!(self, DependencyType::Blocks | DependencyType::IsBlockedBy)
    }

    pub fn parse(s: &str) -> Option<DependencyType> {
        match s.to_ascii_uppercase().as_str() {
            "BLOCKS" => Some(DependencyType::Blocks),
            "IS_BLOCKED_BY" => Some(DependencyType::IsBlockedBy),
            "RELATES_TO" => Some(DependencyType::RelatesTo),
            _ => None,
        }
    }
}

impl std::fmt::Display for DependencyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DependencyType::Blocks => write!(f, "BLOCKS"),
            DependencyType::IsBlockedBy => write!(f, "IS_BLOCKED_BY"),
            DependencyType::RelatesTo => write!(f, "RELATES_TO"),
        }
    }
}

/// Minimum role the blocker must reach before the blocked endpoint is
/// released. Absent on an edge it defaults to `Terminal`.
#[derive(Debug, Clone, Copy, Hash, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnblockThreshold {
    Queue,
    Work,
    Review,
    #[default]
    Terminal,
}

impl UnblockThreshold {
    fn rank(&self) -> u8 {
        match self {
            UnblockThreshold::Queue => 0,
            UnblockThreshold::Work => 1,
            UnblockThreshold::Review => 2,
            UnblockThreshold::Terminal => 3,
        }
    }

    /// Whether a blocker currently in `role` releases this edge.
    pub fn satisfied_by(&self, role: StatusRole) -> bool {
        match role.rank() {
            Some(r) => r >= self.rank(),
            None => false,
        }
    }

    pub fn parse(s: &str) -> Option<UnblockThreshold> {
        match s.to_ascii_lowercase().as_str() {
            "queue" => Some(UnblockThreshold::Queue),
            "work" => Some(UnblockThreshold::Work),
            "review" => Some(UnblockThreshold::Review),
            "terminal" => Some(UnblockThreshold::Terminal),
            _ => None,
        }
    }
}

impl std::fmt::Display for UnblockThreshold {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnblockThreshold::Queue => write!(f, "queue"),
            UnblockThreshold::Work => write!(f, "work"),
            UnblockThreshold::Review => write!(f, "review"),
            UnblockThreshold::Terminal => write!(f, "terminal"),
        }
    }
}

/// Directed edge between two tasks.
///
/// Each `(from_task, to_task, dep_type)` triple is unique. Blocking edges
/// must keep the task graph acyclic; `RelatesTo` edges are unconstrained.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dependency {
    pub id: Uuid,
    pub from_task: Uuid,
    pub to_task: Uuid,
    pub dep_type: DependencyType,
    /// `None` means the default threshold (`Terminal`).
    pub unblock_at: Option<UnblockThreshold>,
    pub created_at: DateTime<Utc>,
}

impl Dependency {
    /// Effective threshold, applying the `Terminal` default.
    pub fn threshold(&self) -> UnblockThreshold {
        self.unblock_at.unwrap_or_default()
    }

    /// Normalize a blocking edge into `(blocker, blocked)` endpoints.
    ///
    /// Returns `None` for `RelatesTo`.
    pub fn blocking_pair(&self) -> Option<(Uuid, Uuid)> {
        match self.dep_type {
            DependencyType::Blocks => Some((self.from_task, self.to_task)),
            DependencyType::IsBlockedBy => Some((self.to_task, self.from_task)),
            DependencyType::RelatesTo => None,
        }
    }
}

/// Append-only audit record of a status move that crossed a role boundary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleTransition {
    pub id: Uuid,
    pub entity_id: Uuid,
    pub entity_type: ContainerType,
    pub from_role: StatusRole,
    pub to_role: StatusRole,
    pub from_status: String,
    pub to_status: String,
    /// What initiated the move, e.g. `manual` or a cascade event name.
    pub trigger: String,
    pub summary: Option<String>,
    pub created_at: DateTime<Utc>,
}

// --- Creation and update DTOs -----------------------------------------------

/// Data for creating a project. Status defaults to the first status of the
/// active project flow when `None`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewProject {
    pub name: String,
    #[serde(default)]
    pub summary: String,
    pub status: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewFeature {
    pub project_id: Option<Uuid>,
    pub name: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub requires_verification: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewTask {
    pub feature_id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub description: String,
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    pub complexity: Option<u8>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewTask {
    /// Minimal task under a feature, everything else defaulted.
    pub fn titled(feature_id: Option<Uuid>, title: impl Into<String>) -> Self {
        Self {
            feature_id,
            title: title.into(),
            summary: String::new(),
            description: String::new(),
            status: None,
            priority: Priority::Medium,
            complexity: None,
            tags: vec![],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct NewDependency {
    pub from_task: Uuid,
    pub to_task: Uuid,
    #[serde(default)]
    pub dep_type: DependencyType,
    pub unblock_at: Option<UnblockThreshold>,
}

/// Field-level update for a project. Only `Some` fields are written; status
/// changes do NOT go through here, they go through the set-status path.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UpdateProject {
    pub name: Option<String>,
    pub summary: Option<String>,
    pub tags: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UpdateFeature {
    pub project_id: Option<Option<Uuid>>,
    pub name: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    pub requires_verification: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct UpdateTask {
    pub feature_id: Option<Option<Uuid>>,
    pub title: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub priority: Option<Priority>,
    pub complexity: Option<Option<u8>>,
    pub tags: Option<Vec<String>>,
}

// --- Query filters ----------------------------------------------------------

/// Filter criteria for querying tasks. Fields combine with AND logic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskQuery {
    pub feature_id: Option<Uuid>,
    pub project_id: Option<Uuid>,
    pub status: Option<String>,
    pub priority: Option<Priority>,
    pub tag: Option<String>,
    pub text: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeatureQuery {
    pub project_id: Option<Uuid>,
    pub status: Option<String>,
    pub priority: Option<Priority>,
    pub tag: Option<String>,
    pub text: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectQuery {
    pub status: Option<String>,
    pub tag: Option<String>,
    pub text: Option<String>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

/// Scope filter shared by the blocked-task and next-task queries.
///
/// At most one of the two parents is honored; `feature_id` wins when both
/// are supplied.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct WorkScope {
    pub project_id: Option<Uuid>,
    pub feature_id: Option<Uuid>,
}

impl WorkScope {
    pub fn feature(id: Uuid) -> Self {
        Self {
            project_id: None,
            feature_id: Some(id),
        }
    }

    pub fn project(id: Uuid) -> Self {
        Self {
            project_id: Some(id),
            feature_id: None,
        }
    }
}

// --- Work-tree bulk creation ------------------------------------------------

/// Atomic multi-entity creation payload: one optional project, features,
/// tasks, and dependencies between tasks referenced by list index.
///
/// The whole tree is cycle-checked before any row is written; on detection
/// the entire creation is rolled back.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkTreeSpec {
    pub project: Option<NewProject>,
    #[serde(default)]
    pub features: Vec<WorkTreeFeature>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkTreeFeature {
    pub feature: NewFeature,
    #[serde(default)]
    pub tasks: Vec<NewTask>,
    /// Edges between tasks of this feature, endpoints given as indexes into
    /// `tasks`.
    #[serde(default)]
    pub dependencies: Vec<WorkTreeEdge>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WorkTreeEdge {
    pub from_index: usize,
    pub to_index: usize,
    pub dep_type: DependencyType,
    pub unblock_at: Option<UnblockThreshold>,
}

/// Identifiers of everything a work-tree creation wrote.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct WorkTreeCreated {
    pub project_id: Option<Uuid>,
    pub feature_ids: Vec<Uuid>,
    pub task_ids: Vec<Uuid>,
    pub dependency_ids: Vec<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn role_ordering_follows_progression_axis() {
        assert!(StatusRole::Work.at_least(StatusRole::Queue));
        assert!(StatusRole::Review.at_least(StatusRole::Work));
        assert!(StatusRole::Terminal.at_least(StatusRole::Review));
        assert!(StatusRole::Work.at_least(StatusRole::Work));
        assert!(!StatusRole::Queue.at_least(StatusRole::Work));
    }

    #[test]
    fn blocked_role_is_orthogonal() {
        assert!(!StatusRole::Blocked.at_least(StatusRole::Queue));
        assert!(!StatusRole::Terminal.at_least(StatusRole::Blocked));
        assert_eq!(StatusRole::Blocked.rank(), None);
    }

    #[test]
    fn threshold_satisfaction() {
        assert!(UnblockThreshold::Work.satisfied_by(StatusRole::Work));
        assert!(UnblockThreshold::Work.satisfied_by(StatusRole::Terminal));
        assert!(!UnblockThreshold::Work.satisfied_by(StatusRole::Queue));
        assert!(!UnblockThreshold::Queue.satisfied_by(StatusRole::Blocked));
        // Default threshold is terminal
        assert!(!UnblockThreshold::default().satisfied_by(StatusRole::Review));
        assert!(UnblockThreshold::default().satisfied_by(StatusRole::Terminal));
    }

    #[test]
    fn priority_rank_orders_high_first() {
        assert!(Priority::High.rank() < Priority::Medium.rank());
        assert!(Priority::Medium.rank() < Priority::Low.rank());
        assert_eq!(Priority::parse("high"), Some(Priority::High));
        assert_eq!(Priority::parse("bogus"), None);
    }

    #[test]
    fn blocking_pair_normalizes_direction() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let edge = |dep_type| Dependency {
            id: Uuid::new_v4(),
            from_task: a,
            to_task: b,
            dep_type,
            unblock_at: None,
            created_at: Utc::now(),
        };

        assert_eq!(edge(DependencyType::Blocks).blocking_pair(), Some((a, b)));
        assert_eq!(
            edge(DependencyType::IsBlockedBy).blocking_pair(),
            Some((b, a))
        );
        assert_eq!(edge(DependencyType::RelatesTo).blocking_pair(), None);
    }

    #[test]
    fn dependency_type_parsing() {
        assert_eq!(DependencyType::parse("BLOCKS"), Some(DependencyType::Blocks));
        assert_eq!(
            DependencyType::parse("is_blocked_by"),
            Some(DependencyType::IsBlockedBy)
        );
        assert_eq!(
            DependencyType::parse("RELATES_TO"),
            Some(DependencyType::RelatesTo)
        );
        assert!(DependencyType::parse("DEPENDS").is_none());
        assert!(DependencyType::Blocks.is_blocking());
        assert!(!DependencyType::RelatesTo.is_blocking());
    }
}
