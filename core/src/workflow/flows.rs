//! Flow resolution: which ordered status sequence governs an entity, where a
//! status sits in it, and which coarse role a status maps to.

use crate::models::{ContainerType, StatusRole};

use super::config::{normalize_status, ContainerFlows, WorkflowConfig, DEFAULT_FLOW};

/// The flow selected for an entity after tag matching.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveFlow {
    pub name: String,
    /// Ordered, normalized status sequence.
    pub statuses: Vec<String>,
    /// Entity tags (original case) that selected the flow; empty when the
    /// default flow applies. Diagnostics only.
    pub matched_tags: Vec<String>,
}

impl ActiveFlow {
    /// Index of `status` in the sequence, `-`/`_`- and case-insensitive.
    pub fn position(&self, status: &str) -> Option<usize> {
        let status = normalize_status(status);
        self.statuses.iter().position(|s| *s == status)
    }

    pub fn last_index(&self) -> usize {
        self.statuses.len().saturating_sub(1)
    }
}

/// Read-side view over a loaded [`WorkflowConfig`].
///
/// Cheap to construct per operation; holds no state beyond the borrow.
pub struct FlowResolver<'a> {
    config: &'a WorkflowConfig,
}

impl<'a> FlowResolver<'a> {
    pub fn new(config: &'a WorkflowConfig) -> Self {
        Self { config }
    }

    fn container(&self, container_type: ContainerType) -> &ContainerFlows {
        self.config.container(container_type)
    }

    /// Select the flow governing an entity with the given tags.
    ///
    /// Flow mappings are consulted in declaration order; the first mapping
    /// sharing any tag (case-insensitive) with the entity wins. No match
    /// selects the default flow.
    pub fn active_flow(&self, container_type: ContainerType, tags: &[String]) -> ActiveFlow {
        let flows = self.container(container_type);
        let lowered: Vec<String> = tags.iter().map(|t| t.trim().to_lowercase()).collect();

        for mapping in &flows.flow_mappings {
            let matched: Vec<String> = tags
                .iter()
                .zip(&lowered)
                .filter(|(_, lower)| mapping.tags.contains(lower))
                .map(|(original, _)| original.clone())
                .collect();
            if !matched.is_empty() {
                if let Some(statuses) = flows.flow_statuses(&mapping.flow) {
                    return ActiveFlow {
                        name: mapping.flow.clone(),
                        statuses: statuses.to_vec(),
                        matched_tags: matched,
                    };
                }
            }
        }

        ActiveFlow {
            name: DEFAULT_FLOW.to_string(),
            statuses: flows.default_flow.clone(),
            matched_tags: vec![],
        }
    }

    pub fn terminal_statuses(&self, container_type: ContainerType) -> &[String] {
        &self.container(container_type).terminal_statuses
    }

    pub fn is_terminal(&self, container_type: ContainerType, status: &str) -> bool {
        self.container(container_type).is_terminal(status)
    }

    pub fn is_emergency(&self, container_type: ContainerType, status: &str) -> bool {
        self.container(container_type).is_emergency(status)
    }

    /// Whether `status` is known to any flow / terminal set / emergency set
    /// of the container type.
    pub fn knows_status(&self, container_type: ContainerType, status: &str) -> bool {
        self.container(container_type).knows_status(status)
    }

    /// First status of the active flow; what newly created entities get.
    pub fn initial_status(&self, container_type: ContainerType, tags: &[String]) -> String {
        self.active_flow(container_type, tags)
            .statuses
            .first()
            .cloned()
            .unwrap_or_default()
    }

    /// Map a status to its coarse role.
    ///
    /// Resolution order: explicit `status_roles` declaration, terminal-set
    /// membership, well-known status names, position in the active flow
    /// (first = queue, last pre-terminal = review, otherwise work). Statuses
    /// the configuration does not know at all resolve to `Work`; they are
    /// never recommendable as fresh work and never terminal.
    pub fn role(&self, container_type: ContainerType, tags: &[String], status: &str) -> StatusRole {
        let flows = self.container(container_type);
        let normalized = normalize_status(status);

        if let Some(role) = flows.status_roles.get(&normalized) {
            return *role;
        }
        if flows.is_terminal(&normalized) {
            return StatusRole::Terminal;
        }
        if let Some(role) = well_known_role(&normalized) {
            return role;
        }

        let flow = self.active_flow(container_type, tags);
        match flow.position(&normalized) {
            Some(0) => StatusRole::Queue,
            Some(idx) => {
                // Last slot before the flow's terminal tail reads as review.
                let last_progressive = flow
                    .statuses
                    .iter()
                    .rposition(|s| !flows.is_terminal(s))
                    .unwrap_or(0);
                if idx == last_progressive && flow.statuses.len() > 3 {
                    StatusRole::Review
                } else {
                    StatusRole::Work
                }
            }
            None => StatusRole::Work,
        }
    }
}

fn well_known_role(status: &str) -> Option<StatusRole> {
    match status {
        "pending" | "backlog" | "planning" | "created" | "todo" | "new" | "draft" => {
            Some(StatusRole::Queue)
        }
        "in-progress" | "in-development" | "implementation" | "doing" | "active" => {
            Some(StatusRole::Work)
        }
        "testing" | "validating" | "review" | "in-review" | "pending-review" | "qa" => {
            Some(StatusRole::Review)
        }
        "blocked" | "on-hold" | "waiting" => Some(StatusRole::Blocked),
        "completed" | "cancelled" | "archived" | "done" => Some(StatusRole::Terminal),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::config::WorkflowConfig;

    fn config() -> WorkflowConfig {
        WorkflowConfig::bundled_default()
    }

    #[test]
    fn default_flow_when_no_tags_match() {
        let config = config();
        let resolver = FlowResolver::new(&config);
        let flow = resolver.active_flow(ContainerType::Task, &["backend".to_string()]);
        assert_eq!(flow.name, DEFAULT_FLOW);
        assert!(flow.matched_tags.is_empty());
        assert_eq!(flow.statuses[0], "pending");
    }

    #[test]
    fn first_matching_mapping_wins_and_preserves_tag_case() {
        let config = config();
        let resolver = FlowResolver::new(&config);
        let flow = resolver.active_flow(
            ContainerType::Task,
            &["Backend".to_string(), "BUG".to_string(), "review".to_string()],
        );
        assert_eq!(flow.name, "bug_fix_flow");
        assert_eq!(flow.matched_tags, vec!["BUG".to_string()]);
    }

    #[test]
    fn prototype_tag_selects_rapid_flow_for_features() {
        let config = config();
        let resolver = FlowResolver::new(&config);
        let flow = resolver.active_flow(ContainerType::Feature, &["prototype".to_string()]);
        assert_eq!(flow.name, "rapid_prototype_flow");
        assert_eq!(
            flow.statuses,
            vec!["planning", "in-development", "completed"]
        );
    }

    #[test]
    fn position_is_separator_and_case_insensitive() {
        let config = config();
        let resolver = FlowResolver::new(&config);
        let flow = resolver.active_flow(ContainerType::Task, &[]);
        assert_eq!(flow.position("In_Progress"), Some(1));
        assert_eq!(flow.position("PENDING"), Some(0));
        assert_eq!(flow.position("nope"), None);
    }

    #[test]
    fn terminal_set_applies_across_flows() {
        let config = config();
        let resolver = FlowResolver::new(&config);
        // cancelled is terminal even though no flow lists it as a step
        assert!(resolver.is_terminal(ContainerType::Task, "cancelled"));
        assert!(resolver.is_terminal(ContainerType::Feature, "Completed"));
        assert!(!resolver.is_terminal(ContainerType::Feature, "testing"));
    }

    #[test]
    fn role_resolution_order() {
        let config = config();
        let resolver = FlowResolver::new(&config);
        // explicit declaration
        assert_eq!(
            resolver.role(ContainerType::Task, &[], "investigating"),
            StatusRole::Work
        );
        // terminal set
        assert_eq!(
            resolver.role(ContainerType::Task, &[], "archived"),
            StatusRole::Terminal
        );
        // well-known names
        assert_eq!(
            resolver.role(ContainerType::Feature, &[], "testing"),
            StatusRole::Review
        );
        assert_eq!(
            resolver.role(ContainerType::Feature, &[], "planning"),
            StatusRole::Queue
        );
        // explicit blocked declaration
        assert_eq!(
            resolver.role(ContainerType::Task, &[], "on-hold"),
            StatusRole::Blocked
        );
    }

    #[test]
    fn positional_inference_for_user_defined_statuses() {
        let yaml = r#"
status_progression:
  tasks:
    default_flow: [intake, build, harden, shipped]
    terminal_statuses: [shipped]
"#;
        let config = WorkflowConfig::from_yaml(yaml).unwrap();
        let resolver = FlowResolver::new(&config);
        assert_eq!(resolver.role(ContainerType::Task, &[], "intake"), StatusRole::Queue);
        assert_eq!(resolver.role(ContainerType::Task, &[], "build"), StatusRole::Work);
        assert_eq!(resolver.role(ContainerType::Task, &[], "harden"), StatusRole::Review);
        assert_eq!(
            resolver.role(ContainerType::Task, &[], "shipped"),
            StatusRole::Terminal
        );
    }

    #[test]
    fn initial_status_is_flow_head() {
        let config = config();
        let resolver = FlowResolver::new(&config);
        assert_eq!(resolver.initial_status(ContainerType::Task, &[]), "pending");
        assert_eq!(
            resolver.initial_status(ContainerType::Feature, &[]),
            "planning"
        );
    }
}
