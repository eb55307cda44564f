//! Workflow configuration model.
//!
//! The YAML document is the source of truth for flows, terminal statuses,
//! emergency transitions, and cascade toggles. Parsing normalizes every
//! status string to lowercase `-`-separated form so the rest of the engine
//! never deals with raw user spellings.

use std::collections::HashMap;

use serde::Deserialize;

use crate::{
    error::{OrchestratorError, Result},
    models::{ContainerType, StatusRole},
};

/// Name of the pseudo-flow every container type must define.
pub const DEFAULT_FLOW: &str = "default_flow";

/// Canonical form of a status string: lowercase, `_` folded to `-`.
pub fn normalize_status(s: &str) -> String {
    s.trim().to_lowercase().replace('_', "-")
}

/// Case-insensitive status comparison treating `_` and `-` as equivalent.
pub fn status_eq(a: &str, b: &str) -> bool {
    normalize_status(a) == normalize_status(b)
}

/// Cascade toggles (`auto_cascade` block).
#[derive(Debug, Clone, PartialEq)]
pub struct AutoCascadeConfig {
    pub enabled: bool,
    pub max_depth: u32,
    /// Gates the `first_child_started` family of events.
    pub start_cascade: bool,
    /// Gates completion cleanup when a feature reaches terminal.
    pub completion_cleanup: bool,
}

impl Default for AutoCascadeConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_depth: 10,
            start_cascade: true,
            completion_cleanup: true,
        }
    }
}

/// One `(tags, flow)` pair; first match wins in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct FlowMapping {
    /// Lowercased tag set.
    pub tags: Vec<String>,
    pub flow: String,
}

/// Per-container-type flow configuration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContainerFlows {
    pub default_flow: Vec<String>,
    /// Named alternate flows, keyed by flow name (`bug_fix_flow`, ...).
    pub flows: HashMap<String, Vec<String>>,
    pub flow_mappings: Vec<FlowMapping>,
    pub terminal_statuses: Vec<String>,
    pub emergency_transitions: Vec<String>,
    /// Explicit role declarations; these override inference.
    pub status_roles: HashMap<String, StatusRole>,
    /// Flow names permitted to move backward without an emergency transition.
    pub allow_backward: Vec<String>,
}

impl ContainerFlows {
    /// Ordered statuses of a named flow; `default_flow` resolves to the
    /// default sequence.
    pub fn flow_statuses(&self, name: &str) -> Option<&[String]> {
        if name == DEFAULT_FLOW {
            Some(&self.default_flow)
        } else {
            self.flows.get(name).map(|v| v.as_slice())
        }
    }

    pub fn is_terminal(&self, status: &str) -> bool {
        let status = normalize_status(status);
        self.terminal_statuses.iter().any(|t| *t == status)
    }

    pub fn is_emergency(&self, status: &str) -> bool {
        let status = normalize_status(status);
        self.emergency_transitions.iter().any(|t| *t == status)
    }

    pub fn allows_backward(&self, flow_name: &str) -> bool {
        self.allow_backward.iter().any(|f| f == flow_name)
    }

    /// Whether `status` appears in any flow, the terminal set, or the
    /// emergency set for this container type.
    pub fn knows_status(&self, status: &str) -> bool {
        let status = normalize_status(status);
        self.default_flow.contains(&status)
            || self.flows.values().any(|f| f.contains(&status))
            || self.terminal_statuses.contains(&status)
            || self.emergency_transitions.contains(&status)
    }
}

/// In-memory projection of the workflow YAML.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WorkflowConfig {
    pub auto_cascade: AutoCascadeConfig,
    pub tasks: ContainerFlows,
    pub features: ContainerFlows,
    pub projects: ContainerFlows,
}

impl WorkflowConfig {
    pub fn container(&self, container_type: ContainerType) -> &ContainerFlows {
        match container_type {
            ContainerType::Task => &self.tasks,
            ContainerType::Feature => &self.features,
            ContainerType::Project => &self.projects,
        }
    }

    /// Parse a YAML document into a validated config. Container sections
    /// missing from the document fall back to the bundled defaults.
    pub fn from_yaml(text: &str) -> Result<Self> {
        Self::parse(text, false)
    }

    /// The configuration compiled into the binary, used whenever no user
    /// document is available. Parsed once per process.
    pub fn bundled_default() -> Self {
        static BUNDLED: std::sync::OnceLock<WorkflowConfig> = std::sync::OnceLock::new();
        BUNDLED
            .get_or_init(|| {
                // The bundled document must always parse; a failure here is a
                // packaging bug, not a runtime condition.
                Self::parse(include_str!("../../config/default-workflows.yaml"), true)
                    .expect("bundled default workflow configuration is invalid")
            })
            .clone()
    }

    fn parse(text: &str, strict: bool) -> Result<Self> {
        let raw: RawDocument = serde_yaml::from_str(text)
            .map_err(|e| OrchestratorError::Config(format!("workflow YAML parse failed: {e}")))?;
        raw.into_config(strict)
    }

    fn validate(&self) -> Result<()> {
        for (key, flows) in [
            ("tasks", &self.tasks),
            ("features", &self.features),
            ("projects", &self.projects),
        ] {
            if flows.default_flow.is_empty() {
                return Err(OrchestratorError::Config(format!(
                    "{key}: default_flow must not be empty"
                )));
            }
            for mapping in &flows.flow_mappings {
                if flows.flow_statuses(&mapping.flow).is_none() {
                    return Err(OrchestratorError::Config(format!(
                        "{key}: flow_mappings references undefined flow '{}'",
                        mapping.flow
                    )));
                }
                if mapping.tags.is_empty() {
                    return Err(OrchestratorError::Config(format!(
                        "{key}: flow mapping for '{}' has no tags",
                        mapping.flow
                    )));
                }
            }
            for name in &flows.allow_backward {
                if flows.flow_statuses(name).is_none() {
                    return Err(OrchestratorError::Config(format!(
                        "{key}: allow_backward references undefined flow '{name}'"
                    )));
                }
            }
        }
        Ok(())
    }
}

// --- Raw YAML shapes --------------------------------------------------------

#[derive(Debug, Deserialize)]
struct RawDocument {
    #[serde(default)]
    auto_cascade: RawAutoCascade,
    status_progression: RawProgression,
}

#[derive(Debug, Default, Deserialize)]
struct RawAutoCascade {
    enabled: Option<bool>,
    max_depth: Option<u32>,
    #[serde(default)]
    start_cascade: RawToggle,
    #[serde(default)]
    completion_cleanup: RawToggle,
}

#[derive(Debug, Default, Deserialize)]
struct RawToggle {
    enabled: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct RawProgression {
    #[serde(default)]
    tasks: Option<RawContainer>,
    #[serde(default)]
    features: Option<RawContainer>,
    #[serde(default)]
    projects: Option<RawContainer>,
}

#[derive(Debug, Default, Deserialize)]
struct RawContainer {
    #[serde(default)]
    default_flow: Vec<String>,
    #[serde(default)]
    terminal_statuses: Vec<String>,
    #[serde(default)]
    emergency_transitions: Vec<String>,
    #[serde(default)]
    flow_mappings: Vec<RawMapping>,
    #[serde(default)]
    status_roles: HashMap<String, String>,
    #[serde(default)]
    allow_backward: Vec<String>,
    /// Any other sequence-of-strings key is a named alternate flow.
    #[serde(flatten)]
    extra: HashMap<String, serde_yaml::Value>,
}

#[derive(Debug, Deserialize)]
struct RawMapping {
    tags: Vec<String>,
    flow: String,
}

impl RawDocument {
    fn into_config(self, strict: bool) -> Result<WorkflowConfig> {
        let config = WorkflowConfig {
            auto_cascade: AutoCascadeConfig {
                enabled: self.auto_cascade.enabled.unwrap_or(true),
                max_depth: self.auto_cascade.max_depth.unwrap_or(10),
                start_cascade: self.auto_cascade.start_cascade.enabled.unwrap_or(true),
                completion_cleanup: self
                    .auto_cascade
                    .completion_cleanup
                    .enabled
                    .unwrap_or(true),
            },
            tasks: convert_container("tasks", self.status_progression.tasks, strict)?,
            features: convert_container("features", self.status_progression.features, strict)?,
            projects: convert_container("projects", self.status_progression.projects, strict)?,
        };
        config.validate()?;
        Ok(config)
    }
}

fn convert_container(
    key: &str,
    raw: Option<RawContainer>,
    strict: bool,
) -> Result<ContainerFlows> {
    let raw = match raw {
        Some(raw) => raw,
        None if strict => {
            return Err(OrchestratorError::Config(format!(
                "status_progression.{key} section is missing"
            )))
        }
        None => {
            // Fall back to the bundled section for this container type.
            return Ok(bundled_section(key));
        }
    };

    let mut flows = HashMap::new();
    for (name, value) in raw.extra {
        match serde_yaml::from_value::<Vec<String>>(value) {
            Ok(statuses) => {
                flows.insert(
                    name,
                    statuses.iter().map(|s| normalize_status(s)).collect(),
                );
            }
            Err(_) => {
                // Unknown scalar/mapping keys are tolerated, not flows.
                tracing::debug!(container = key, flow = %name, "ignoring non-sequence key");
            }
        }
    }

    let mut status_roles = HashMap::new();
    for (status, role) in raw.status_roles {
        let role = parse_role(&role).ok_or_else(|| {
            OrchestratorError::Config(format!("{key}: unknown role '{role}' for status '{status}'"))
        })?;
        status_roles.insert(normalize_status(&status), role);
    }

    Ok(ContainerFlows {
        default_flow: raw.default_flow.iter().map(|s| normalize_status(s)).collect(),
        flows,
        flow_mappings: raw
            .flow_mappings
            .into_iter()
            .map(|m| FlowMapping {
                tags: m.tags.iter().map(|t| t.trim().to_lowercase()).collect(),
                flow: m.flow,
            })
            .collect(),
        terminal_statuses: raw
            .terminal_statuses
            .iter()
            .map(|s| normalize_status(s))
            .collect(),
        emergency_transitions: raw
            .emergency_transitions
            .iter()
            .map(|s| normalize_status(s))
            .collect(),
        status_roles,
        allow_backward: raw.allow_backward,
    })
}

fn bundled_section(key: &str) -> ContainerFlows {
    let bundled = WorkflowConfig::bundled_default();
    match key {
        "tasks" => bundled.tasks,
        "features" => bundled.features,
        _ => bundled.projects,
    }
}

fn parse_role(s: &str) -> Option<StatusRole> {
    match s.trim().to_lowercase().as_str() {
        "queue" => Some(StatusRole::Queue),
        "work" => Some(StatusRole::Work),
        "review" => Some(StatusRole::Review),
        "blocked" => Some(StatusRole::Blocked),
        "terminal" => Some(StatusRole::Terminal),
        _ => None,
    }
}
