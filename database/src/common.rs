use chrono::{DateTime, Utc};
use orchestrator_core::{
    error::{OrchestratorError, Result},
    models::{
        ContainerType, Dependency, DependencyType, Feature, Priority, Project, RoleTransition,
        StatusRole, Task, UnblockThreshold,
    },
};
use sqlx::{sqlite::SqliteRow, Row};
use uuid::Uuid;

/// Convert Priority enum to string for database storage
pub fn priority_to_string(priority: Priority) -> &'static str {
    match priority {
        Priority::High => "HIGH",
        Priority::Medium => "MEDIUM",
        Priority::Low => "LOW",
    }
}

/// Convert string from database to Priority enum
pub fn string_to_priority(s: &str) -> Result<Priority> {
    Priority::parse(s).ok_or_else(|| {
        OrchestratorError::store(format!("Invalid priority in database: {s}"))
    })
}

pub fn dep_type_to_string(dep_type: DependencyType) -> &'static str {
    match dep_type {
        DependencyType::Blocks => "BLOCKS",
        DependencyType::IsBlockedBy => "IS_BLOCKED_BY",
        DependencyType::RelatesTo => "RELATES_TO",
    }
}

pub fn string_to_dep_type(s: &str) -> Result<DependencyType> {
    DependencyType::parse(s).ok_or_else(|| {
        OrchestratorError::store(format!("Invalid dependency type in database: {s}"))
    })
}

pub fn threshold_to_string(threshold: UnblockThreshold) -> &'static str {
    match threshold {
        UnblockThreshold::Queue => "queue",
        UnblockThreshold::Work => "work",
        UnblockThreshold::Review => "review",
        UnblockThreshold::Terminal => "terminal",
    }
}

pub fn string_to_threshold(s: &str) -> Result<UnblockThreshold> {
    UnblockThreshold::parse(s).ok_or_else(|| {
        OrchestratorError::store(format!("Invalid unblock threshold in database: {s}"))
    })
}

pub fn entity_type_to_string(entity_type: ContainerType) -> &'static str {
    match entity_type {
        ContainerType::Project => "project",
        ContainerType::Feature => "feature",
        ContainerType::Task => "task",
    }
}

pub fn string_to_entity_type(s: &str) -> Result<ContainerType> {
    match s {
        "project" => Ok(ContainerType::Project),
        "feature" => Ok(ContainerType::Feature),
        "task" => Ok(ContainerType::Task),
        _ => Err(OrchestratorError::store(format!(
            "Invalid entity type in database: {s}"
        ))),
    }
}

pub fn role_to_string(role: StatusRole) -> &'static str {
    match role {
        StatusRole::Queue => "queue",
        StatusRole::Work => "work",
        StatusRole::Review => "review",
        StatusRole::Blocked => "blocked",
        StatusRole::Terminal => "terminal",
    }
}

pub fn string_to_role(s: &str) -> Result<StatusRole> {
    match s {
        "queue" => Ok(StatusRole::Queue),
        "work" => Ok(StatusRole::Work),
        "review" => Ok(StatusRole::Review),
        "blocked" => Ok(StatusRole::Blocked),
        "terminal" => Ok(StatusRole::Terminal),
        _ => Err(OrchestratorError::store(format!(
            "Invalid role in database: {s}"
        ))),
    }
}

/// Tags live in a JSON array column.
pub fn tags_to_json(tags: &[String]) -> String {
    serde_json::to_string(tags).unwrap_or_else(|_| "[]".to_string())
}

pub fn json_to_tags(json: &str) -> Vec<String> {
    serde_json::from_str(json).unwrap_or_default()
}

/// Parse a TEXT uuid column.
pub fn parse_uuid(column: &str, value: &str) -> Result<Uuid> {
    Uuid::parse_str(value).map_err(|e| {
        OrchestratorError::store(format!("Invalid UUID in column '{column}': {e}"))
    })
}

fn get_uuid(row: &SqliteRow, column: &str) -> Result<Uuid> {
    let value: String = row.get(column);
    parse_uuid(column, &value)
}

fn get_optional_uuid(row: &SqliteRow, column: &str) -> Result<Option<Uuid>> {
    let value: Option<String> = row.get(column);
    value.map(|v| parse_uuid(column, &v)).transpose()
}

/// Convert a SQLite row to a Project model
pub fn row_to_project(row: &SqliteRow) -> Result<Project> {
    let tags: String = row.get("tags");
    let created_at: DateTime<Utc> = row.get("created_at");
    let modified_at: DateTime<Utc> = row.get("modified_at");
    Ok(Project {
        id: get_uuid(row, "id")?,
        name: row.get("name"),
        summary: row.get("summary"),
        status: row.get("status"),
        tags: json_to_tags(&tags),
        created_at,
        modified_at,
    })
}

/// Convert a SQLite row to a Feature model
pub fn row_to_feature(row: &SqliteRow) -> Result<Feature> {
    let priority: String = row.get("priority");
    let tags: String = row.get("tags");
    let created_at: DateTime<Utc> = row.get("created_at");
    let modified_at: DateTime<Utc> = row.get("modified_at");
    Ok(Feature {
        id: get_uuid(row, "id")?,
        project_id: get_optional_uuid(row, "project_id")?,
        name: row.get("name"),
        summary: row.get("summary"),
        description: row.get("description"),
        status: row.get("status"),
        priority: string_to_priority(&priority)?,
        tags: json_to_tags(&tags),
        requires_verification: row.get::<i64, _>("requires_verification") != 0,
        created_at,
        modified_at,
    })
}

/// Convert a SQLite row to a Task model
pub fn row_to_task(row: &SqliteRow) -> Result<Task> {
    let priority: String = row.get("priority");
    let tags: String = row.get("tags");
    let complexity: Option<i64> = row.get("complexity");
    let created_at: DateTime<Utc> = row.get("created_at");
    let modified_at: DateTime<Utc> = row.get("modified_at");
    Ok(Task {
        id: get_uuid(row, "id")?,
        feature_id: get_optional_uuid(row, "feature_id")?,
        title: row.get("title"),
        summary: row.get("summary"),
        description: row.get("description"),
        status: row.get("status"),
        priority: string_to_priority(&priority)?,
        complexity: complexity.map(|c| c as u8),
        tags: json_to_tags(&tags),
        created_at,
        modified_at,
    })
}

/// Convert a SQLite row to a Dependency model
pub fn row_to_dependency(row: &SqliteRow) -> Result<Dependency> {
    let dep_type: String = row.get("dep_type");
    let unblock_at: Option<String> = row.get("unblock_at");
    let created_at: DateTime<Utc> = row.get("created_at");
    Ok(Dependency {
        id: get_uuid(row, "id")?,
        from_task: get_uuid(row, "from_task")?,
        to_task: get_uuid(row, "to_task")?,
        dep_type: string_to_dep_type(&dep_type)?,
        unblock_at: unblock_at.map(|t| string_to_threshold(&t)).transpose()?,
        created_at,
    })
}

/// Convert a SQLite row to a RoleTransition model
pub fn row_to_transition(row: &SqliteRow) -> Result<RoleTransition> {
    let entity_type: String = row.get("entity_type");
    let from_role: String = row.get("from_role");
    let to_role: String = row.get("to_role");
    let created_at: DateTime<Utc> = row.get("created_at");
    Ok(RoleTransition {
        id: get_uuid(row, "id")?,
        entity_id: get_uuid(row, "entity_id")?,
        entity_type: string_to_entity_type(&entity_type)?,
        from_role: string_to_role(&from_role)?,
        to_role: string_to_role(&to_role)?,
        from_status: row.get("from_status"),
        to_status: row.get("to_status"),
        trigger: row.get("triggered_by"),
        summary: row.get("summary"),
        created_at,
    })
}

/// Convert a SQLx error to the store error kind, surfacing the dependency
/// uniqueness constraint as its own variant.
pub fn sqlx_error_to_store_error(err: sqlx::Error) -> OrchestratorError {
    match &err {
        sqlx::Error::Database(db_err) => {
            let message = db_err.message();
            if message.contains("UNIQUE constraint failed")
                && message.contains("dependencies")
            {
                return OrchestratorError::DuplicateDependency {
                    from: Uuid::nil(),
                    to: Uuid::nil(),
                };
            }
            OrchestratorError::store(format!("Database constraint error: {message}"))
        }
        sqlx::Error::RowNotFound => {
            OrchestratorError::store("Unexpected RowNotFound error".to_string())
        }
        sqlx::Error::PoolTimedOut => OrchestratorError::store("Connection pool timeout"),
        sqlx::Error::Io(io_err) => {
            OrchestratorError::store(format!("Database I/O error: {io_err}"))
        }
        _ => OrchestratorError::store(format!("Database operation failed: {err}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_conversions() {
        assert_eq!(priority_to_string(Priority::High), "HIGH");
        assert_eq!(priority_to_string(Priority::Medium), "MEDIUM");
        assert_eq!(priority_to_string(Priority::Low), "LOW");
        assert_eq!(string_to_priority("HIGH").unwrap(), Priority::High);
        assert!(string_to_priority("URGENT").is_err());
    }

    #[test]
    fn test_dep_type_conversions() {
        for dep_type in [
            DependencyType::Blocks,
            DependencyType::IsBlockedBy,
            DependencyType::RelatesTo,
        ] {
            let s = dep_type_to_string(dep_type);
            assert_eq!(string_to_dep_type(s).unwrap(), dep_type);
        }
        assert!(string_to_dep_type("DEPENDS_ON").is_err());
    }

    #[test]
    fn test_threshold_conversions() {
        for threshold in [
            UnblockThreshold::Queue,
            UnblockThreshold::Work,
            UnblockThreshold::Review,
            UnblockThreshold::Terminal,
        ] {
            let s = threshold_to_string(threshold);
            assert_eq!(string_to_threshold(s).unwrap(), threshold);
        }
    }

    #[test]
    fn test_role_and_entity_type_conversions() {
        for role in [
            StatusRole::Queue,
            StatusRole::Work,
            StatusRole::Review,
            StatusRole::Blocked,
            StatusRole::Terminal,
        ] {
            assert_eq!(string_to_role(role_to_string(role)).unwrap(), role);
        }
        for entity_type in [
            ContainerType::Project,
            ContainerType::Feature,
            ContainerType::Task,
        ] {
            assert_eq!(
                string_to_entity_type(entity_type_to_string(entity_type)).unwrap(),
                entity_type
            );
        }
    }

    #[test]
    fn test_tags_round_trip() {
        let tags = vec!["backend".to_string(), "bug".to_string()];
        let json = tags_to_json(&tags);
        assert_eq!(json_to_tags(&json), tags);
        assert!(json_to_tags("not json").is_empty());
        assert_eq!(tags_to_json(&[]), "[]");
    }

    #[test]
    fn test_parse_uuid_failures() {
        assert!(parse_uuid("id", "not-a-uuid").is_err());
        let id = Uuid::new_v4();
        assert_eq!(parse_uuid("id", &id.to_string()).unwrap(), id);
    }
}
