use crate::{
    error::{OrchestratorError, Result},
    models::{NewFeature, NewProject, NewTask},
};

/// Input validation for the tool layer.
///
/// Catches malformed requests before they reach the engine; everything here
/// raises `Validation`, never a deeper error kind.
pub struct RequestValidator;

impl RequestValidator {
    pub const NAME_MAX: usize = 200;
    pub const DESCRIPTION_MAX: usize = 4000;
    pub const TAG_MAX: usize = 50;
    pub const COMPLEXITY_MIN: u8 = 1;
    pub const COMPLEXITY_MAX: u8 = 10;

    /// Names/titles must be 1-200 characters of non-whitespace content.
    pub fn validate_name(field: &str, value: &str) -> Result<()> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(OrchestratorError::empty_field(field));
        }
        if trimmed.chars().count() > Self::NAME_MAX {
            return Err(OrchestratorError::validation(format!(
                "Field '{field}' must be at most {} characters long",
                Self::NAME_MAX
            )));
        }
        Ok(())
    }

    pub fn validate_description(value: &str) -> Result<()> {
        if value.chars().count() > Self::DESCRIPTION_MAX {
            return Err(OrchestratorError::validation(format!(
                "Description must be at most {} characters long",
                Self::DESCRIPTION_MAX
            )));
        }
        Ok(())
    }

    /// Complexity is an integer 1-10 when present.
    pub fn validate_complexity(value: Option<u8>) -> Result<()> {
        if let Some(c) = value {
            if !(Self::COMPLEXITY_MIN..=Self::COMPLEXITY_MAX).contains(&c) {
                return Err(OrchestratorError::validation(format!(
                    "Complexity must be between {} and {}, got {c}",
                    Self::COMPLEXITY_MIN,
                    Self::COMPLEXITY_MAX
                )));
            }
        }
        Ok(())
    }

    /// Tags: non-empty, bounded length, no embedded commas (they are the
    /// list separator on several client surfaces).
    pub fn validate_tags(tags: &[String]) -> Result<()> {
        for tag in tags {
            let trimmed = tag.trim();
            if trimmed.is_empty() {
                return Err(OrchestratorError::validation("Tags cannot be empty"));
            }
            if trimmed.chars().count() > Self::TAG_MAX {
                return Err(OrchestratorError::validation(format!(
                    "Tag '{trimmed}' exceeds {} characters",
                    Self::TAG_MAX
                )));
            }
            if trimmed.contains(',') {
                return Err(OrchestratorError::validation(format!(
                    "Tag '{trimmed}' must not contain commas"
                )));
            }
        }
        Ok(())
    }

    pub fn validate_new_project(project: &NewProject) -> Result<()> {
        Self::validate_name("name", &project.name)?;
        Self::validate_tags(&project.tags)?;
        Ok(())
    }

    pub fn validate_new_feature(feature: &NewFeature) -> Result<()> {
        Self::validate_name("name", &feature.name)?;
        Self::validate_description(&feature.description)?;
        Self::validate_tags(&feature.tags)?;
        Ok(())
    }

    pub fn validate_new_task(task: &NewTask) -> Result<()> {
        Self::validate_name("title", &task.title)?;
        Self::validate_description(&task.description)?;
        Self::validate_complexity(task.complexity)?;
        Self::validate_tags(&task.tags)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_bounded() {
        assert!(RequestValidator::validate_name("name", "Build parser").is_ok());
        assert!(RequestValidator::validate_name("name", "").is_err());
        assert!(RequestValidator::validate_name("name", "   ").is_err());
        assert!(RequestValidator::validate_name("name", &"x".repeat(201)).is_err());
        assert!(RequestValidator::validate_name("name", &"x".repeat(200)).is_ok());
    }

    #[test]
    fn complexity_range() {
        assert!(RequestValidator::validate_complexity(None).is_ok());
        assert!(RequestValidator::validate_complexity(Some(1)).is_ok());
        assert!(RequestValidator::validate_complexity(Some(10)).is_ok());
        assert!(RequestValidator::validate_complexity(Some(0)).is_err());
        assert!(RequestValidator::validate_complexity(Some(11)).is_err());
    }

    #[test]
    fn tags_reject_empties_and_commas() {
        assert!(RequestValidator::validate_tags(&["backend".into()]).is_ok());
        assert!(RequestValidator::validate_tags(&["".into()]).is_err());
        assert!(RequestValidator::validate_tags(&["a,b".into()]).is_err());
        assert!(RequestValidator::validate_tags(&["x".repeat(51)]).is_err());
    }

    #[test]
    fn new_task_validation_composes() {
        let mut task = NewTask::titled(None, "Implement loader");
        task.complexity = Some(5);
        assert!(RequestValidator::validate_new_task(&task).is_ok());
        task.complexity = Some(99);
        assert!(RequestValidator::validate_new_task(&task).is_err());
    }
}
