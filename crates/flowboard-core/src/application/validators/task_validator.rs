//! Task validation
//!
//! Field-level checks for tasks; graph-level checks live in the dependency
//! resolver.

use crate::application::errors::{AppResult, ApplicationError};
use crate::domain::{Task, TaskUpdate};

/// Validator for task-related operations
pub struct TaskValidator;

impl TaskValidator {
    /// Validate task ID format
    ///
    /// Rules:
    /// - Must not be empty
    /// - Must be alphanumeric with hyphens/underscores
    /// - Must be 64 characters or less
    pub fn validate_task_id(task_id: &str) -> AppResult<()> {
        if task_id.is_empty() {
            return Err(ApplicationError::validation("id", "Task ID cannot be empty"));
        }

        if task_id.len() > 64 {
            return Err(ApplicationError::validation(
                "id",
                "Task ID must be 64 characters or less",
            ));
        }

        if !task_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(ApplicationError::validation(
                "id",
                "Task ID must contain only letters, numbers, hyphens, and underscores",
            ));
        }

        Ok(())
    }

    pub fn validate_title(title: &str) -> AppResult<()> {
        if title.trim().is_empty() {
            return Err(ApplicationError::validation("title", "Task title cannot be empty"));
        }
        Ok(())
    }

    /// Progress is a percentage
    pub fn validate_progress(progress: u8) -> AppResult<()> {
        if progress > 100 {
            return Err(ApplicationError::validation(
                "progress",
                "Progress must be between 0 and 100",
            ));
        }
        Ok(())
    }

    /// Validate a complete task
    pub fn validate_task(task: &Task) -> AppResult<()> {
        Self::validate_task_id(&task.id)?;
        Self::validate_title(&task.title)?;
        Self::validate_progress(task.progress)?;
        Ok(())
    }

    /// Validate the fields a partial update touches
    pub fn validate_update(update: &TaskUpdate) -> AppResult<()> {
        if let Some(title) = &update.title {
            Self::validate_title(title)?;
        }
        if let Some(progress) = update.progress {
            Self::validate_progress(progress)?;
        }
        Ok(())
    }
}
