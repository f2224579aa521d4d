//! Error types for Flowboard

use thiserror::Error;

/// Result type alias using Flowboard's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Flowboard error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Entity errors (E001-E099)
    #[error("Feature '{0}' not found. Run `flowboard board show` to see all features.")]
    FeatureNotFound(String),

    #[error("Task '{0}' not found. Run `flowboard board show` to see all tasks.")]
    TaskNotFound(String),

    #[error("Feature '{0}' already exists")]
    DuplicateFeature(String),

    #[error("Task '{0}' already exists")]
    DuplicateTask(String),

    // Workflow errors (E100-E199)
    #[error("Invalid transition for task '{task_id}': {from} -> {to}")]
    InvalidTransition {
        task_id: String,
        from: String,
        to: String,
    },

    #[error("WIP limit reached: {limit} features already in progress")]
    WipLimitReached { limit: usize },

    #[error("Task '{0}' has reached its retry limit ({1})")]
    RetryLimitReached(String, u32),

    #[error("Task '{0}' has reached its QA iteration limit ({1})")]
    QaLimitReached(String, u32),

    #[error("Invalid execution run transition: {from} -> {to}")]
    InvalidRunTransition { from: String, to: String },

    // Dependency errors (E200-E299)
    #[error("Task '{0}' cannot depend on itself")]
    SelfDependency(String),

    #[error("Dependency cycle detected: {}", .0.join(" -> "))]
    DependencyCycle(Vec<String>),

    #[error("Task '{0}' is still required by: {deps}", deps = .1.join(", "))]
    HasDependents(String, Vec<String>),

    // Backend errors (E300-E399)
    #[error("Backend error: {0}")]
    Backend(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // Generic errors
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::FeatureNotFound(_) => "E001",
            Self::TaskNotFound(_) => "E002",
            Self::DuplicateFeature(_) => "E003",
            Self::DuplicateTask(_) => "E004",
            Self::InvalidTransition { .. } => "E100",
            Self::WipLimitReached { .. } => "E101",
            Self::RetryLimitReached(..) => "E102",
            Self::QaLimitReached(..) => "E103",
            Self::InvalidRunTransition { .. } => "E104",
            Self::SelfDependency(_) => "E200",
            Self::DependencyCycle(_) => "E201",
            Self::HasDependents(..) => "E202",
            Self::Backend(_) => "E300",
            Self::InvalidInput(_) => "E800",
            Self::Json(_) | Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::FeatureNotFound(_) | Self::TaskNotFound(_) => {
                Some("flowboard board show".to_string())
            }
            Self::WipLimitReached { limit } => Some(format!(
                "Finish a feature first, or raise the limit with `flowboard config set board.wip_limit {}`",
                limit + 1
            )),
            Self::RetryLimitReached(id, _) => Some(format!("flowboard tasks skip {}", id)),
            Self::HasDependents(..) => Some("Remove the dependent tasks first".to_string()),
            _ => None,
        }
    }

    /// Whether the error is a refusal that leaves the stores untouched
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Self::InvalidTransition { .. }
                | Self::WipLimitReached { .. }
                | Self::RetryLimitReached(..)
                | Self::QaLimitReached(..)
                | Self::InvalidRunTransition { .. }
        )
    }
}
