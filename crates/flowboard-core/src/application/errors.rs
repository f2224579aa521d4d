//! Application layer errors
//!
//! Error types for input validation ahead of store operations.

use std::fmt;

use crate::error::Error;

/// Application layer error types
#[derive(Debug)]
pub enum ApplicationError {
    /// Validation error with field and message
    Validation { field: String, message: String },
    /// Domain error wrapper
    Domain(Error),
}

impl ApplicationError {
    /// Create a validation error
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ApplicationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation { field, message } => {
                write!(f, "Validation error for '{}': {}", field, message)
            }
            Self::Domain(e) => write!(f, "Domain error: {}", e),
        }
    }
}

impl std::error::Error for ApplicationError {}

impl From<Error> for ApplicationError {
    fn from(error: Error) -> Self {
        Self::Domain(error)
    }
}

impl From<ApplicationError> for Error {
    fn from(error: ApplicationError) -> Self {
        match error {
            ApplicationError::Domain(e) => e,
            other => Error::InvalidInput(other.to_string()),
        }
    }
}

/// Result type for application operations
pub type AppResult<T> = Result<T, ApplicationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error() {
        let err = ApplicationError::validation("title", "cannot be empty");
        assert!(err.to_string().contains("title"));
        assert!(err.to_string().contains("cannot be empty"));
    }

    #[test]
    fn test_into_domain_error() {
        let err: Error = ApplicationError::validation("progress", "must be 0-100").into();
        assert!(matches!(err, Error::InvalidInput(msg) if msg.contains("progress")));

        let err: Error = ApplicationError::from(Error::TaskNotFound("t9".into())).into();
        assert!(matches!(err, Error::TaskNotFound(id) if id == "t9"));
    }
}
