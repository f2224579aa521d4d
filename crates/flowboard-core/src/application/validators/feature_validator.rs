//! Feature validation
//!
//! Validates feature-related inputs before they reach the feature store.

use crate::application::errors::{AppResult, ApplicationError};
use crate::domain::{Feature, FeatureUpdate};

/// Validator for feature-related operations
pub struct FeatureValidator;

impl FeatureValidator {
    /// Validate a feature title
    ///
    /// Rules:
    /// - Must not be empty
    /// - Must be 200 characters or less
    pub fn validate_title(title: &str) -> AppResult<()> {
        let title = title.trim();

        if title.is_empty() {
            return Err(ApplicationError::validation(
                "title",
                "Feature title cannot be empty",
            ));
        }

        if title.chars().count() > 200 {
            return Err(ApplicationError::validation(
                "title",
                "Feature title must be 200 characters or less",
            ));
        }

        Ok(())
    }

    /// Validate a feature description
    pub fn validate_description(description: &str) -> AppResult<()> {
        if description.chars().count() > 5000 {
            return Err(ApplicationError::validation(
                "description",
                "Description must be 5000 characters or less",
            ));
        }

        Ok(())
    }

    /// Validate feature id format
    pub fn validate_id(id: &str) -> AppResult<()> {
        if id.trim().is_empty() {
            return Err(ApplicationError::validation("id", "Feature id cannot be empty"));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(ApplicationError::validation(
                "id",
                "Feature id cannot contain whitespace",
            ));
        }
        Ok(())
    }

    /// Validate a complete feature
    pub fn validate_feature(feature: &Feature) -> AppResult<()> {
        Self::validate_id(&feature.id)?;
        Self::validate_title(&feature.title)?;
        Self::validate_description(&feature.description)?;
        Ok(())
    }

    /// Validate the fields a partial update touches
    pub fn validate_update(update: &FeatureUpdate) -> AppResult<()> {
        if let Some(title) = &update.title {
            Self::validate_title(title)?;
        }
        if let Some(description) = &update.description {
            Self::validate_description(description)?;
        }
        Ok(())
    }
}
