//! Input validators
//!
//! Validation rules applied before store mutations.

mod feature_validator;
mod task_validator;

pub use feature_validator::FeatureValidator;
pub use task_validator::TaskValidator;
