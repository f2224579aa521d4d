//! Flowboard Core Library
//!
//! The workflow engine behind a kanban board of features and the tasks an
//! agent pipeline executes for them:
//! - Status vocabulary and the task transition table
//! - Dependency resolution and cycle rejection
//! - Feature store with a work-in-progress limit
//! - Execution store with status history, retries and run tracking
//! - Drag-and-drop reconciliation
//! - Optimistic backend sync with rollback

pub mod application;
pub mod config;
pub mod domain;
pub mod error;
pub mod storage;

pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::application::{
        BackendSyncAdapter, BoardReconciler, DragEndEvent, DropOutcome, DropTarget,
        ExecutionBackend, ExecutionStore, FeatureStore, InMemoryBackend,
    };
    pub use crate::config::Config;
    pub use crate::domain::{
        Feature, FeatureStatus, FeatureUpdate, NewFeature, Priority, Task, TaskStatus, TaskUpdate,
    };
    pub use crate::error::{Error, Result};
}
