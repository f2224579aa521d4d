//! Application service layer
//!
//! Stores that own board state, the drag-and-drop reconciler, and the
//! adapter that keeps the stores in step with the execution backend.

pub mod backend;
pub mod errors;
pub mod execution_store;
pub mod feature_store;
mod ordering;
pub mod reconciler;
pub mod sync;
pub mod validators;

pub use backend::{ExecutionBackend, InMemoryBackend, RemoteTaskUpdate};
pub use errors::{AppResult, ApplicationError};
pub use execution_store::{ExecutionStore, TaskCheckpoint};
pub use feature_store::{FeatureFilter, FeatureStore, FeatureUndo};
pub use reconciler::{
    BoardReconciler, DragEndEvent, DragItemKind, DropAction, DropOutcome, DropTarget, plan_drop,
};
pub use sync::{BackendSyncAdapter, DrainSummary};
