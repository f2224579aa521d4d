//! Domain layer
//!
//! Entities, the status vocabulary and the dependency resolver.

pub mod dependency;
pub mod events;
pub mod feature;
pub mod run;
pub mod status;
pub mod task;

pub use dependency::{BlockedState, TaskIndex, compute_blocked, downstream_of};
pub use events::{DomainEvent, EventPublisher, FeatureEvent, InMemoryEventStore, NullPublisher};
pub use feature::{Feature, FeatureUpdate, NewFeature, TaskSummary};
pub use run::ExecutionRun;
pub use status::{
    AgentRole, Complexity, ExecutionStatus, FeatureStatus, Priority, TaskStatus,
    is_valid_transition,
};
pub use task::{LogLevel, StatusHistoryEntry, Task, TaskError, TaskLog, TaskUpdate};
