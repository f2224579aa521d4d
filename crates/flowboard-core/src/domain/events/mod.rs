//! Domain event infrastructure
//!
//! Board events are fire-and-forget notifications consumed by telemetry and
//! automation layers. Publishing never fails and never blocks a store
//! mutation.

use std::sync::{Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::feature::Feature;
use super::status::FeatureStatus;

pub const FEATURE_CREATED: &str = "feature:created";
pub const FEATURE_STATUS_CHANGED: &str = "feature:status-changed";
pub const FEATURE_COMPLETED: &str = "feature:completed";

/// Base trait for all domain events
///
/// Domain events represent something that happened in the domain.
/// They are immutable facts about the past.
pub trait DomainEvent: Send + Sync {
    /// Get the event type as a string
    fn event_type(&self) -> &str;

    /// Get the aggregate ID this event belongs to
    fn aggregate_id(&self) -> &str;

    /// Get the timestamp when this event occurred
    fn timestamp(&self) -> DateTime<Utc>;

    /// Get event payload as JSON
    fn data(&self) -> Option<serde_json::Value>;
}

/// Sink for domain events
pub trait EventPublisher: Send + Sync {
    /// Publish a domain event
    fn publish(&self, event: &dyn DomainEvent);
}

/// Event emitted by the feature store
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureEvent {
    pub event_type: String,
    /// Full snapshot after the change
    pub feature: Feature,
    pub previous_status: Option<FeatureStatus>,
    pub new_status: FeatureStatus,
    pub timestamp: DateTime<Utc>,
}

impl FeatureEvent {
    fn new(event_type: &str, feature: &Feature, previous_status: Option<FeatureStatus>) -> Self {
        Self {
            event_type: event_type.to_string(),
            feature: feature.clone(),
            previous_status,
            new_status: feature.status,
            timestamp: Utc::now(),
        }
    }

    pub fn created(feature: &Feature) -> Self {
        Self::new(FEATURE_CREATED, feature, None)
    }

    pub fn status_changed(feature: &Feature, previous: FeatureStatus) -> Self {
        Self::new(FEATURE_STATUS_CHANGED, feature, Some(previous))
    }

    pub fn completed(feature: &Feature, previous: FeatureStatus) -> Self {
        Self::new(FEATURE_COMPLETED, feature, Some(previous))
    }

    /// Events for a status change: always status-changed, plus completed on `done`
    pub fn for_move(feature: &Feature, previous: FeatureStatus) -> Vec<Self> {
        let mut events = vec![Self::status_changed(feature, previous)];
        if feature.status.is_terminal() {
            events.push(Self::completed(feature, previous));
        }
        events
    }
}

impl DomainEvent for FeatureEvent {
    fn event_type(&self) -> &str {
        &self.event_type
    }

    fn aggregate_id(&self) -> &str {
        &self.feature.id
    }

    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn data(&self) -> Option<serde_json::Value> {
        serde_json::to_value(self).ok()
    }
}

/// A stored event record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredEvent {
    /// Unique event ID
    pub id: Uuid,
    /// Aggregate ID this event belongs to
    pub aggregate_id: String,
    /// Event type string
    pub event_type: String,
    /// Event data as JSON
    pub data: Option<serde_json::Value>,
    /// When the event was created
    pub created_at: DateTime<Utc>,
}

impl StoredEvent {
    /// Create from a domain event
    pub fn from_event(event: &dyn DomainEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            aggregate_id: event.aggregate_id().to_string(),
            event_type: event.event_type().to_string(),
            data: event.data(),
            created_at: event.timestamp(),
        }
    }
}

/// A simple in-memory event store for recording events
#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: Mutex<Vec<StoredEvent>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get events for an aggregate
    pub fn events_for(&self, aggregate_id: &str) -> Vec<StoredEvent> {
        self.all_events()
            .into_iter()
            .filter(|e| e.aggregate_id == aggregate_id)
            .collect()
    }

    pub fn all_events(&self) -> Vec<StoredEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Get events by type
    pub fn events_by_type(&self, event_type: &str) -> Vec<StoredEvent> {
        self.all_events()
            .into_iter()
            .filter(|e| e.event_type == event_type)
            .collect()
    }

    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EventPublisher for InMemoryEventStore {
    fn publish(&self, event: &dyn DomainEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(StoredEvent::from_event(event));
    }
}

/// Publisher that forwards events to the tracing subscriber
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingPublisher;

impl EventPublisher for TracingPublisher {
    fn publish(&self, event: &dyn DomainEvent) {
        info!(
            event_type = event.event_type(),
            aggregate_id = event.aggregate_id(),
            "Board event"
        );
    }
}

/// Publisher that drops every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPublisher;

impl EventPublisher for NullPublisher {
    fn publish(&self, _event: &dyn DomainEvent) {}
}
