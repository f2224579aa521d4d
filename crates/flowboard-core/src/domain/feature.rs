//! Feature entity shown on the kanban board

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::{Complexity, FeatureStatus, Priority, TaskStatus};

/// Task summary embedded in a feature card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskSummary {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
}

/// A unit of work tracked on the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Feature {
    /// Unique feature identifier
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: FeatureStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub complexity: Complexity,
    /// Agent currently working the feature, if any
    #[serde(default)]
    pub assigned_agent: Option<String>,
    #[serde(default)]
    pub tasks: Vec<TaskSummary>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Feature {
    /// Create a new backlog feature with a fresh id
    pub fn new(title: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4().to_string(), title)
    }

    pub fn with_id(id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            status: FeatureStatus::Backlog,
            priority: Priority::Medium,
            complexity: Complexity::Moderate,
            assigned_agent: None,
            tasks: Vec::new(),
            tags: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_status(mut self, status: FeatureStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_complexity(mut self, complexity: Complexity) -> Self {
        self.complexity = complexity;
        self
    }

    pub fn with_tags(mut self, tags: Vec<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Refresh the modification timestamp
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Case-insensitive match against title, description and tags
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        self.title.to_lowercase().contains(&needle)
            || self.description.to_lowercase().contains(&needle)
            || self.tags.iter().any(|t| t.to_lowercase().contains(&needle))
    }

    /// Fraction of embedded tasks that are completed, 0-100
    pub fn progress(&self) -> u8 {
        if self.tasks.is_empty() {
            return 0;
        }
        let done = self
            .tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Completed)
            .count();
        ((done * 100) / self.tasks.len()) as u8
    }
}

/// Partial update of a feature; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeatureUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<FeatureStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
    /// `Some(None)` clears the assignment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<Option<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
}

impl FeatureUpdate {
    pub fn status(status: FeatureStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn priority(priority: Priority) -> Self {
        Self {
            priority: Some(priority),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    /// Apply every non-status field; status goes through the store's move rules
    pub(crate) fn apply_fields(&self, feature: &mut Feature) {
        if let Some(title) = &self.title {
            feature.title = title.clone();
        }
        if let Some(description) = &self.description {
            feature.description = description.clone();
        }
        if let Some(priority) = self.priority {
            feature.priority = priority;
        }
        if let Some(complexity) = self.complexity {
            feature.complexity = complexity;
        }
        if let Some(agent) = &self.assigned_agent {
            feature.assigned_agent = agent.clone();
        }
        if let Some(tags) = &self.tags {
            feature.tags = tags.clone();
        }
    }

    /// Put back `before`'s value for every field this update set, skipping
    /// fields that have changed again since
    ///
    /// Status is left to the store.
    pub(crate) fn revert_fields(&self, before: &Feature, feature: &mut Feature) {
        if let Some(title) = &self.title
            && &feature.title == title
        {
            feature.title = before.title.clone();
        }
        if let Some(description) = &self.description
            && &feature.description == description
        {
            feature.description = before.description.clone();
        }
        if self.priority == Some(feature.priority) {
            feature.priority = before.priority;
        }
        if self.complexity == Some(feature.complexity) {
            feature.complexity = before.complexity;
        }
        if let Some(agent) = &self.assigned_agent
            && &feature.assigned_agent == agent
        {
            feature.assigned_agent = before.assigned_agent.clone();
        }
        if let Some(tags) = &self.tags
            && &feature.tags == tags
        {
            feature.tags = before.tags.clone();
        }
    }
}

/// Input for creating a feature through the backend
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFeature {
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewFeature {
    /// Build the local provisional feature shown until the backend answers
    pub fn to_provisional(&self) -> Feature {
        Feature::new(self.title.clone())
            .with_description(self.description.clone())
            .with_priority(self.priority)
            .with_complexity(self.complexity)
            .with_tags(self.tags.clone())
    }
}
