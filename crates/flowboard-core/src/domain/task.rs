//! Task entity executed by agents
//!
//! A task belongs to a feature by back-reference only. Its `blocked_by` set is
//! derived from `depends_on` by the execution store and never set by hand.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::status::{AgentRole, Complexity, Priority, TaskStatus};

/// Severity of a task log line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "debug" => Some(Self::Debug),
            "info" => Some(Self::Info),
            "warn" | "warning" => Some(Self::Warn),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskLog {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskError {
    pub id: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub recoverable: bool,
    #[serde(default)]
    pub resolved: bool,
}

/// One immutable audit record of a status change
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusHistoryEntry {
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_status: Option<TaskStatus>,
    pub to_status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// A decomposed unit of work inside a feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    /// Owning feature (back-reference only)
    pub feature_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub acceptance_criteria: Vec<String>,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub complexity: Complexity,
    #[serde(default)]
    pub estimated_minutes: Option<u32>,
    #[serde(default)]
    pub actual_minutes: Option<u32>,
    #[serde(default)]
    pub status: TaskStatus,
    /// Upstream tasks that must complete first
    #[serde(default)]
    pub depends_on: Vec<String>,
    /// Derived: dependencies that are not yet completed
    #[serde(default)]
    pub blocked_by: Vec<String>,
    #[serde(default)]
    pub assigned_agent: Option<AgentRole>,
    #[serde(default)]
    pub progress: u8,
    #[serde(default)]
    pub files_to_create: BTreeSet<String>,
    #[serde(default)]
    pub files_to_modify: BTreeSet<String>,
    #[serde(default)]
    pub files_created: BTreeSet<String>,
    #[serde(default)]
    pub files_modified: BTreeSet<String>,
    #[serde(default)]
    pub logs: Vec<TaskLog>,
    #[serde(default)]
    pub errors: Vec<TaskError>,
    #[serde(default)]
    pub retry_count: u32,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub qa_iterations: u32,
    #[serde(default = "default_max_qa_iterations")]
    pub max_qa_iterations: u32,
    #[serde(default)]
    pub status_history: Vec<StatusHistoryEntry>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_max_retries() -> u32 {
    3
}

fn default_max_qa_iterations() -> u32 {
    3
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        feature_id: impl Into<String>,
        title: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            feature_id: feature_id.into(),
            title: title.into(),
            description: String::new(),
            acceptance_criteria: Vec::new(),
            priority: Priority::Medium,
            complexity: Complexity::Moderate,
            estimated_minutes: None,
            actual_minutes: None,
            status: TaskStatus::Pending,
            depends_on: Vec::new(),
            blocked_by: Vec::new(),
            assigned_agent: None,
            progress: 0,
            files_to_create: BTreeSet::new(),
            files_to_modify: BTreeSet::new(),
            files_created: BTreeSet::new(),
            files_modified: BTreeSet::new(),
            logs: Vec::new(),
            errors: Vec::new(),
            retry_count: 0,
            max_retries: default_max_retries(),
            qa_iterations: 0,
            max_qa_iterations: default_max_qa_iterations(),
            status_history: Vec::new(),
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Add a dependency (duplicates are ignored)
    pub fn with_dependency(mut self, task_id: impl Into<String>) -> Self {
        let task_id = task_id.into();
        if !self.depends_on.contains(&task_id) {
            self.depends_on.push(task_id);
        }
        self
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_acceptance_criteria(mut self, criteria: Vec<String>) -> Self {
        self.acceptance_criteria = criteria;
        self
    }

    pub fn with_agent(mut self, agent: AgentRole) -> Self {
        self.assigned_agent = Some(agent);
        self
    }

    /// Generate a fresh task id
    pub fn generate_id() -> String {
        format!("task-{}", Uuid::new_v4().simple())
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Set the status and append exactly one history entry
    pub(crate) fn record_transition(
        &mut self,
        to: TaskStatus,
        agent_id: Option<String>,
        reason: Option<String>,
    ) {
        let from = self.status;
        self.status = to;
        self.status_history.push(StatusHistoryEntry {
            timestamp: Utc::now(),
            from_status: Some(from),
            to_status: to,
            agent_id,
            reason,
        });
        self.touch();
    }

    pub(crate) fn push_log(
        &mut self,
        level: LogLevel,
        message: impl Into<String>,
        phase: Option<String>,
        details: Option<serde_json::Value>,
    ) {
        self.logs.push(TaskLog {
            timestamp: Utc::now(),
            level,
            message: message.into(),
            phase,
            details,
        });
    }

    /// Unresolved errors, oldest first
    pub fn open_errors(&self) -> impl Iterator<Item = &TaskError> {
        self.errors.iter().filter(|e| !e.resolved)
    }

    pub fn can_retry(&self) -> bool {
        self.retry_count < self.max_retries
    }
}

/// Partial update of a task; `None` leaves the field untouched
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acceptance_criteria: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub complexity: Option<Complexity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual_minutes: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assigned_agent: Option<AgentRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_to_create: Option<BTreeSet<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub files_to_modify: Option<BTreeSet<String>>,
    /// Acting agent, recorded in the status history
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,
    /// Why the status changed, recorded in the status history
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl TaskUpdate {
    pub fn status(status: TaskStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn progress(progress: u8) -> Self {
        Self {
            progress: Some(progress),
            ..Default::default()
        }
    }

    pub fn by_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn because(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Apply every non-status field
    pub(crate) fn apply_fields(&self, task: &mut Task) {
        if let Some(title) = &self.title {
            task.title = title.clone();
        }
        if let Some(description) = &self.description {
            task.description = description.clone();
        }
        if let Some(criteria) = &self.acceptance_criteria {
            task.acceptance_criteria = criteria.clone();
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(complexity) = self.complexity {
            task.complexity = complexity;
        }
        if let Some(minutes) = self.estimated_minutes {
            task.estimated_minutes = Some(minutes);
        }
        if let Some(minutes) = self.actual_minutes {
            task.actual_minutes = Some(minutes);
        }
        if let Some(depends_on) = &self.depends_on {
            task.depends_on = dedup(depends_on);
        }
        if let Some(agent) = self.assigned_agent {
            task.assigned_agent = Some(agent);
        }
        if let Some(progress) = self.progress {
            task.progress = progress;
        }
        if let Some(files) = &self.files_to_create {
            task.files_to_create = files.clone();
        }
        if let Some(files) = &self.files_to_modify {
            task.files_to_modify = files.clone();
        }
    }

    /// Put back `before`'s value for every non-status field this update set,
    /// skipping fields that have changed again since
    pub(crate) fn revert_fields(&self, before: &Task, task: &mut Task) {
        if let Some(title) = &self.title
            && &task.title == title
        {
            task.title = before.title.clone();
        }
        if let Some(description) = &self.description
            && &task.description == description
        {
            task.description = before.description.clone();
        }
        if let Some(criteria) = &self.acceptance_criteria
            && &task.acceptance_criteria == criteria
        {
            task.acceptance_criteria = before.acceptance_criteria.clone();
        }
        if self.priority == Some(task.priority) {
            task.priority = before.priority;
        }
        if self.complexity == Some(task.complexity) {
            task.complexity = before.complexity;
        }
        if self.estimated_minutes.is_some() && self.estimated_minutes == task.estimated_minutes {
            task.estimated_minutes = before.estimated_minutes;
        }
        if self.actual_minutes.is_some() && self.actual_minutes == task.actual_minutes {
            task.actual_minutes = before.actual_minutes;
        }
        if let Some(depends_on) = &self.depends_on
            && task.depends_on == dedup(depends_on)
        {
            task.depends_on = before.depends_on.clone();
        }
        if self.assigned_agent.is_some() && self.assigned_agent == task.assigned_agent {
            task.assigned_agent = before.assigned_agent;
        }
        if self.progress == Some(task.progress) {
            task.progress = before.progress;
        }
        if let Some(files) = &self.files_to_create
            && &task.files_to_create == files
        {
            task.files_to_create = before.files_to_create.clone();
        }
        if let Some(files) = &self.files_to_modify
            && &task.files_to_modify == files
        {
            task.files_to_modify = before.files_to_modify.clone();
        }
    }
}

/// Drop repeated ids, keeping first occurrence order
pub(crate) fn dedup(ids: &[String]) -> Vec<String> {
    let mut seen = BTreeSet::new();
    ids.iter()
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_new_defaults() {
        let task = Task::new("t1", "f1", "Write migration");
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.max_retries, 3);
        assert_eq!(task.max_qa_iterations, 3);
        assert!(task.status_history.is_empty());
    }

    #[test]
    fn test_with_dependency_ignores_duplicates() {
        let task = Task::new("t2", "f1", "Wire API")
            .with_dependency("t1")
            .with_dependency("t1");
        assert_eq!(task.depends_on, vec!["t1".to_string()]);
    }

    #[test]
    fn test_record_transition_appends_history() {
        let mut task = Task::new("t1", "f1", "Build");
        task.record_transition(TaskStatus::Ready, Some("planner-1".into()), None);

        assert_eq!(task.status, TaskStatus::Ready);
        assert_eq!(task.status_history.len(), 1);
        let entry = &task.status_history[0];
        assert_eq!(entry.from_status, Some(TaskStatus::Pending));
        assert_eq!(entry.to_status, TaskStatus::Ready);
        assert_eq!(entry.agent_id.as_deref(), Some("planner-1"));
    }

    #[test]
    fn test_update_dedups_dependencies() {
        let mut task = Task::new("t3", "f1", "Docs");
        let update = TaskUpdate {
            depends_on: Some(vec!["a".into(), "b".into(), "a".into()]),
            ..Default::default()
        };
        update.apply_fields(&mut task);
        assert_eq!(task.depends_on, vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_revert_fields_restores_only_what_the_update_set() {
        let before = Task::new("t1", "f1", "Schema");
        let update = TaskUpdate {
            title: Some("Schema v2".into()),
            progress: Some(40),
            ..Default::default()
        };
        let mut task = before.clone();
        update.apply_fields(&mut task);
        task.progress = 60;
        task.description = "edited elsewhere".into();

        update.revert_fields(&before, &mut task);
        assert_eq!(task.title, "Schema");
        assert_eq!(task.progress, 60);
        assert_eq!(task.description, "edited elsewhere");
    }

    #[test]
    fn test_deserialize_minimal_task() {
        let json = serde_json::json!({
            "id": "t1",
            "featureId": "f1",
            "title": "Minimal",
            "status": "in-progress",
            "createdAt": "2026-01-01T00:00:00Z",
            "updatedAt": "2026-01-01T00:00:00Z"
        });
        let task: Task = serde_json::from_value(json).unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.max_retries, 3);
    }
}
