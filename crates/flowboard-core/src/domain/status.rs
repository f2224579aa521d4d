//! Status vocabulary shared by the board and the execution pipeline
//!
//! One canonical enum per status domain, plus the legal task and run
//! transition tables.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Kanban column a feature sits in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureStatus {
    #[default]
    Backlog,
    Planning,
    InProgress,
    AiReview,
    HumanReview,
    Done,
}

impl FeatureStatus {
    /// All columns in board order
    pub fn all() -> [FeatureStatus; 6] {
        [
            Self::Backlog,
            Self::Planning,
            Self::InProgress,
            Self::AiReview,
            Self::HumanReview,
            Self::Done,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backlog => "backlog",
            Self::Planning => "planning",
            Self::InProgress => "in_progress",
            Self::AiReview => "ai_review",
            Self::HumanReview => "human_review",
            Self::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "backlog" => Some(Self::Backlog),
            "planning" => Some(Self::Planning),
            "in_progress" => Some(Self::InProgress),
            "ai_review" => Some(Self::AiReview),
            "human_review" => Some(Self::HumanReview),
            "done" => Some(Self::Done),
            _ => None,
        }
    }

    /// Human-readable column title
    pub fn label(&self) -> &'static str {
        match self {
            Self::Backlog => "Backlog",
            Self::Planning => "Planning",
            Self::InProgress => "In Progress",
            Self::AiReview => "AI Review",
            Self::HumanReview => "Human Review",
            Self::Done => "Done",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done)
    }
}

impl fmt::Display for FeatureStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle state of a single task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TaskStatus {
    #[default]
    Pending,
    Ready,
    Queued,
    InProgress,
    AiReview,
    HumanReview,
    Blocked,
    Completed,
    Failed,
    Cancelled,
}

impl TaskStatus {
    pub fn all() -> [TaskStatus; 10] {
        [
            Self::Pending,
            Self::Ready,
            Self::Queued,
            Self::InProgress,
            Self::AiReview,
            Self::HumanReview,
            Self::Blocked,
            Self::Completed,
            Self::Failed,
            Self::Cancelled,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Queued => "queued",
            Self::InProgress => "in-progress",
            Self::AiReview => "ai-review",
            Self::HumanReview => "human-review",
            Self::Blocked => "blocked",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "ready" => Some(Self::Ready),
            "queued" => Some(Self::Queued),
            "in-progress" => Some(Self::InProgress),
            "ai-review" => Some(Self::AiReview),
            "human-review" => Some(Self::HumanReview),
            "blocked" => Some(Self::Blocked),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "cancelled" => Some(Self::Cancelled),
            _ => None,
        }
    }

    /// Completed and cancelled tasks only leave via reopen
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Currently being worked on by an agent or a reviewer
    pub fn is_active(&self) -> bool {
        matches!(self, Self::InProgress | Self::AiReview | Self::HumanReview)
    }

    /// Check whether `self -> to` is a legal transition
    pub fn can_transition_to(&self, to: TaskStatus) -> bool {
        is_valid_transition(*self, to)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The task transition table
///
/// Same-status requests are not transitions and are rejected here; callers
/// treat them as no-ops before consulting the table.
pub fn is_valid_transition(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;

    matches!(
        (from, to),
        (Pending, Ready)
            | (Pending, Blocked)
            | (Ready, Queued)
            | (Queued, InProgress)
            | (InProgress, AiReview)
            | (InProgress, Failed)
            | (AiReview, HumanReview)
            | (HumanReview, Completed)
            | (Failed, Pending)
            | (Failed, Cancelled)
            | (Blocked, Pending)
            | (Blocked, Cancelled)
            | (Completed, Pending)
            | (Cancelled, Pending)
    )
}

/// Feature priority, highest first
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::High => "high",
            Self::Medium => "medium",
            Self::Low => "low",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "critical" => Some(Self::Critical),
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "low" => Some(Self::Low),
            _ => None,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Complexity {
    Simple,
    #[default]
    Moderate,
    Complex,
}

impl Complexity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Moderate => "moderate",
            Self::Complex => "complex",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "simple" => Some(Self::Simple),
            "moderate" => Some(Self::Moderate),
            "complex" => Some(Self::Complex),
            _ => None,
        }
    }
}

impl fmt::Display for Complexity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Agent role a task can be assigned to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AgentRole {
    Planner,
    Coder,
    QaReviewer,
    QaFixer,
}

impl AgentRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Planner => "planner",
            Self::Coder => "coder",
            Self::QaReviewer => "qa-reviewer",
            Self::QaFixer => "qa-fixer",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "planner" => Some(Self::Planner),
            "coder" => Some(Self::Coder),
            "qa-reviewer" => Some(Self::QaReviewer),
            "qa-fixer" => Some(Self::QaFixer),
            _ => None,
        }
    }

    /// Role that normally drives a task through the given status
    pub fn for_status(status: TaskStatus) -> Option<Self> {
        match status {
            TaskStatus::InProgress => Some(Self::Coder),
            TaskStatus::AiReview => Some(Self::QaReviewer),
            _ => None,
        }
    }
}

impl fmt::Display for AgentRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Global state of an execution run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    #[default]
    Idle,
    Planning,
    Ready,
    Running,
    Paused,
    Completed,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Planning => "planning",
            Self::Ready => "ready",
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "planning" => Some(Self::Planning),
            "ready" => Some(Self::Ready),
            "running" => Some(Self::Running),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, to: ExecutionStatus) -> bool {
        use ExecutionStatus::*;

        matches!(
            (*self, to),
            (Idle, Planning)
                | (Idle, Running)
                | (Planning, Ready)
                | (Planning, Failed)
                | (Ready, Running)
                | (Running, Paused)
                | (Running, Completed)
                | (Running, Failed)
                | (Paused, Running)
                | (Paused, Failed)
                | (Completed, Idle)
                | (Failed, Idle)
        )
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_status_parse() {
        for status in FeatureStatus::all() {
            assert_eq!(FeatureStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(FeatureStatus::parse("in-progress"), None);
    }

    #[test]
    fn test_task_status_wire_spelling() {
        let json = serde_json::to_string(&TaskStatus::HumanReview).unwrap();
        assert_eq!(json, "\"human-review\"");
        let json = serde_json::to_string(&FeatureStatus::HumanReview).unwrap();
        assert_eq!(json, "\"human_review\"");
    }

    #[test]
    fn test_happy_path_transitions() {
        use TaskStatus::*;
        let path = [Pending, Ready, Queued, InProgress, AiReview, HumanReview, Completed];
        for pair in path.windows(2) {
            assert!(is_valid_transition(pair[0], pair[1]), "{} -> {}", pair[0], pair[1]);
        }
    }

    #[test]
    fn test_rejected_transitions() {
        use TaskStatus::*;
        assert!(!is_valid_transition(Pending, Completed));
        assert!(!is_valid_transition(Ready, InProgress));
        assert!(!is_valid_transition(Completed, Failed));
        assert!(!is_valid_transition(Cancelled, Ready));
        assert!(!is_valid_transition(InProgress, InProgress));
        assert!(!is_valid_transition(HumanReview, AiReview));
    }

    #[test]
    fn test_terminal_states_only_reopen() {
        for from in [TaskStatus::Completed, TaskStatus::Cancelled] {
            let exits: Vec<_> = TaskStatus::all()
                .into_iter()
                .filter(|to| is_valid_transition(from, *to))
                .collect();
            assert_eq!(exits, vec![TaskStatus::Pending]);
        }
    }

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::Critical < Priority::High);
        assert!(Priority::Medium < Priority::Low);
    }

    #[test]
    fn test_run_transitions() {
        assert!(ExecutionStatus::Idle.can_transition_to(ExecutionStatus::Running));
        assert!(ExecutionStatus::Paused.can_transition_to(ExecutionStatus::Running));
        assert!(!ExecutionStatus::Completed.can_transition_to(ExecutionStatus::Running));
        assert!(ExecutionStatus::Failed.can_transition_to(ExecutionStatus::Idle));
    }
}
