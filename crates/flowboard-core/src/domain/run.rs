//! Execution run aggregate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::status::{ExecutionStatus, TaskStatus};
use super::task::Task;

/// Global state of one kanban execution session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRun {
    pub status: ExecutionStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_tasks: usize,
    pub completed_count: usize,
    pub failed_count: usize,
    pub in_progress_count: usize,
    pub current_task_id: Option<String>,
}

impl ExecutionRun {
    /// Recompute every aggregate from the task list
    pub fn recount(&mut self, tasks: &[Task]) {
        let count = |status: TaskStatus| tasks.iter().filter(|t| t.status == status).count();

        self.total_tasks = tasks.len();
        self.completed_count = count(TaskStatus::Completed);
        self.failed_count = count(TaskStatus::Failed);
        self.in_progress_count = count(TaskStatus::InProgress);

        if let Some(current) = &self.current_task_id
            && !tasks
                .iter()
                .any(|t| &t.id == current && t.status.is_active())
        {
            self.current_task_id = None;
        }
    }

    /// Completed tasks as a percentage of all tasks
    pub fn percent_complete(&self) -> u8 {
        if self.total_tasks == 0 {
            return 0;
        }
        ((self.completed_count * 100) / self.total_tasks) as u8
    }

    pub fn is_running(&self) -> bool {
        self.status == ExecutionStatus::Running
    }
}
