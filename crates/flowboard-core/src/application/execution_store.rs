//! Execution store
//!
//! Owns the task collection and the execution run. Status changes are
//! validated against the transition table, every applied change appends one
//! history entry, and all derived state (`blocked_by`, run aggregates) is
//! recomputed from scratch after each mutation.

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::ordering::reorder_subsequence;
use super::validators::TaskValidator;
use crate::config::ExecutionConfig;
use crate::domain::dependency::{
    self, BlockedState, TaskIndex, compute_blocked, failed_dependencies,
};
use crate::domain::{
    AgentRole, ExecutionRun, ExecutionStatus, LogLevel, Task, TaskError, TaskStatus, TaskSummary,
    TaskUpdate,
};
use crate::error::{Error, Result};

/// History reason for tasks blocked by an upstream failure
pub const DEPENDENCY_FAILED: &str = "dependency failed";

/// History reason for changes pushed by the backend
pub const BACKEND_SYNC: &str = "backend sync";

/// What an optimistic task update needs to take itself back
#[derive(Debug, Clone)]
pub struct TaskCheckpoint {
    before: Task,
    applied: TaskUpdate,
    applied_status: TaskStatus,
    dependents: Vec<(String, TaskStatus)>,
    run: ExecutionRun,
}

/// Task collection plus the run that executes it
#[derive(Debug, Clone)]
pub struct ExecutionStore {
    tasks: Vec<Task>,
    run: ExecutionRun,
    max_retries: u32,
    max_qa_iterations: u32,
}

impl Default for ExecutionStore {
    fn default() -> Self {
        Self::new(&ExecutionConfig::default())
    }
}

impl ExecutionStore {
    pub fn new(config: &ExecutionConfig) -> Self {
        Self {
            tasks: Vec::new(),
            run: ExecutionRun::default(),
            max_retries: config.max_retries,
            max_qa_iterations: config.max_qa_iterations,
        }
    }

    // ========== Reads ==========

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn run(&self) -> &ExecutionRun {
        &self.run
    }

    /// Resolver view of one task
    pub fn blocked_state(&self, id: &str) -> Option<BlockedState> {
        let index = TaskIndex::new(&self.tasks);
        self.get(id).map(|task| compute_blocked(task, &index))
    }

    /// Tasks that list `id` as a dependency
    pub fn downstream(&self, id: &str) -> Vec<String> {
        dependency::downstream_of(id, &self.tasks)
    }

    /// Tasks in one status, in board order
    pub fn column(&self, status: TaskStatus) -> Vec<&Task> {
        self.tasks.iter().filter(|t| t.status == status).collect()
    }

    pub fn tasks_for_feature(&self, feature_id: &str) -> Vec<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.feature_id == feature_id)
            .collect()
    }

    /// Card summaries for a feature's embedded task list
    pub fn summaries_for(&self, feature_id: &str) -> Vec<TaskSummary> {
        self.tasks_for_feature(feature_id)
            .into_iter()
            .map(|t| TaskSummary {
                id: t.id.clone(),
                title: t.title.clone(),
                status: t.status,
            })
            .collect()
    }

    /// Highest-priority ready task; list order breaks ties
    pub fn next_task(&self) -> Option<&Task> {
        self.tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Ready)
            .min_by_key(|t| t.priority)
    }

    // ========== Collection ==========

    /// Add a task; it inherits the configured retry and QA limits
    pub fn add_task(&mut self, mut task: Task) -> Result<()> {
        TaskValidator::validate_task(&task)?;
        if self.get(&task.id).is_some() {
            return Err(Error::DuplicateTask(task.id));
        }
        dependency::validate_dependencies(&task.id, &task.depends_on, &self.tasks)?;

        task.max_retries = self.max_retries;
        task.max_qa_iterations = self.max_qa_iterations;

        info!(task_id = %task.id, feature_id = %task.feature_id, "Task added");
        self.tasks.push(task);
        self.refresh();
        Ok(())
    }

    /// Replace the whole collection, keeping each task's own limits
    pub fn load_tasks(&mut self, tasks: Vec<Task>) -> Result<()> {
        let mut seen = std::collections::HashSet::new();
        for task in &tasks {
            TaskValidator::validate_task(task)?;
            if !seen.insert(task.id.clone()) {
                return Err(Error::DuplicateTask(task.id.clone()));
            }
        }
        dependency::validate_graph(&tasks)?;

        self.tasks = tasks;
        self.refresh();
        Ok(())
    }

    /// Remove a task nobody depends on
    pub fn remove_task(&mut self, id: &str) -> Result<Task> {
        let index = self.index_of(id)?;
        let dependents = self.downstream(id);
        if !dependents.is_empty() {
            return Err(Error::HasDependents(id.to_string(), dependents));
        }

        let task = self.tasks.remove(index);
        info!(task_id = %id, "Task removed");
        self.refresh();
        Ok(task)
    }

    // ========== Status changes ==========

    /// Apply a partial update, validating any status change first
    ///
    /// Rejected updates leave the store untouched.
    pub fn update_task(&mut self, id: &str, update: &TaskUpdate) -> Result<()> {
        TaskValidator::validate_update(update)?;
        let index = self.index_of(id)?;

        if let Some(depends_on) = &update.depends_on {
            dependency::validate_dependencies(id, depends_on, &self.tasks)?;
        }

        let current = self.tasks[index].status;
        let target = update.status.filter(|s| *s != current);
        if let Some(target) = target {
            self.check_transition(index, target, update.depends_on.as_deref())?;
        }

        let task = &mut self.tasks[index];
        update.apply_fields(task);
        task.touch();

        if let Some(target) = target {
            self.transition(index, target, update.agent_id.clone(), update.reason.clone());
        }
        self.refresh();
        Ok(())
    }

    /// Move a ready (or queued) task into progress
    pub fn start_task(&mut self, id: &str, agent_id: Option<String>) -> Result<()> {
        let index = self.index_of(id)?;
        let task = &self.tasks[index];

        match task.status {
            TaskStatus::Ready | TaskStatus::Queued if task.blocked_by.is_empty() => {}
            status => return Err(invalid(id, status, TaskStatus::InProgress)),
        }

        if task.status == TaskStatus::Ready {
            self.transition(index, TaskStatus::Queued, agent_id.clone(), None);
        }
        self.transition(index, TaskStatus::InProgress, agent_id, None);
        self.refresh();
        Ok(())
    }

    /// Cancel a failed or blocked task
    pub fn cancel_task(&mut self, id: &str) -> Result<()> {
        self.set_status(id, TaskStatus::Cancelled, Some("cancelled".to_string()))
    }

    /// Skip a failed or blocked task
    pub fn skip_task(&mut self, id: &str) -> Result<()> {
        self.set_status(id, TaskStatus::Cancelled, Some("skipped".to_string()))
    }

    /// Send a failed task back to pending
    pub fn retry_task(&mut self, id: &str) -> Result<()> {
        let index = self.index_of(id)?;
        let task = &self.tasks[index];

        if task.status != TaskStatus::Failed {
            return Err(invalid(id, task.status, TaskStatus::Pending));
        }
        if !task.can_retry() {
            warn!(task_id = %id, retries = task.retry_count, "Retry limit reached");
            return Err(Error::RetryLimitReached(id.to_string(), task.max_retries));
        }

        let task = &mut self.tasks[index];
        task.retry_count += 1;
        task.errors.clear();
        task.progress = 0;
        task.completed_at = None;
        let reason = format!("retry {}", task.retry_count);
        self.transition(index, TaskStatus::Pending, None, Some(reason));

        self.release_blocked_downstream(id);
        self.refresh();
        Ok(())
    }

    /// Reopen a completed or cancelled task
    pub fn reopen_task(&mut self, id: &str) -> Result<()> {
        let index = self.index_of(id)?;
        let status = self.tasks[index].status;
        if !status.is_terminal() {
            return Err(invalid(id, status, TaskStatus::Pending));
        }

        let task = &mut self.tasks[index];
        task.completed_at = None;
        task.progress = 0;
        self.transition(index, TaskStatus::Pending, None, Some("reopened".to_string()));
        self.refresh();
        Ok(())
    }

    /// Return a blocked task to pending once no dependency has failed
    pub fn unblock_task(&mut self, id: &str) -> Result<()> {
        let index = self.index_of(id)?;
        let task = &self.tasks[index];
        if task.status != TaskStatus::Blocked {
            return Err(invalid(id, task.status, TaskStatus::Pending));
        }

        let failed = failed_dependencies(task, &TaskIndex::new(&self.tasks));
        if !failed.is_empty() {
            debug!(task_id = %id, ?failed, "Dependencies still failed");
            return Err(invalid(id, TaskStatus::Blocked, TaskStatus::Pending));
        }

        self.transition(index, TaskStatus::Pending, None, Some("unblocked".to_string()));
        self.refresh();
        Ok(())
    }

    /// Move every pending task whose dependencies are complete to ready
    pub fn promote_ready(&mut self) -> Vec<String> {
        let promoted = dependency::ready_candidates(&self.tasks);
        for id in &promoted {
            if let Some(index) = self.tasks.iter().position(|t| &t.id == id) {
                self.transition(
                    index,
                    TaskStatus::Ready,
                    None,
                    Some("dependencies met".to_string()),
                );
            }
        }
        if !promoted.is_empty() {
            info!(count = promoted.len(), "Tasks promoted to ready");
            self.refresh();
        }
        promoted
    }

    fn set_status(&mut self, id: &str, to: TaskStatus, reason: Option<String>) -> Result<()> {
        let index = self.index_of(id)?;
        self.check_transition(index, to, None)?;
        self.transition(index, to, None, reason);
        self.refresh();
        Ok(())
    }

    /// Validate `tasks[index] -> to` without mutating
    fn check_transition(
        &self,
        index: usize,
        to: TaskStatus,
        depends_on: Option<&[String]>,
    ) -> Result<()> {
        let task = &self.tasks[index];
        if !task.status.can_transition_to(to) {
            warn!(task_id = %task.id, from = %task.status, to = %to, "Invalid transition refused");
            return Err(invalid(&task.id, task.status, to));
        }

        if to == TaskStatus::Ready {
            let index = TaskIndex::new(&self.tasks);
            let deps = depends_on.unwrap_or(&task.depends_on);
            let blocked = deps.iter().any(|dep| {
                index
                    .status_of(dep)
                    .is_some_and(|s| s != TaskStatus::Completed)
            });
            if blocked {
                warn!(task_id = %task.id, "Task has incomplete dependencies");
                return Err(invalid(&task.id, task.status, to));
            }
        }
        Ok(())
    }

    /// Apply a validated status change and its side effects
    fn transition(
        &mut self,
        index: usize,
        to: TaskStatus,
        agent_id: Option<String>,
        reason: Option<String>,
    ) {
        let now = Utc::now();
        let task = &mut self.tasks[index];
        let from = task.status;
        task.record_transition(to, agent_id, reason);

        match to {
            TaskStatus::InProgress => {
                task.started_at.get_or_insert(now);
                if task.assigned_agent.is_none() {
                    task.assigned_agent = AgentRole::for_status(to);
                }
                self.run.current_task_id = Some(task.id.clone());
            }
            TaskStatus::AiReview => {
                task.assigned_agent = Some(AgentRole::QaReviewer);
            }
            TaskStatus::Completed => {
                task.completed_at = Some(now);
                task.progress = 100;
            }
            _ => {}
        }

        info!(task_id = %task.id, from = %from, to = %to, "Task status changed");

        if to == TaskStatus::Failed {
            let failed_id = task.id.clone();
            self.block_downstream(&failed_id);
        }
    }

    /// Pending dependents of a failed task become blocked
    fn block_downstream(&mut self, failed_id: &str) {
        let reason = format!("{}: {}", DEPENDENCY_FAILED, failed_id);
        for id in self.downstream(failed_id) {
            if let Some(index) = self
                .tasks
                .iter()
                .position(|t| t.id == id && t.status == TaskStatus::Pending)
            {
                self.tasks[index].record_transition(
                    TaskStatus::Blocked,
                    None,
                    Some(reason.clone()),
                );
                info!(task_id = %id, upstream = %failed_id, "Task blocked by failed dependency");
            }
        }
    }

    /// Tasks blocked only because `id` had failed go back to pending
    fn release_blocked_downstream(&mut self, id: &str) {
        for dependent in self.downstream(id) {
            let Some(index) = self.tasks.iter().position(|t| t.id == dependent) else {
                continue;
            };
            let task = &self.tasks[index];
            let auto_blocked = task.status == TaskStatus::Blocked
                && task
                    .status_history
                    .last()
                    .and_then(|e| e.reason.as_deref())
                    .is_some_and(|r| r.starts_with(DEPENDENCY_FAILED));
            if auto_blocked && failed_dependencies(task, &TaskIndex::new(&self.tasks)).is_empty() {
                self.tasks[index].record_transition(
                    TaskStatus::Pending,
                    None,
                    Some("dependency retried".to_string()),
                );
            }
        }
    }

    // ========== Task details ==========

    pub fn add_log(
        &mut self,
        id: &str,
        level: LogLevel,
        message: impl Into<String>,
        phase: Option<String>,
        details: Option<serde_json::Value>,
    ) -> Result<()> {
        let task = self.task_mut(id)?;
        task.push_log(level, message, phase, details);
        Ok(())
    }

    /// Record an error, returning its id
    pub fn add_error(
        &mut self,
        id: &str,
        message: impl Into<String>,
        stack: Option<String>,
        recoverable: bool,
    ) -> Result<String> {
        let task = self.task_mut(id)?;
        let message = message.into();
        let error_id = format!("err-{}", Uuid::new_v4().simple());

        task.push_log(LogLevel::Error, message.clone(), None, None);
        task.errors.push(TaskError {
            id: error_id.clone(),
            message,
            stack,
            timestamp: Utc::now(),
            recoverable,
            resolved: false,
        });
        task.touch();
        Ok(error_id)
    }

    pub fn resolve_error(&mut self, id: &str, error_id: &str) -> Result<()> {
        let task = self.task_mut(id)?;
        let error = task
            .errors
            .iter_mut()
            .find(|e| e.id == error_id)
            .ok_or_else(|| {
                Error::InvalidInput(format!("Error '{}' not found on task '{}'", error_id, id))
            })?;
        error.resolved = true;
        task.touch();
        Ok(())
    }

    pub fn update_progress(&mut self, id: &str, progress: u8) -> Result<()> {
        TaskValidator::validate_progress(progress)?;
        let task = self.task_mut(id)?;
        task.progress = progress;
        task.touch();
        Ok(())
    }

    pub fn record_file_created(&mut self, id: &str, path: impl Into<String>) -> Result<()> {
        let task = self.task_mut(id)?;
        task.files_created.insert(path.into());
        task.touch();
        Ok(())
    }

    pub fn record_file_modified(&mut self, id: &str, path: impl Into<String>) -> Result<()> {
        let task = self.task_mut(id)?;
        task.files_modified.insert(path.into());
        task.touch();
        Ok(())
    }

    /// Count one more QA round, refusing past the task's limit
    pub fn record_qa_iteration(&mut self, id: &str) -> Result<u32> {
        let task = self.task_mut(id)?;
        if task.qa_iterations >= task.max_qa_iterations {
            return Err(Error::QaLimitReached(id.to_string(), task.max_qa_iterations));
        }
        task.qa_iterations += 1;
        task.touch();
        Ok(task.qa_iterations)
    }

    /// Reorder within one task column
    pub fn reorder(&mut self, column: TaskStatus, old_index: usize, new_index: usize) -> bool {
        reorder_subsequence(&mut self.tasks, |t| t.status == column, old_index, new_index)
    }

    // ========== Run control ==========

    pub fn plan_execution(&mut self) -> Result<()> {
        self.set_run_status(ExecutionStatus::Planning)
    }

    pub fn mark_ready(&mut self) -> Result<()> {
        self.set_run_status(ExecutionStatus::Ready)
    }

    /// Start the run and promote every task that can go
    pub fn start_execution(&mut self) -> Result<()> {
        self.set_run_status(ExecutionStatus::Running)?;
        self.run.started_at = Some(Utc::now());
        self.run.completed_at = None;
        self.promote_ready();
        self.refresh();
        Ok(())
    }

    pub fn pause_execution(&mut self) -> Result<()> {
        self.set_run_status(ExecutionStatus::Paused)
    }

    pub fn resume_execution(&mut self) -> Result<()> {
        if self.run.status != ExecutionStatus::Paused {
            return Err(Error::InvalidRunTransition {
                from: self.run.status.to_string(),
                to: ExecutionStatus::Running.to_string(),
            });
        }
        self.set_run_status(ExecutionStatus::Running)
    }

    pub fn fail_execution(&mut self) -> Result<()> {
        self.set_run_status(ExecutionStatus::Failed)?;
        self.run.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Replace the run, e.g. when loading a saved board
    pub fn load_run(&mut self, run: ExecutionRun) {
        self.run = run;
        self.refresh();
    }

    /// Reset the run from any state; tasks are left as they are
    pub fn restart_execution(&mut self) {
        info!(from = %self.run.status, "Execution run reset");
        self.run = ExecutionRun::default();
        self.refresh();
    }

    fn set_run_status(&mut self, to: ExecutionStatus) -> Result<()> {
        let from = self.run.status;
        if !from.can_transition_to(to) {
            warn!(from = %from, to = %to, "Invalid run transition refused");
            return Err(Error::InvalidRunTransition {
                from: from.to_string(),
                to: to.to_string(),
            });
        }
        self.run.status = to;
        info!(from = %from, to = %to, "Execution run status changed");
        Ok(())
    }

    // ========== Sync support ==========

    /// Apply a backend push; the backend is authoritative, so the table is
    /// not consulted, but history is still recorded
    pub fn apply_remote(&mut self, id: &str, update: &TaskUpdate) -> Result<()> {
        let index = self.index_of(id)?;
        let task = &mut self.tasks[index];
        update.apply_fields(task);
        task.touch();

        if let Some(status) = update.status.filter(|s| *s != task.status) {
            let reason = update.reason.clone().unwrap_or_else(|| BACKEND_SYNC.to_string());
            self.transition(index, status, update.agent_id.clone(), Some(reason));
        }
        self.refresh();
        Ok(())
    }

    /// [`update_task`](ExecutionStore::update_task), returning what
    /// [`rollback`](ExecutionStore::rollback) needs to take it back
    pub fn update_task_undoable(
        &mut self,
        id: &str,
        update: &TaskUpdate,
    ) -> Result<TaskCheckpoint> {
        let index = self.index_of(id)?;
        let before = self.tasks[index].clone();
        let dependents = self
            .downstream(id)
            .into_iter()
            .filter_map(|dep| {
                let status = self.get(&dep)?.status;
                Some((dep, status))
            })
            .collect();
        let run = self.run.clone();

        self.update_task(id, update)?;
        Ok(TaskCheckpoint {
            applied_status: self.tasks[index].status,
            before,
            applied: update.clone(),
            dependents,
            run,
        })
    }

    /// Take back an update recorded by a checkpoint
    ///
    /// Only what the update itself changed is restored: its fields, its
    /// status change, the dependents it blocked and the run completion it
    /// triggered. History stays append-only; each status put back gets one
    /// entry with `reason`.
    pub fn rollback(
        &mut self,
        checkpoint: TaskCheckpoint,
        reason: impl Into<String>,
    ) -> Result<()> {
        let TaskCheckpoint {
            before,
            applied,
            applied_status,
            dependents,
            run,
        } = checkpoint;
        let reason = reason.into();
        let index = self.index_of(&before.id)?;

        let task = &mut self.tasks[index];
        applied.revert_fields(&before, task);
        if before.status != applied_status && task.status == applied_status {
            task.started_at = before.started_at;
            task.completed_at = before.completed_at;
            task.assigned_agent = before.assigned_agent;
            if applied.progress.is_none() {
                task.progress = before.progress;
            }
            task.record_transition(before.status, None, Some(reason.clone()));
        }
        task.touch();

        let cascade = format!("{}: {}", DEPENDENCY_FAILED, before.id);
        for (id, status) in dependents {
            let Some(dependent) = self.tasks.iter_mut().find(|t| t.id == id) else {
                continue;
            };
            let blocked_by_this = status != TaskStatus::Blocked
                && dependent.status == TaskStatus::Blocked
                && dependent
                    .status_history
                    .last()
                    .and_then(|e| e.reason.as_deref())
                    == Some(cascade.as_str());
            if blocked_by_this {
                dependent.record_transition(status, None, Some(reason.clone()));
                debug!(task_id = %id, upstream = %before.id, "Cascade block rolled back");
            }
        }

        if run.status != ExecutionStatus::Completed
            && self.run.status == ExecutionStatus::Completed
        {
            info!(status = %run.status, "Execution run completion rolled back");
            self.run.status = run.status;
            self.run.completed_at = run.completed_at;
        }
        if self.run.current_task_id.as_deref() == Some(before.id.as_str())
            && run.current_task_id.as_deref() != Some(before.id.as_str())
        {
            self.run.current_task_id = run.current_task_id;
        }

        self.refresh();
        Ok(())
    }

    // ========== Internals ==========

    fn index_of(&self, id: &str) -> Result<usize> {
        self.tasks
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))
    }

    fn task_mut(&mut self, id: &str) -> Result<&mut Task> {
        self.tasks
            .iter_mut()
            .find(|t| t.id == id)
            .ok_or_else(|| Error::TaskNotFound(id.to_string()))
    }

    /// Recompute derived state from the task list
    fn refresh(&mut self) {
        let blocked: Vec<Vec<String>> = {
            let index = TaskIndex::new(&self.tasks);
            self.tasks
                .iter()
                .map(|t| compute_blocked(t, &index).blocking_ids)
                .collect()
        };
        for (task, blocked_by) in self.tasks.iter_mut().zip(blocked) {
            task.blocked_by = blocked_by;
        }

        self.run.recount(&self.tasks);

        let all_done = !self.tasks.is_empty() && self.tasks.iter().all(|t| t.status.is_terminal());
        if self.run.is_running() && all_done {
            self.run.status = ExecutionStatus::Completed;
            self.run.completed_at = Some(Utc::now());
            info!(total = self.run.total_tasks, "Execution run completed");
        }
    }
}

fn invalid(id: &str, from: TaskStatus, to: TaskStatus) -> Error {
    Error::InvalidTransition {
        task_id: id.to_string(),
        from: from.to_string(),
        to: to.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Priority;

    fn store_with(tasks: Vec<Task>) -> ExecutionStore {
        let mut store = ExecutionStore::default();
        for task in tasks {
            store.add_task(task).unwrap();
        }
        store
    }

    fn drive_to_completion(store: &mut ExecutionStore, id: &str) {
        for status in [
            TaskStatus::Ready,
            TaskStatus::Queued,
            TaskStatus::InProgress,
            TaskStatus::AiReview,
            TaskStatus::HumanReview,
            TaskStatus::Completed,
        ] {
            store.update_task(id, &TaskUpdate::status(status)).unwrap();
        }
    }

    #[test]
    fn test_add_rejects_duplicates_and_cycles() {
        let mut store = store_with(vec![Task::new("a", "f", "A").with_dependency("b")]);
        assert!(matches!(
            store.add_task(Task::new("a", "f", "A again")),
            Err(Error::DuplicateTask(_))
        ));
        assert!(matches!(
            store.add_task(Task::new("b", "f", "B").with_dependency("a")),
            Err(Error::DependencyCycle(_))
        ));
        assert!(matches!(
            store.add_task(Task::new("c", "f", "C").with_dependency("c")),
            Err(Error::SelfDependency(_))
        ));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_blocked_by_tracks_completion() {
        let mut store = store_with(vec![
            Task::new("t1", "f", "First"),
            Task::new("t2", "f", "Second").with_dependency("t1"),
        ]);
        assert_eq!(store.get("t2").unwrap().blocked_by, vec!["t1".to_string()]);
        assert!(store.blocked_state("t2").unwrap().is_blocked);

        drive_to_completion(&mut store, "t1");
        assert!(store.get("t2").unwrap().blocked_by.is_empty());
        assert!(!store.blocked_state("t2").unwrap().is_blocked);

        store.reopen_task("t1").unwrap();
        assert_eq!(store.get("t2").unwrap().blocked_by, vec!["t1".to_string()]);
    }

    #[test]
    fn test_invalid_transition_leaves_task_untouched() {
        let mut store = store_with(vec![Task::new("t1", "f", "First")]);
        let before = store.get("t1").unwrap().clone();

        let update = TaskUpdate {
            status: Some(TaskStatus::Completed),
            title: Some("Renamed".to_string()),
            ..Default::default()
        };
        let err = store.update_task("t1", &update).unwrap_err();
        assert!(matches!(err, Error::InvalidTransition { .. }));
        assert_eq!(store.get("t1").unwrap(), &before);
    }

    #[test]
    fn test_ready_requires_completed_dependencies() {
        let mut store = store_with(vec![
            Task::new("t1", "f", "First"),
            Task::new("t2", "f", "Second").with_dependency("t1"),
        ]);
        assert!(store.update_task("t2", &TaskUpdate::status(TaskStatus::Ready)).is_err());
        assert!(store.get("t2").unwrap().status_history.is_empty());
    }

    #[test]
    fn test_history_one_entry_per_transition() {
        let mut store = store_with(vec![Task::new("t1", "f", "First")]);
        drive_to_completion(&mut store, "t1");

        let task = store.get("t1").unwrap();
        assert_eq!(task.status_history.len(), 6);
        assert_eq!(task.status_history[0].from_status, Some(TaskStatus::Pending));
        assert_eq!(task.status_history[5].to_status, TaskStatus::Completed);
        assert!(task
            .status_history
            .windows(2)
            .all(|w| {
                w[0].to_status == w[1].from_status.unwrap() && w[0].timestamp <= w[1].timestamp
            }));
        assert_eq!(task.progress, 100);
        assert!(task.completed_at.is_some());
    }

    #[test]
    fn test_start_task_walks_through_queue() {
        let mut store = store_with(vec![Task::new("t1", "f", "First")]);
        store.promote_ready();
        store.start_task("t1", Some("coder-1".to_string())).unwrap();

        let task = store.get("t1").unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.status_history.len(), 3);
        assert_eq!(task.status_history[2].agent_id.as_deref(), Some("coder-1"));
        assert_eq!(task.assigned_agent, Some(AgentRole::Coder));
        assert!(task.started_at.is_some());
        assert_eq!(store.run().current_task_id.as_deref(), Some("t1"));
        assert_eq!(store.run().in_progress_count, 1);
    }

    #[test]
    fn test_start_task_requires_ready() {
        let mut store = store_with(vec![Task::new("t1", "f", "First")]);
        assert!(matches!(
            store.start_task("t1", None),
            Err(Error::InvalidTransition { .. })
        ));
    }

    #[test]
    fn test_failure_blocks_dependents_and_retry_releases_them() {
        let mut store = store_with(vec![
            Task::new("t1", "f", "First"),
            Task::new("t2", "f", "Second").with_dependency("t1"),
        ]);
        store.promote_ready();
        store.start_task("t1", None).unwrap();
        store.add_error("t1", "compile error", None, true).unwrap();
        store
            .update_task("t1", &TaskUpdate::status(TaskStatus::Failed))
            .unwrap();

        assert_eq!(store.get("t2").unwrap().status, TaskStatus::Blocked);
        assert_eq!(store.run().failed_count, 1);

        store.retry_task("t1").unwrap();
        let t1 = store.get("t1").unwrap();
        assert_eq!(t1.status, TaskStatus::Pending);
        assert_eq!(t1.retry_count, 1);
        assert!(t1.errors.is_empty());
        assert_eq!(t1.progress, 0);
        assert_eq!(store.get("t2").unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn test_retry_limit() {
        let mut store = ExecutionStore::new(&ExecutionConfig {
            max_retries: 1,
            max_qa_iterations: 3,
        });
        store.add_task(Task::new("t1", "f", "Flaky")).unwrap();

        for attempt in 0..2 {
            store.promote_ready();
            store.start_task("t1", None).unwrap();
            store
                .update_task("t1", &TaskUpdate::status(TaskStatus::Failed))
                .unwrap();
            let result = store.retry_task("t1");
            if attempt == 0 {
                assert!(result.is_ok());
            } else {
                assert!(matches!(result, Err(Error::RetryLimitReached(_, 1))));
            }
        }
    }

    #[test]
    fn test_retry_only_from_failed() {
        let mut store = store_with(vec![Task::new("t1", "f", "First")]);
        assert!(store.retry_task("t1").is_err());
        assert_eq!(store.get("t1").unwrap().retry_count, 0);
    }

    #[test]
    fn test_skip_and_cancel_follow_table() {
        let mut store = store_with(vec![
            Task::new("t1", "f", "First"),
            Task::new("t2", "f", "Second"),
        ]);
        assert!(store.skip_task("t1").is_err());

        store
            .update_task("t1", &TaskUpdate::status(TaskStatus::Blocked))
            .unwrap();
        store.skip_task("t1").unwrap();
        assert_eq!(store.get("t1").unwrap().status, TaskStatus::Cancelled);

        store
            .update_task("t2", &TaskUpdate::status(TaskStatus::Blocked))
            .unwrap();
        store.cancel_task("t2").unwrap();
        let last = store.get("t2").unwrap().status_history.last().unwrap().clone();
        assert_eq!(last.reason.as_deref(), Some("cancelled"));
    }

    #[test]
    fn test_reopen_only_from_terminal() {
        let mut store = store_with(vec![Task::new("t1", "f", "First")]);
        assert!(store.reopen_task("t1").is_err());
        drive_to_completion(&mut store, "t1");
        store.reopen_task("t1").unwrap();

        let task = store.get("t1").unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert!(task.completed_at.is_none());
        assert_eq!(task.progress, 0);
    }

    #[test]
    fn test_unblock_requires_no_failed_dependency() {
        let mut store = store_with(vec![
            Task::new("t1", "f", "First"),
            Task::new("t2", "f", "Second").with_dependency("t1"),
        ]);
        store.promote_ready();
        store.start_task("t1", None).unwrap();
        store
            .update_task("t1", &TaskUpdate::status(TaskStatus::Failed))
            .unwrap();
        assert!(store.unblock_task("t2").is_err());

        store.skip_task("t1").unwrap();
        store.unblock_task("t2").unwrap();
        assert_eq!(store.get("t2").unwrap().status, TaskStatus::Pending);
    }

    #[test]
    fn test_next_task_prefers_priority() {
        let mut store = store_with(vec![
            Task::new("low", "f", "Low").with_priority(Priority::Low),
            Task::new("high", "f", "High").with_priority(Priority::High),
            Task::new("high2", "f", "High 2").with_priority(Priority::High),
        ]);
        assert!(store.next_task().is_none());
        store.promote_ready();
        assert_eq!(store.next_task().unwrap().id, "high");
    }

    #[test]
    fn test_remove_refuses_with_dependents() {
        let mut store = store_with(vec![
            Task::new("t1", "f", "First"),
            Task::new("t2", "f", "Second").with_dependency("t1"),
        ]);
        assert!(matches!(store.remove_task("t1"), Err(Error::HasDependents(..))));
        store.remove_task("t2").unwrap();
        store.remove_task("t1").unwrap();
        assert!(store.is_empty());
        assert_eq!(store.run().total_tasks, 0);
    }

    #[test]
    fn test_logs_errors_progress_files() {
        let mut store = store_with(vec![Task::new("t1", "f", "First")]);
        store
            .add_log("t1", LogLevel::Info, "started", Some("coding".into()), None)
            .unwrap();
        let error_id = store.add_error("t1", "boom", Some("trace".into()), false).unwrap();
        store.resolve_error("t1", &error_id).unwrap();
        assert!(store.resolve_error("t1", "err-missing").is_err());
        store.update_progress("t1", 40).unwrap();
        assert!(store.update_progress("t1", 101).is_err());
        store.record_file_created("t1", "src/lib.rs").unwrap();
        store.record_file_modified("t1", "Cargo.toml").unwrap();

        let task = store.get("t1").unwrap();
        assert_eq!(task.logs.len(), 2);
        assert_eq!(task.open_errors().count(), 0);
        assert_eq!(task.progress, 40);
        assert!(task.files_created.contains("src/lib.rs"));
        assert!(task.files_modified.contains("Cargo.toml"));
    }

    #[test]
    fn test_qa_iteration_limit() {
        let mut store = store_with(vec![Task::new("t1", "f", "First")]);
        assert_eq!(store.record_qa_iteration("t1").unwrap(), 1);
        assert_eq!(store.record_qa_iteration("t1").unwrap(), 2);
        assert_eq!(store.record_qa_iteration("t1").unwrap(), 3);
        assert!(matches!(
            store.record_qa_iteration("t1"),
            Err(Error::QaLimitReached(_, 3))
        ));
    }

    #[test]
    fn test_run_lifecycle_and_auto_complete() {
        let mut store = store_with(vec![Task::new("t1", "f", "Only")]);
        assert!(store.resume_execution().is_err());

        store.plan_execution().unwrap();
        store.mark_ready().unwrap();
        store.start_execution().unwrap();
        assert_eq!(store.get("t1").unwrap().status, TaskStatus::Ready);

        store.pause_execution().unwrap();
        store.resume_execution().unwrap();

        store.start_task("t1", None).unwrap();
        for status in [TaskStatus::AiReview, TaskStatus::HumanReview, TaskStatus::Completed] {
            store.update_task("t1", &TaskUpdate::status(status)).unwrap();
        }
        assert_eq!(store.run().status, ExecutionStatus::Completed);
        assert!(store.run().completed_at.is_some());
        assert!(store.start_execution().is_err());

        store.restart_execution();
        assert_eq!(store.run().status, ExecutionStatus::Idle);
        assert_eq!(store.run().completed_count, 1);
    }

    #[test]
    fn test_apply_remote_records_history() {
        let mut store = store_with(vec![Task::new("t1", "f", "First")]);
        store
            .apply_remote("t1", &TaskUpdate::status(TaskStatus::InProgress))
            .unwrap();
        let task = store.get("t1").unwrap();
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.status_history[0].reason.as_deref(), Some(BACKEND_SYNC));
    }

    #[test]
    fn test_rollback_keeps_history_append_only() {
        let mut store = store_with(vec![Task::new("t1", "f", "First")]);
        let checkpoint = store
            .update_task_undoable("t1", &TaskUpdate::status(TaskStatus::Ready))
            .unwrap();

        store.rollback(checkpoint, "rolled back").unwrap();
        let task = store.get("t1").unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.status_history.len(), 2);
        assert_eq!(task.status_history[1].reason.as_deref(), Some("rolled back"));
    }

    #[test]
    fn test_rollback_releases_cascade_blocks() {
        let mut store = store_with(vec![
            Task::new("t1", "f", "Schema"),
            Task::new("t2", "f", "API").with_dependency("t1"),
            Task::new("t3", "f", "UI").with_dependency("t2"),
        ]);
        for status in [TaskStatus::Ready, TaskStatus::Queued, TaskStatus::InProgress] {
            store.update_task("t1", &TaskUpdate::status(status)).unwrap();
        }

        let checkpoint = store
            .update_task_undoable("t1", &TaskUpdate::status(TaskStatus::Failed))
            .unwrap();
        assert_eq!(store.get("t2").unwrap().status, TaskStatus::Blocked);

        store.rollback(checkpoint, "rolled back").unwrap();
        assert_eq!(store.get("t1").unwrap().status, TaskStatus::InProgress);
        for id in ["t2", "t3"] {
            let task = store.get(id).unwrap();
            assert_eq!(task.status, TaskStatus::Pending, "{id}");
            assert_eq!(task.blocked_by, vec![task.depends_on[0].clone()]);
        }
        assert_eq!(store.run().failed_count, 0);
    }

    #[test]
    fn test_rollback_reopens_auto_completed_run() {
        let mut store = store_with(vec![Task::new("t1", "f", "Only")]);
        store.start_execution().unwrap();
        for status in [
            TaskStatus::Queued,
            TaskStatus::InProgress,
            TaskStatus::AiReview,
            TaskStatus::HumanReview,
        ] {
            store.update_task("t1", &TaskUpdate::status(status)).unwrap();
        }

        let checkpoint = store
            .update_task_undoable("t1", &TaskUpdate::status(TaskStatus::Completed))
            .unwrap();
        assert_eq!(store.run().status, ExecutionStatus::Completed);

        store.rollback(checkpoint, "rolled back").unwrap();
        let task = store.get("t1").unwrap();
        assert_eq!(task.status, TaskStatus::HumanReview);
        assert!(task.completed_at.is_none());
        assert_eq!(store.run().status, ExecutionStatus::Running);
        assert!(store.run().completed_at.is_none());
        assert_eq!(store.run().completed_count, 0);
    }

    #[test]
    fn test_reorder_task_column() {
        let mut store = store_with(vec![
            Task::new("a", "f", "A"),
            Task::new("b", "f", "B"),
            Task::new("c", "f", "C"),
        ]);
        assert!(store.reorder(TaskStatus::Pending, 0, 2));
        let ids: Vec<_> = store.tasks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_summaries_for_feature() {
        let store = store_with(vec![
            Task::new("a", "f1", "A"),
            Task::new("b", "f2", "B"),
        ]);
        let summaries = store.summaries_for("f1");
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, "a");
    }
}
