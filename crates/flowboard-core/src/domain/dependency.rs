//! Dependency resolver
//!
//! Answers "is this task blocked, and by whom?" and "what does this task
//! block?" over a task list, and rejects dependency graphs that could never
//! resolve (self-dependency, cycles).

use std::collections::HashMap;

use super::status::TaskStatus;
use super::task::Task;
use crate::error::{Error, Result};

/// Result of a blocked-state query
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct BlockedState {
    pub is_blocked: bool,
    /// Dependencies that are not completed, in `depends_on` order
    pub blocking_ids: Vec<String>,
}

/// id -> task lookup built once per query batch
#[derive(Debug)]
pub struct TaskIndex<'a> {
    by_id: HashMap<&'a str, &'a Task>,
}

impl<'a> TaskIndex<'a> {
    pub fn new(tasks: &'a [Task]) -> Self {
        Self {
            by_id: tasks.iter().map(|t| (t.id.as_str(), t)).collect(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&'a Task> {
        self.by_id.get(id).copied()
    }

    pub fn status_of(&self, id: &str) -> Option<TaskStatus> {
        self.get(id).map(|t| t.status)
    }
}

/// Compute whether `task` is blocked
///
/// `blocking_ids = depends_on ∩ {ids of tasks not completed}`. Ids that name
/// no known task are not tasks and therefore never block.
pub fn compute_blocked(task: &Task, index: &TaskIndex<'_>) -> BlockedState {
    let blocking_ids: Vec<String> = task
        .depends_on
        .iter()
        .filter(|dep| {
            index
                .status_of(dep)
                .is_some_and(|status| status != TaskStatus::Completed)
        })
        .cloned()
        .collect();

    BlockedState {
        is_blocked: !blocking_ids.is_empty() || task.status == TaskStatus::Blocked,
        blocking_ids,
    }
}

/// Every task whose `depends_on` contains `task_id`, in list order
pub fn downstream_of(task_id: &str, tasks: &[Task]) -> Vec<String> {
    tasks
        .iter()
        .filter(|t| t.depends_on.iter().any(|dep| dep == task_id))
        .map(|t| t.id.clone())
        .collect()
}

/// Dependencies of `task` that have failed
pub fn failed_dependencies(task: &Task, index: &TaskIndex<'_>) -> Vec<String> {
    task.depends_on
        .iter()
        .filter(|dep| index.status_of(dep) == Some(TaskStatus::Failed))
        .cloned()
        .collect()
}

/// Pending tasks with nothing left blocking them
pub fn ready_candidates(tasks: &[Task]) -> Vec<String> {
    let index = TaskIndex::new(tasks);
    tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Pending)
        .filter(|t| !compute_blocked(t, &index).is_blocked)
        .map(|t| t.id.clone())
        .collect()
}

/// Validate that giving `task_id` the dependencies `depends_on` keeps the
/// graph acyclic
///
/// `tasks` is the current collection; `task_id` may or may not be in it yet.
pub fn validate_dependencies(task_id: &str, depends_on: &[String], tasks: &[Task]) -> Result<()> {
    if depends_on.iter().any(|d| d == task_id) {
        return Err(Error::SelfDependency(task_id.to_string()));
    }

    let mut graph: HashMap<&str, Vec<&str>> = tasks
        .iter()
        .map(|t| (t.id.as_str(), t.depends_on.iter().map(String::as_str).collect()))
        .collect();
    graph.insert(task_id, depends_on.iter().map(String::as_str).collect());

    match find_cycle_from(task_id, &graph) {
        Some(cycle) => Err(Error::DependencyCycle(cycle)),
        None => Ok(()),
    }
}

/// Validate a whole task list, e.g. a batch loaded from a snapshot
pub fn validate_graph(tasks: &[Task]) -> Result<()> {
    let graph: HashMap<&str, Vec<&str>> = tasks
        .iter()
        .map(|t| (t.id.as_str(), t.depends_on.iter().map(String::as_str).collect()))
        .collect();

    if let Some(task) = tasks.iter().find(|t| t.depends_on.contains(&t.id)) {
        return Err(Error::SelfDependency(task.id.clone()));
    }

    // Marks are shared so each task is visited once across all starts
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut path: Vec<&str> = Vec::new();
    for task in tasks {
        if let Some(cycle) = visit(&task.id, &graph, &mut marks, &mut path) {
            return Err(Error::DependencyCycle(cycle));
        }
    }
    Ok(())
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Visiting,
    Done,
}

fn find_cycle_from<'a>(
    start: &'a str,
    graph: &HashMap<&'a str, Vec<&'a str>>,
) -> Option<Vec<String>> {
    let mut marks: HashMap<&str, Mark> = HashMap::new();
    let mut path: Vec<&str> = Vec::new();
    visit(start, graph, &mut marks, &mut path)
}

fn visit<'a>(
    node: &'a str,
    graph: &HashMap<&'a str, Vec<&'a str>>,
    marks: &mut HashMap<&'a str, Mark>,
    path: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    match marks.get(node) {
        Some(Mark::Done) => return None,
        Some(Mark::Visiting) => {
            let start = path.iter().position(|n| *n == node).unwrap_or(0);
            let mut cycle: Vec<String> = path[start..].iter().map(|s| s.to_string()).collect();
            cycle.push(node.to_string());
            return Some(cycle);
        }
        None => {}
    }

    marks.insert(node, Mark::Visiting);
    path.push(node);

    if let Some(deps) = graph.get(node) {
        for dep in deps {
            if let Some(cycle) = visit(*dep, graph, marks, path) {
                return Some(cycle);
            }
        }
    }

    path.pop();
    marks.insert(node, Mark::Done);
    None
}
