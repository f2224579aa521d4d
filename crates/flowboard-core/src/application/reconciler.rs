//! Board reconciler
//!
//! Turns a drag-end event into store calls. A drop never mutates the board
//! directly, so the WIP limit and the task transition table apply exactly as
//! they do for explicit commands.

use tracing::debug;

use super::execution_store::ExecutionStore;
use super::feature_store::FeatureStore;
use crate::domain::{FeatureStatus, TaskStatus, TaskUpdate};

/// Kind of card being dragged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragItemKind {
    Feature,
    Task,
}

/// Where a card was dropped
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropTarget {
    /// A column, identified by its status string
    Column(String),
    /// Another card; its column is the target column
    Item(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DragEndEvent {
    pub active_id: String,
    pub kind: DragItemKind,
    pub over: Option<DropTarget>,
}

impl DragEndEvent {
    pub fn feature(active_id: impl Into<String>, over: DropTarget) -> Self {
        Self {
            active_id: active_id.into(),
            kind: DragItemKind::Feature,
            over: Some(over),
        }
    }

    pub fn task(active_id: impl Into<String>, over: DropTarget) -> Self {
        Self {
            active_id: active_id.into(),
            kind: DragItemKind::Task,
            over: Some(over),
        }
    }
}

/// What a drop did to the board
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropOutcome {
    Moved,
    Reordered,
    /// The store refused the change
    Rejected(String),
    /// Nothing to do
    Ignored,
}

/// The store call a drop resolves to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DropAction {
    MoveFeature { id: String, to: FeatureStatus },
    MoveTask { id: String, to: TaskStatus },
    ReorderFeatures { column: FeatureStatus, from: usize, to: usize },
    ReorderTasks { column: TaskStatus, from: usize, to: usize },
    Ignore,
}

impl DropAction {
    /// Moves change status and so need backend confirmation; reorders stay local
    pub fn is_move(&self) -> bool {
        matches!(self, Self::MoveFeature { .. } | Self::MoveTask { .. })
    }
}

/// Resolve a drop against the current board without touching it
pub fn plan_drop(
    features: &FeatureStore,
    tasks: &ExecutionStore,
    event: &DragEndEvent,
) -> DropAction {
    let Some(over) = &event.over else {
        debug!(active_id = %event.active_id, "Dropped outside the board");
        return DropAction::Ignore;
    };

    match event.kind {
        DragItemKind::Feature => plan_feature_drop(features, &event.active_id, over),
        DragItemKind::Task => plan_task_drop(tasks, &event.active_id, over),
    }
}

fn plan_feature_drop(features: &FeatureStore, active_id: &str, over: &DropTarget) -> DropAction {
    let Some(current) = features.get(active_id).map(|f| f.status) else {
        return DropAction::Ignore;
    };
    let move_to = |to| DropAction::MoveFeature {
        id: active_id.to_string(),
        to,
    };

    match over {
        DropTarget::Column(column) => match FeatureStatus::parse(column) {
            Some(target) if target != current => move_to(target),
            _ => DropAction::Ignore,
        },
        DropTarget::Item(over_id) => {
            let Some(target) = features.get(over_id).map(|f| f.status) else {
                return DropAction::Ignore;
            };
            if target != current {
                return move_to(target);
            }

            match (
                features.index_in_column(active_id),
                features.index_in_column(over_id),
            ) {
                (Some(from), Some(to)) if from != to => DropAction::ReorderFeatures {
                    column: current,
                    from,
                    to,
                },
                _ => DropAction::Ignore,
            }
        }
    }
}

fn plan_task_drop(tasks: &ExecutionStore, active_id: &str, over: &DropTarget) -> DropAction {
    let Some(current) = tasks.get(active_id).map(|t| t.status) else {
        return DropAction::Ignore;
    };
    let move_to = |to| DropAction::MoveTask {
        id: active_id.to_string(),
        to,
    };

    match over {
        DropTarget::Column(column) => match TaskStatus::parse(column) {
            Some(target) if target != current => move_to(target),
            _ => DropAction::Ignore,
        },
        DropTarget::Item(over_id) => {
            let Some(target) = tasks.get(over_id).map(|t| t.status) else {
                return DropAction::Ignore;
            };
            if target != current {
                return move_to(target);
            }

            let column = tasks.column(current);
            let from = column.iter().position(|t| t.id == active_id);
            let to = column.iter().position(|t| t.id == *over_id);
            match (from, to) {
                (Some(from), Some(to)) if from != to => DropAction::ReorderTasks {
                    column: current,
                    from,
                    to,
                },
                _ => DropAction::Ignore,
            }
        }
    }
}

/// Applies drops straight to the local stores
///
/// Remote-backed boards go through
/// [`BackendSyncAdapter::on_drag_end`](super::BackendSyncAdapter::on_drag_end),
/// which confirms moves with the backend and uses this only for reorders.
pub struct BoardReconciler<'a> {
    features: &'a mut FeatureStore,
    tasks: &'a mut ExecutionStore,
}

impl<'a> BoardReconciler<'a> {
    pub fn new(features: &'a mut FeatureStore, tasks: &'a mut ExecutionStore) -> Self {
        Self { features, tasks }
    }

    pub fn on_drag_end(&mut self, event: &DragEndEvent) -> DropOutcome {
        let action = plan_drop(self.features, self.tasks, event);
        let outcome = self.apply(action);
        debug!(active_id = %event.active_id, ?outcome, "Drop reconciled");
        outcome
    }

    pub fn apply(&mut self, action: DropAction) -> DropOutcome {
        match action {
            DropAction::MoveFeature { id, to } => match self.features.try_move(&id, to) {
                Ok(()) => DropOutcome::Moved,
                Err(err) => DropOutcome::Rejected(err.to_string()),
            },
            DropAction::MoveTask { id, to } => {
                match self.tasks.update_task(&id, &TaskUpdate::status(to)) {
                    Ok(()) => DropOutcome::Moved,
                    Err(err) => DropOutcome::Rejected(err.to_string()),
                }
            }
            DropAction::ReorderFeatures { column, from, to } => {
                reordered(self.features.reorder(column, from, to))
            }
            DropAction::ReorderTasks { column, from, to } => {
                reordered(self.tasks.reorder(column, from, to))
            }
            DropAction::Ignore => DropOutcome::Ignored,
        }
    }
}

fn reordered(moved: bool) -> DropOutcome {
    if moved {
        DropOutcome::Reordered
    } else {
        DropOutcome::Ignored
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Feature, Task};

    fn board() -> (FeatureStore, ExecutionStore) {
        let mut features = FeatureStore::default();
        for (id, status) in [
            ("a", FeatureStatus::Backlog),
            ("x", FeatureStatus::Planning),
            ("b", FeatureStatus::Backlog),
            ("c", FeatureStatus::Backlog),
        ] {
            features
                .add(Feature::with_id(id, id.to_uppercase()).with_status(status))
                .unwrap();
        }

        let mut tasks = ExecutionStore::default();
        tasks.add_task(Task::new("t1", "a", "First")).unwrap();
        tasks.add_task(Task::new("t2", "a", "Second")).unwrap();
        (features, tasks)
    }

    fn ids(store: &FeatureStore) -> Vec<&str> {
        store.features().iter().map(|f| f.id.as_str()).collect()
    }

    #[test]
    fn test_drop_on_column_moves_feature() {
        let (mut features, mut tasks) = board();
        let outcome = BoardReconciler::new(&mut features, &mut tasks)
            .on_drag_end(&DragEndEvent::feature("a", DropTarget::Column("in_progress".into())));
        assert_eq!(outcome, DropOutcome::Moved);
        assert_eq!(features.get("a").unwrap().status, FeatureStatus::InProgress);
    }

    #[test]
    fn test_drop_on_own_column_is_ignored() {
        let (mut features, mut tasks) = board();
        let before = ids(&features).join(",");
        let outcome = BoardReconciler::new(&mut features, &mut tasks)
            .on_drag_end(&DragEndEvent::feature("a", DropTarget::Column("backlog".into())));
        assert_eq!(outcome, DropOutcome::Ignored);
        assert_eq!(ids(&features).join(","), before);
    }

    #[test]
    fn test_drop_on_item_in_same_column_reorders() {
        let (mut features, mut tasks) = board();
        let outcome = BoardReconciler::new(&mut features, &mut tasks)
            .on_drag_end(&DragEndEvent::feature("a", DropTarget::Item("c".into())));
        assert_eq!(outcome, DropOutcome::Reordered);
        assert_eq!(ids(&features), vec!["b", "x", "c", "a"]);
    }

    #[test]
    fn test_drop_on_item_in_other_column_moves() {
        let (mut features, mut tasks) = board();
        let outcome = BoardReconciler::new(&mut features, &mut tasks)
            .on_drag_end(&DragEndEvent::feature("b", DropTarget::Item("x".into())));
        assert_eq!(outcome, DropOutcome::Moved);
        assert_eq!(features.get("b").unwrap().status, FeatureStatus::Planning);
        assert_eq!(features.column(FeatureStatus::Planning).last().unwrap().id, "b");
    }

    #[test]
    fn test_drag_respects_wip_limit() {
        let (mut features, mut tasks) = board();
        features.set_wip_limit(1);
        let mut reconciler = BoardReconciler::new(&mut features, &mut tasks);
        let column = || DropTarget::Column("in_progress".into());

        assert_eq!(
            reconciler.on_drag_end(&DragEndEvent::feature("a", column())),
            DropOutcome::Moved
        );
        assert!(matches!(
            reconciler.on_drag_end(&DragEndEvent::feature("b", column())),
            DropOutcome::Rejected(_)
        ));
        assert_eq!(features.get("b").unwrap().status, FeatureStatus::Backlog);
    }

    #[test]
    fn test_unknown_ids_and_missing_target_ignored() {
        let (mut features, mut tasks) = board();
        let mut reconciler = BoardReconciler::new(&mut features, &mut tasks);

        let no_target = DragEndEvent {
            active_id: "a".into(),
            kind: DragItemKind::Feature,
            over: None,
        };
        assert_eq!(reconciler.on_drag_end(&no_target), DropOutcome::Ignored);
        let to_column = |id: &str, column: &str| {
            DragEndEvent::feature(id, DropTarget::Column(column.to_string()))
        };
        assert_eq!(reconciler.on_drag_end(&to_column("ghost", "done")), DropOutcome::Ignored);
        assert_eq!(reconciler.on_drag_end(&to_column("a", "archive")), DropOutcome::Ignored);
        assert_eq!(
            reconciler.on_drag_end(&DragEndEvent::feature("a", DropTarget::Item("ghost".into()))),
            DropOutcome::Ignored
        );
    }

    #[test]
    fn test_task_drop_follows_transition_table() {
        let (mut features, mut tasks) = board();
        let mut reconciler = BoardReconciler::new(&mut features, &mut tasks);

        let to_column = |column: &str| DragEndEvent::task("t1", DropTarget::Column(column.into()));
        assert!(matches!(
            reconciler.on_drag_end(&to_column("completed")),
            DropOutcome::Rejected(_)
        ));
        assert_eq!(reconciler.on_drag_end(&to_column("ready")), DropOutcome::Moved);
        assert_eq!(tasks.get("t1").unwrap().status, TaskStatus::Ready);
        assert_eq!(tasks.get("t1").unwrap().status_history.len(), 1);
    }

    #[test]
    fn test_plan_leaves_board_untouched() {
        let (features, tasks) = board();
        let action = plan_drop(
            &features,
            &tasks,
            &DragEndEvent::feature("a", DropTarget::Column("done".into())),
        );
        assert_eq!(
            action,
            DropAction::MoveFeature {
                id: "a".into(),
                to: FeatureStatus::Done
            }
        );
        assert!(action.is_move());
        assert_eq!(features.get("a").unwrap().status, FeatureStatus::Backlog);

        let action = plan_drop(
            &features,
            &tasks,
            &DragEndEvent::feature("a", DropTarget::Item("c".into())),
        );
        assert!(!action.is_move());
    }

    #[test]
    fn test_task_reorder_within_column() {
        let (mut features, mut tasks) = board();
        let outcome = BoardReconciler::new(&mut features, &mut tasks)
            .on_drag_end(&DragEndEvent::task("t2", DropTarget::Item("t1".into())));
        assert_eq!(outcome, DropOutcome::Reordered);
        assert_eq!(tasks.tasks()[0].id, "t2");
    }
}
