//! Backend sync adapter
//!
//! Every remote-backed mutation is applied to the local store first, sent to
//! the backend, and rolled back if the backend refuses. Pushes from the
//! backend are drained without blocking and applied as authoritative.

pub mod optimistic;

use std::sync::Arc;

use tokio::sync::RwLock;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tracing::{debug, info, warn};

pub use optimistic::run_optimistic;

use super::backend::{ExecutionBackend, RemoteTaskUpdate};
use super::execution_store::ExecutionStore;
use super::feature_store::FeatureStore;
use super::reconciler::{BoardReconciler, DragEndEvent, DropAction, DropOutcome, plan_drop};
use crate::domain::{Feature, FeatureStatus, FeatureUpdate, NewFeature, TaskUpdate};
use crate::error::{Error, Result};

/// History reason recorded when a task change is rolled back
pub const ROLLBACK_REASON: &str = "rolled back: remote update failed";

pub type SharedFeatureStore = Arc<RwLock<FeatureStore>>;
pub type SharedExecutionStore = Arc<RwLock<ExecutionStore>>;

/// Counts of pushed updates applied by one drain
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainSummary {
    pub features: usize,
    pub tasks: usize,
}

pub struct BackendSyncAdapter {
    features: SharedFeatureStore,
    tasks: SharedExecutionStore,
    backend: Arc<dyn ExecutionBackend>,
    project_id: String,
    feature_rx: broadcast::Receiver<Feature>,
    task_rx: broadcast::Receiver<RemoteTaskUpdate>,
}

impl BackendSyncAdapter {
    pub fn new(
        features: SharedFeatureStore,
        tasks: SharedExecutionStore,
        backend: Arc<dyn ExecutionBackend>,
        project_id: impl Into<String>,
    ) -> Self {
        let feature_rx = backend.subscribe_features();
        let task_rx = backend.subscribe_tasks();
        Self {
            features,
            tasks,
            backend,
            project_id: project_id.into(),
            feature_rx,
            task_rx,
        }
    }

    pub fn features(&self) -> SharedFeatureStore {
        Arc::clone(&self.features)
    }

    pub fn tasks(&self) -> SharedExecutionStore {
        Arc::clone(&self.tasks)
    }

    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Replace the local board with the backend's features
    pub async fn load_features(&self) -> Result<usize> {
        let features = self.backend.get_features(&self.project_id).await?;
        let count = features.len();
        self.features.write().await.load(features);
        info!(project_id = %self.project_id, count, "Features loaded");
        Ok(count)
    }

    /// Create a feature under a provisional id, swapped for the backend's
    /// feature once confirmed
    pub async fn create_feature(&self, input: NewFeature) -> Result<Feature> {
        let input = NewFeature {
            project_id: self.project_id.clone(),
            ..input
        };
        let provisional = input.to_provisional();
        let provisional_id = provisional.id.clone();

        let created = run_optimistic(
            &self.features,
            "create_feature",
            |store| store.add(provisional),
            || self.backend.create_feature(&input),
            |store, ()| {
                store.remove(&provisional_id);
            },
        )
        .await?;

        let mut store = self.features.write().await;
        if let Err(err) = store.rekey(&provisional_id, created.clone()) {
            warn!(
                feature_id = %created.id,
                error = %err,
                "Provisional feature vanished before confirmation"
            );
        }
        Ok(created)
    }

    /// Update feature fields, status included
    pub async fn update_feature(&self, id: &str, update: &FeatureUpdate) -> Result<()> {
        let confirmed = run_optimistic(
            &self.features,
            "update_feature",
            |store| store.update_undoable(id, update),
            || self.confirm_feature(id, update),
            |store, undo| store.undo(undo),
        )
        .await?;

        self.accept(confirmed).await;
        Ok(())
    }

    /// Move a feature to another column, subject to the WIP limit
    pub async fn move_feature(&self, id: &str, status: FeatureStatus) -> Result<()> {
        let update = FeatureUpdate::status(status);
        let confirmed = run_optimistic(
            &self.features,
            "move_feature",
            |store| store.move_undoable(id, status),
            || self.confirm_feature(id, &update),
            |store, undo| store.undo(undo),
        )
        .await?;

        self.accept(confirmed).await;
        Ok(())
    }

    pub async fn delete_feature(&self, id: &str) -> Result<()> {
        run_optimistic(
            &self.features,
            "delete_feature",
            |store| {
                store
                    .remove(id)
                    .ok_or_else(|| Error::FeatureNotFound(id.to_string()))
            },
            || async {
                match self.backend.delete_feature(id).await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(Error::Backend(format!(
                        "backend did not delete feature '{}'",
                        id
                    ))),
                    Err(err) => Err(err),
                }
            },
            |store, (index, feature)| store.restore(index, feature),
        )
        .await
    }

    /// Update a task; the transition table applies locally before the call
    pub async fn update_task(&self, id: &str, update: &TaskUpdate) -> Result<()> {
        run_optimistic(
            &self.tasks,
            "update_task",
            |store| store.update_task_undoable(id, update),
            || self.backend.update_task(id, update),
            |store, checkpoint| {
                if let Err(err) = store.rollback(checkpoint, ROLLBACK_REASON) {
                    warn!(task_id = %id, error = %err, "Task rollback failed");
                }
            },
        )
        .await
    }

    /// Reconcile a drop on the board
    ///
    /// Moves change status, so they take the same optimistic path as
    /// [`move_feature`](Self::move_feature) and [`update_task`](Self::update_task).
    /// Reorders are local only. A refused or unconfirmed move is returned as
    /// the error, with the board already reverted.
    pub async fn on_drag_end(&self, event: &DragEndEvent) -> Result<DropOutcome> {
        let action = {
            let features = self.features.read().await;
            let tasks = self.tasks.read().await;
            plan_drop(&features, &tasks, event)
        };

        let outcome = match action {
            DropAction::MoveFeature { id, to } => {
                self.move_feature(&id, to).await?;
                DropOutcome::Moved
            }
            DropAction::MoveTask { id, to } => {
                self.update_task(&id, &TaskUpdate::status(to)).await?;
                DropOutcome::Moved
            }
            local => {
                let mut features = self.features.write().await;
                let mut tasks = self.tasks.write().await;
                BoardReconciler::new(&mut features, &mut tasks).apply(local)
            }
        };
        debug!(active_id = %event.active_id, ?outcome, "Drop reconciled");
        Ok(outcome)
    }

    /// Apply every pending push without waiting for more
    pub async fn drain_remote_updates(&mut self) -> DrainSummary {
        let mut summary = DrainSummary::default();

        let features = drain(&mut self.feature_rx, "features");
        if !features.is_empty() {
            let mut store = self.features.write().await;
            for feature in features {
                store.apply_remote(feature);
                summary.features += 1;
            }
        }

        let tasks = drain(&mut self.task_rx, "tasks");
        if !tasks.is_empty() {
            let mut store = self.tasks.write().await;
            for pushed in tasks {
                match store.apply_remote(&pushed.task_id, &pushed.update) {
                    Ok(()) => summary.tasks += 1,
                    Err(err) => {
                        warn!(
                            task_id = %pushed.task_id,
                            error = %err,
                            "Ignoring push for unknown task"
                        )
                    }
                }
            }
        }

        summary
    }

    async fn confirm_feature(&self, id: &str, update: &FeatureUpdate) -> Result<Feature> {
        self.backend
            .update_feature(id, update)
            .await?
            .ok_or_else(|| Error::Backend(format!("backend does not know feature '{}'", id)))
    }

    /// Take the backend's copy of a confirmed feature
    async fn accept(&self, feature: Feature) {
        let mut store = self.features.write().await;
        if let Err(err) = store.replace(feature) {
            warn!(error = %err, "Confirmed feature no longer on the board");
        }
    }
}

fn drain<T: Clone>(rx: &mut broadcast::Receiver<T>, channel: &str) -> Vec<T> {
    let mut items = Vec::new();
    loop {
        match rx.try_recv() {
            Ok(item) => items.push(item),
            Err(TryRecvError::Lagged(skipped)) => {
                warn!(channel, skipped, "Push receiver lagged, updates dropped");
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => break,
        }
    }
    items
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;

    use tokio::sync::Notify;

    use super::*;
    use crate::application::backend::InMemoryBackend;
    use crate::application::reconciler::DropTarget;
    use crate::domain::{ExecutionStatus, Priority, Task, TaskStatus};

    const PROJECT: &str = "p1";

    struct Fixture {
        adapter: BackendSyncAdapter,
        backend: Arc<InMemoryBackend>,
    }

    async fn fixture(features: Vec<Feature>) -> Fixture {
        let backend = Arc::new(InMemoryBackend::default().with_features(PROJECT, features));
        let adapter = BackendSyncAdapter::new(
            Arc::new(RwLock::new(FeatureStore::default())),
            Arc::new(RwLock::new(ExecutionStore::default())),
            backend.clone(),
            PROJECT,
        );
        adapter.load_features().await.unwrap();
        Fixture { adapter, backend }
    }

    fn feature(id: &str, status: FeatureStatus) -> Feature {
        Feature::with_id(id, id.to_uppercase()).with_status(status)
    }

    #[tokio::test]
    async fn test_priority_update_reverts_on_backend_failure() {
        let fx = fixture(vec![feature("f1", FeatureStatus::Backlog)]).await;
        fx.backend.set_offline(true);

        let err = fx
            .adapter
            .update_feature("f1", &FeatureUpdate::priority(Priority::High))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::Backend(_)));
        let store = fx.adapter.features();
        assert_eq!(store.read().await.get("f1").unwrap().priority, Priority::Medium);
    }

    #[tokio::test]
    async fn test_update_confirmed_takes_backend_copy() {
        let fx = fixture(vec![feature("f1", FeatureStatus::Backlog)]).await;
        fx.adapter
            .update_feature("f1", &FeatureUpdate::priority(Priority::Critical))
            .await
            .unwrap();

        let store = fx.adapter.features();
        assert_eq!(store.read().await.get("f1").unwrap().priority, Priority::Critical);
        assert_eq!(fx.backend.feature("f1").unwrap().priority, Priority::Critical);
    }

    #[tokio::test]
    async fn test_move_revert_restores_position() {
        let fx = fixture(vec![
            feature("a", FeatureStatus::Planning),
            feature("b", FeatureStatus::Planning),
        ])
        .await;
        fx.backend.fail_next(1);

        assert!(fx.adapter.move_feature("a", FeatureStatus::InProgress).await.is_err());

        let store = fx.adapter.features();
        let store = store.read().await;
        let ids: Vec<_> = store.features().iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(store.get("a").unwrap().status, FeatureStatus::Planning);
    }

    #[tokio::test]
    async fn test_wip_rejection_never_reaches_backend() {
        let fx = fixture(vec![
            feature("a", FeatureStatus::InProgress),
            feature("b", FeatureStatus::InProgress),
            feature("c", FeatureStatus::InProgress),
            feature("d", FeatureStatus::Planning),
        ])
        .await;
        let calls = fx.backend.calls();

        let err = fx
            .adapter
            .move_feature("d", FeatureStatus::InProgress)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::WipLimitReached { limit: 3 }));
        assert_eq!(fx.backend.calls(), calls);
    }

    #[tokio::test]
    async fn test_delete_revert_restores_feature() {
        let fx = fixture(vec![
            feature("a", FeatureStatus::Backlog),
            feature("b", FeatureStatus::Backlog),
        ])
        .await;
        fx.backend.set_offline(true);
        assert!(fx.adapter.delete_feature("a").await.is_err());
        assert_eq!(fx.adapter.features().read().await.features()[0].id, "a");

        fx.backend.set_offline(false);
        fx.adapter.delete_feature("a").await.unwrap();
        assert!(fx.adapter.features().read().await.get("a").is_none());
        assert!(fx.backend.feature("a").is_none());
    }

    #[tokio::test]
    async fn test_create_feature_rekeys_or_removes() {
        let fx = fixture(vec![]).await;
        let input = NewFeature {
            title: "Search".into(),
            ..Default::default()
        };

        let created = fx.adapter.create_feature(input.clone()).await.unwrap();
        {
            let store = fx.adapter.features();
            let store = store.read().await;
            assert_eq!(store.len(), 1);
            assert_eq!(store.features()[0].id, created.id);
        }
        assert_eq!(fx.backend.get_features(PROJECT).await.unwrap().len(), 1);

        fx.backend.set_offline(true);
        assert!(fx.adapter.create_feature(input).await.is_err());
        assert_eq!(fx.adapter.features().read().await.len(), 1);
    }

    #[tokio::test]
    async fn test_task_update_rollback_appends_history() {
        let fx = fixture(vec![]).await;
        fx.adapter
            .tasks()
            .write()
            .await
            .add_task(Task::new("t1", "f1", "Schema"))
            .unwrap();
        fx.backend.set_offline(true);

        let result = fx
            .adapter
            .update_task("t1", &TaskUpdate::status(TaskStatus::Ready))
            .await;
        assert!(result.is_err());

        let store = fx.adapter.tasks();
        let store = store.read().await;
        let task = store.get("t1").unwrap();
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.status_history.len(), 2);
        assert_eq!(task.status_history[1].reason.as_deref(), Some(ROLLBACK_REASON));
    }

    #[tokio::test]
    async fn test_invalid_task_transition_not_sent() {
        let fx = fixture(vec![]).await;
        fx.adapter
            .tasks()
            .write()
            .await
            .add_task(Task::new("t1", "f1", "Schema"))
            .unwrap();

        let result = fx
            .adapter
            .update_task("t1", &TaskUpdate::status(TaskStatus::Completed))
            .await;
        assert!(matches!(result, Err(Error::InvalidTransition { .. })));
        assert!(fx.backend.task_updates().is_empty());
    }

    #[tokio::test]
    async fn test_drain_applies_pushes() {
        let mut fx = fixture(vec![feature("f1", FeatureStatus::Backlog)]).await;
        fx.adapter
            .tasks()
            .write()
            .await
            .add_task(Task::new("t1", "f1", "Schema"))
            .unwrap();

        fx.backend.push_feature(feature("f1", FeatureStatus::Done));
        fx.backend.push_feature(feature("f2", FeatureStatus::Backlog));
        fx.backend.push_task("t1", TaskUpdate::progress(30));
        fx.backend.push_task("ghost", TaskUpdate::progress(30));

        let summary = fx.adapter.drain_remote_updates().await;
        assert_eq!(summary, DrainSummary { features: 2, tasks: 1 });

        let features = fx.adapter.features();
        assert_eq!(features.read().await.get("f1").unwrap().status, FeatureStatus::Done);
        assert_eq!(features.read().await.len(), 2);
        assert_eq!(fx.adapter.tasks().read().await.get("t1").unwrap().progress, 30);
        assert_eq!(fx.adapter.drain_remote_updates().await, DrainSummary::default());
    }

    #[tokio::test]
    async fn test_drag_move_confirmed_by_backend() {
        let fx = fixture(vec![feature("f1", FeatureStatus::Backlog)]).await;
        let outcome = fx
            .adapter
            .on_drag_end(&DragEndEvent::feature("f1", DropTarget::Column("planning".into())))
            .await
            .unwrap();

        assert_eq!(outcome, DropOutcome::Moved);
        assert_eq!(fx.backend.feature("f1").unwrap().status, FeatureStatus::Planning);
    }

    #[tokio::test]
    async fn test_drag_move_reverts_on_backend_failure() {
        let fx = fixture(vec![
            feature("a", FeatureStatus::Backlog),
            feature("b", FeatureStatus::Backlog),
        ])
        .await;
        fx.backend.set_offline(true);

        let result = fx
            .adapter
            .on_drag_end(&DragEndEvent::feature("a", DropTarget::Item("x".into())))
            .await;
        assert_eq!(result.unwrap(), DropOutcome::Ignored);

        let err = fx
            .adapter
            .on_drag_end(&DragEndEvent::feature("a", DropTarget::Column("in_progress".into())))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Backend(_)));

        let store = fx.adapter.features();
        let store = store.read().await;
        let ids: Vec<_> = store.features().iter().map(|f| f.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert_eq!(store.get("a").unwrap().status, FeatureStatus::Backlog);
    }

    #[tokio::test]
    async fn test_drag_reorder_stays_local() {
        let fx = fixture(vec![
            feature("a", FeatureStatus::Backlog),
            feature("b", FeatureStatus::Backlog),
        ])
        .await;
        let calls = fx.backend.calls();

        let outcome = fx
            .adapter
            .on_drag_end(&DragEndEvent::feature("a", DropTarget::Item("b".into())))
            .await
            .unwrap();
        assert_eq!(outcome, DropOutcome::Reordered);
        assert_eq!(fx.adapter.features().read().await.features()[0].id, "b");
        assert_eq!(fx.backend.calls(), calls);
    }

    #[tokio::test]
    async fn test_task_drag_reverts_on_backend_failure() {
        let fx = fixture(vec![]).await;
        fx.adapter
            .tasks()
            .write()
            .await
            .add_task(Task::new("t1", "f1", "Schema"))
            .unwrap();
        fx.backend.set_offline(true);

        let result = fx
            .adapter
            .on_drag_end(&DragEndEvent::task("t1", DropTarget::Column("ready".into())))
            .await;
        assert!(matches!(result, Err(Error::Backend(_))));
        assert_eq!(
            fx.adapter.tasks().read().await.get("t1").unwrap().status,
            TaskStatus::Pending
        );
    }

    #[tokio::test]
    async fn test_failed_task_rollback_releases_dependents() {
        let fx = fixture(vec![]).await;
        {
            let tasks = fx.adapter.tasks();
            let mut tasks = tasks.write().await;
            tasks.add_task(Task::new("t1", "f1", "Schema")).unwrap();
            tasks
                .add_task(Task::new("t2", "f1", "API").with_dependency("t1"))
                .unwrap();
            for status in [TaskStatus::Ready, TaskStatus::Queued, TaskStatus::InProgress] {
                tasks.update_task("t1", &TaskUpdate::status(status)).unwrap();
            }
        }
        fx.backend.set_offline(true);

        let result = fx
            .adapter
            .update_task("t1", &TaskUpdate::status(TaskStatus::Failed))
            .await;
        assert!(result.is_err());

        let tasks = fx.adapter.tasks();
        let tasks = tasks.read().await;
        assert_eq!(tasks.get("t1").unwrap().status, TaskStatus::InProgress);
        assert_eq!(tasks.get("t2").unwrap().status, TaskStatus::Pending);
        assert_eq!(tasks.run().failed_count, 0);
    }

    #[tokio::test]
    async fn test_completion_rollback_reopens_run() {
        let fx = fixture(vec![]).await;
        {
            let tasks = fx.adapter.tasks();
            let mut tasks = tasks.write().await;
            tasks.add_task(Task::new("t1", "f1", "Only")).unwrap();
            tasks.start_execution().unwrap();
            for status in [
                TaskStatus::Queued,
                TaskStatus::InProgress,
                TaskStatus::AiReview,
                TaskStatus::HumanReview,
            ] {
                tasks.update_task("t1", &TaskUpdate::status(status)).unwrap();
            }
        }
        fx.backend.set_offline(true);

        let result = fx
            .adapter
            .update_task("t1", &TaskUpdate::status(TaskStatus::Completed))
            .await;
        assert!(result.is_err());

        let tasks = fx.adapter.tasks();
        let tasks = tasks.read().await;
        assert_eq!(tasks.get("t1").unwrap().status, TaskStatus::HumanReview);
        assert_eq!(tasks.run().status, ExecutionStatus::Running);
        assert_eq!(tasks.run().completed_count, 0);
    }

    /// Holds priority updates until a title update has been confirmed, then
    /// fails them
    struct InterleavingBackend {
        inner: InMemoryBackend,
        title_confirmed: Notify,
    }

    #[async_trait]
    impl ExecutionBackend for InterleavingBackend {
        async fn get_features(&self, project_id: &str) -> Result<Vec<Feature>> {
            self.inner.get_features(project_id).await
        }

        async fn create_feature(&self, input: &NewFeature) -> Result<Feature> {
            self.inner.create_feature(input).await
        }

        async fn update_feature(
            &self,
            id: &str,
            update: &FeatureUpdate,
        ) -> Result<Option<Feature>> {
            if update.priority.is_some() {
                self.title_confirmed.notified().await;
                return Err(Error::Backend("priority rejected".into()));
            }
            let confirmed = self.inner.update_feature(id, update).await;
            self.title_confirmed.notify_one();
            confirmed
        }

        async fn delete_feature(&self, id: &str) -> Result<bool> {
            self.inner.delete_feature(id).await
        }

        async fn update_task(&self, id: &str, update: &TaskUpdate) -> Result<()> {
            self.inner.update_task(id, update).await
        }

        fn subscribe_features(&self) -> broadcast::Receiver<Feature> {
            self.inner.subscribe_features()
        }

        fn subscribe_tasks(&self) -> broadcast::Receiver<RemoteTaskUpdate> {
            self.inner.subscribe_tasks()
        }
    }

    #[tokio::test]
    async fn test_failed_update_keeps_overlapping_confirmed_edit() {
        let backend = Arc::new(InterleavingBackend {
            inner: InMemoryBackend::default()
                .with_features(PROJECT, vec![Feature::with_id("f1", "Old")]),
            title_confirmed: Notify::new(),
        });
        let adapter = BackendSyncAdapter::new(
            Arc::new(RwLock::new(FeatureStore::default())),
            Arc::new(RwLock::new(ExecutionStore::default())),
            backend.clone(),
            PROJECT,
        );
        adapter.load_features().await.unwrap();

        let rename = FeatureUpdate {
            title: Some("New".to_string()),
            ..Default::default()
        };
        let raise = FeatureUpdate::priority(Priority::High);
        let (priority, title) = tokio::join!(
            adapter.update_feature("f1", &raise),
            adapter.update_feature("f1", &rename),
        );
        assert!(priority.is_err());
        title.unwrap();

        let local = adapter.features().read().await.get("f1").cloned().unwrap();
        let remote = backend.inner.feature("f1").unwrap();
        assert_eq!(local.title, "New");
        assert_eq!(remote.title, "New");
        assert_eq!(local.priority, Priority::Medium);
        assert_eq!(local.priority, remote.priority);
    }

    /// Records what the local store shows while the remote call is pending
    struct ObservingBackend {
        inner: InMemoryBackend,
        features: SharedFeatureStore,
        seen: std::sync::Mutex<Option<Priority>>,
    }

    #[async_trait]
    impl ExecutionBackend for ObservingBackend {
        async fn get_features(&self, project_id: &str) -> Result<Vec<Feature>> {
            self.inner.get_features(project_id).await
        }

        async fn create_feature(&self, input: &NewFeature) -> Result<Feature> {
            self.inner.create_feature(input).await
        }

        async fn update_feature(
            &self,
            id: &str,
            _update: &FeatureUpdate,
        ) -> Result<Option<Feature>> {
            let priority = self.features.read().await.get(id).map(|f| f.priority);
            *self.seen.lock().unwrap() = priority;
            Err(Error::Backend("rejected".into()))
        }

        async fn delete_feature(&self, id: &str) -> Result<bool> {
            self.inner.delete_feature(id).await
        }

        async fn update_task(&self, id: &str, update: &TaskUpdate) -> Result<()> {
            self.inner.update_task(id, update).await
        }

        fn subscribe_features(&self) -> broadcast::Receiver<Feature> {
            self.inner.subscribe_features()
        }

        fn subscribe_tasks(&self) -> broadcast::Receiver<RemoteTaskUpdate> {
            self.inner.subscribe_tasks()
        }
    }

    #[tokio::test]
    async fn test_optimistic_priority_visible_then_reverted() {
        let features: SharedFeatureStore = Arc::new(RwLock::new(FeatureStore::default()));
        features
            .write()
            .await
            .add(feature("f1", FeatureStatus::Backlog))
            .unwrap();
        let backend = Arc::new(ObservingBackend {
            inner: InMemoryBackend::default(),
            features: features.clone(),
            seen: std::sync::Mutex::new(None),
        });
        let adapter = BackendSyncAdapter::new(
            features.clone(),
            Arc::new(RwLock::new(ExecutionStore::default())),
            backend.clone(),
            PROJECT,
        );

        let result = adapter
            .update_feature("f1", &FeatureUpdate::priority(Priority::High))
            .await;

        assert!(result.is_err());
        assert_eq!(*backend.seen.lock().unwrap(), Some(Priority::High));
        assert_eq!(features.read().await.get("f1").unwrap().priority, Priority::Medium);
    }
}
