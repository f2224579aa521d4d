//! Remote execution backend
//!
//! The system of record for features and tasks. Every call may fail; the
//! sync adapter owns the optimistic bookkeeping around it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::debug;

use crate::domain::{Feature, FeatureUpdate, NewFeature, TaskUpdate};
use crate::error::{Error, Result};

/// Default capacity of the push channels
pub const DEFAULT_PUSH_BUFFER: usize = 64;

/// A task change pushed by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTaskUpdate {
    pub task_id: String,
    pub update: TaskUpdate,
}

#[async_trait]
pub trait ExecutionBackend: Send + Sync {
    async fn get_features(&self, project_id: &str) -> Result<Vec<Feature>>;

    async fn create_feature(&self, input: &NewFeature) -> Result<Feature>;

    /// `None` when the backend does not know the feature
    async fn update_feature(&self, id: &str, update: &FeatureUpdate) -> Result<Option<Feature>>;

    /// `false` when nothing was deleted
    async fn delete_feature(&self, id: &str) -> Result<bool>;

    async fn update_task(&self, id: &str, update: &TaskUpdate) -> Result<()>;

    fn subscribe_features(&self) -> broadcast::Receiver<Feature>;

    fn subscribe_tasks(&self) -> broadcast::Receiver<RemoteTaskUpdate>;
}

#[derive(Debug, Default)]
struct BackendState {
    projects: HashMap<String, Vec<Feature>>,
    task_updates: Vec<(String, TaskUpdate)>,
    offline: bool,
    fail_next: usize,
}

impl BackendState {
    fn find_mut(&mut self, id: &str) -> Option<&mut Feature> {
        self.projects
            .values_mut()
            .flat_map(|features| features.iter_mut())
            .find(|f| f.id == id)
    }
}

/// In-process backend with failure injection
#[derive(Debug)]
pub struct InMemoryBackend {
    state: Mutex<BackendState>,
    feature_tx: broadcast::Sender<Feature>,
    task_tx: broadcast::Sender<RemoteTaskUpdate>,
    calls: AtomicUsize,
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new(DEFAULT_PUSH_BUFFER)
    }
}

impl InMemoryBackend {
    pub fn new(push_buffer: usize) -> Self {
        let (feature_tx, _) = broadcast::channel(push_buffer.max(1));
        let (task_tx, _) = broadcast::channel(push_buffer.max(1));
        Self {
            state: Mutex::new(BackendState::default()),
            feature_tx,
            task_tx,
            calls: AtomicUsize::new(0),
        }
    }

    /// Seed a project's features
    pub fn with_features(self, project_id: impl Into<String>, features: Vec<Feature>) -> Self {
        self.lock().projects.insert(project_id.into(), features);
        self
    }

    /// Fail every call until switched back
    pub fn set_offline(&self, offline: bool) {
        self.lock().offline = offline;
    }

    /// Fail the next `count` calls
    pub fn fail_next(&self, count: usize) {
        self.lock().fail_next = count;
    }

    /// Number of remote calls received, failed ones included
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn feature(&self, id: &str) -> Option<Feature> {
        self.lock().find_mut(id).map(|f| f.clone())
    }

    /// Task updates received so far, oldest first
    pub fn task_updates(&self) -> Vec<(String, TaskUpdate)> {
        self.lock().task_updates.clone()
    }

    /// Broadcast a feature change to subscribers
    pub fn push_feature(&self, feature: Feature) {
        // No subscribers is not an error
        let _ = self.feature_tx.send(feature);
    }

    /// Broadcast a task change to subscribers
    pub fn push_task(&self, task_id: impl Into<String>, update: TaskUpdate) {
        let _ = self.task_tx.send(RemoteTaskUpdate {
            task_id: task_id.into(),
            update,
        });
    }

    fn lock(&self) -> MutexGuard<'_, BackendState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Count the call and apply injected failures
    fn begin(&self, operation: &str) -> Result<MutexGuard<'_, BackendState>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if state.offline {
            return Err(Error::Backend(format!("{}: backend offline", operation)));
        }
        if state.fail_next > 0 {
            state.fail_next -= 1;
            return Err(Error::Backend(format!("{}: injected failure", operation)));
        }
        debug!(operation, "Backend call");
        Ok(state)
    }
}

#[async_trait]
impl ExecutionBackend for InMemoryBackend {
    async fn get_features(&self, project_id: &str) -> Result<Vec<Feature>> {
        let state = self.begin("get_features")?;
        Ok(state.projects.get(project_id).cloned().unwrap_or_default())
    }

    async fn create_feature(&self, input: &NewFeature) -> Result<Feature> {
        let mut state = self.begin("create_feature")?;
        let feature = input.to_provisional();
        state
            .projects
            .entry(input.project_id.clone())
            .or_default()
            .push(feature.clone());
        Ok(feature)
    }

    async fn update_feature(&self, id: &str, update: &FeatureUpdate) -> Result<Option<Feature>> {
        let mut state = self.begin("update_feature")?;
        let Some(feature) = state.find_mut(id) else {
            return Ok(None);
        };
        update.apply_fields(feature);
        if let Some(status) = update.status {
            feature.status = status;
        }
        feature.updated_at = Utc::now();
        Ok(Some(feature.clone()))
    }

    async fn delete_feature(&self, id: &str) -> Result<bool> {
        let mut state = self.begin("delete_feature")?;
        let mut deleted = false;
        for features in state.projects.values_mut() {
            let before = features.len();
            features.retain(|f| f.id != id);
            deleted |= features.len() != before;
        }
        Ok(deleted)
    }

    async fn update_task(&self, id: &str, update: &TaskUpdate) -> Result<()> {
        let mut state = self.begin("update_task")?;
        state.task_updates.push((id.to_string(), update.clone()));
        Ok(())
    }

    fn subscribe_features(&self) -> broadcast::Receiver<Feature> {
        self.feature_tx.subscribe()
    }

    fn subscribe_tasks(&self) -> broadcast::Receiver<RemoteTaskUpdate> {
        self.task_tx.subscribe()
    }
}
