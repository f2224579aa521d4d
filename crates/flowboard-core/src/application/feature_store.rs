//! Feature store
//!
//! Owns the ordered feature collection behind the kanban board. Every
//! mutation goes through here so the WIP limit and event emission apply
//! uniformly, whether the caller is a button, a drag, or the sync adapter.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::ordering::reorder_subsequence;
use super::validators::FeatureValidator;
use crate::config::BoardConfig;
use crate::domain::events::{EventPublisher, FeatureEvent, NullPublisher};
use crate::domain::{Feature, FeatureStatus, FeatureUpdate, Priority, TaskSummary};
use crate::error::{Error, Result};

/// Default number of features allowed in progress at once
pub const DEFAULT_WIP_LIMIT: usize = 3;

/// What an optimistic feature change needs to take itself back
#[derive(Debug, Clone)]
pub struct FeatureUndo {
    before: Feature,
    index: usize,
    applied: FeatureUpdate,
    applied_index: usize,
    applied_status: FeatureStatus,
}

/// Read-side filter over the canonical feature list
///
/// Empty sets match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureFilter {
    pub search: String,
    pub priorities: HashSet<Priority>,
    pub statuses: HashSet<FeatureStatus>,
}

impl FeatureFilter {
    pub fn matches(&self, feature: &Feature) -> bool {
        feature.matches_text(&self.search)
            && (self.priorities.is_empty() || self.priorities.contains(&feature.priority))
            && (self.statuses.is_empty() || self.statuses.contains(&feature.status))
    }

    pub fn is_active(&self) -> bool {
        !self.search.trim().is_empty() || !self.priorities.is_empty() || !self.statuses.is_empty()
    }
}

/// Ordered collection of features with admission control
pub struct FeatureStore {
    features: Vec<Feature>,
    wip_limit: usize,
    filter: FeatureFilter,
    publisher: Arc<dyn EventPublisher>,
}

impl std::fmt::Debug for FeatureStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FeatureStore")
            .field("features", &self.features.len())
            .field("wip_limit", &self.wip_limit)
            .field("filter", &self.filter)
            .finish()
    }
}

impl Default for FeatureStore {
    fn default() -> Self {
        Self::new(DEFAULT_WIP_LIMIT, Arc::new(NullPublisher))
    }
}

impl FeatureStore {
    pub fn new(wip_limit: usize, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            features: Vec::new(),
            wip_limit: wip_limit.max(1),
            filter: FeatureFilter::default(),
            publisher,
        }
    }

    pub fn from_config(config: &BoardConfig, publisher: Arc<dyn EventPublisher>) -> Self {
        Self::new(config.wip_limit, publisher)
    }

    // ========== Reads ==========

    /// Canonical order, unfiltered
    pub fn features(&self) -> &[Feature] {
        &self.features
    }

    pub fn get(&self, id: &str) -> Option<&Feature> {
        self.features.iter().find(|f| f.id == id)
    }

    pub fn position(&self, id: &str) -> Option<usize> {
        self.features.iter().position(|f| f.id == id)
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    pub fn wip_limit(&self) -> usize {
        self.wip_limit
    }

    pub fn set_wip_limit(&mut self, limit: usize) {
        self.wip_limit = limit.max(1);
    }

    /// Number of features in `status`, ignoring filters
    pub fn count(&self, status: FeatureStatus) -> usize {
        self.features.iter().filter(|f| f.status == status).count()
    }

    /// Per-column totals in board order
    pub fn counts(&self) -> Vec<(FeatureStatus, usize)> {
        FeatureStatus::all()
            .into_iter()
            .map(|s| (s, self.count(s)))
            .collect()
    }

    /// Whether a move of `id` into `status` would be admitted right now
    pub fn can_move(&self, id: &str, status: FeatureStatus) -> bool {
        match self.get(id) {
            Some(feature) => self.admits(feature.status, status),
            None => false,
        }
    }

    fn admits(&self, from: FeatureStatus, to: FeatureStatus) -> bool {
        to != FeatureStatus::InProgress
            || from == FeatureStatus::InProgress
            || self.count(FeatureStatus::InProgress) < self.wip_limit
    }

    /// Filtered features of one column, in canonical order
    pub fn column(&self, status: FeatureStatus) -> Vec<&Feature> {
        self.features
            .iter()
            .filter(|f| f.status == status && self.filter.matches(f))
            .collect()
    }

    /// Position of `id` within its column, ignoring filters
    pub fn index_in_column(&self, id: &str) -> Option<usize> {
        let status = self.get(id)?.status;
        self.features
            .iter()
            .filter(|f| f.status == status)
            .position(|f| f.id == id)
    }

    /// Every feature passing the filter, in canonical order
    pub fn visible(&self) -> Vec<&Feature> {
        self.features.iter().filter(|f| self.filter.matches(f)).collect()
    }

    // ========== Filters ==========

    pub fn filter(&self) -> &FeatureFilter {
        &self.filter
    }

    pub fn set_search(&mut self, search: impl Into<String>) {
        self.filter.search = search.into();
    }

    pub fn set_priority_filter(&mut self, priorities: impl IntoIterator<Item = Priority>) {
        self.filter.priorities = priorities.into_iter().collect();
    }

    pub fn set_status_filter(&mut self, statuses: impl IntoIterator<Item = FeatureStatus>) {
        self.filter.statuses = statuses.into_iter().collect();
    }

    /// Add or remove a priority from the filter set
    pub fn toggle_priority(&mut self, priority: Priority) {
        if !self.filter.priorities.remove(&priority) {
            self.filter.priorities.insert(priority);
        }
    }

    pub fn clear_filters(&mut self) {
        self.filter = FeatureFilter::default();
    }

    // ========== Mutations ==========

    /// Add a feature at the end of the list
    pub fn add(&mut self, feature: Feature) -> Result<()> {
        FeatureValidator::validate_feature(&feature)?;
        if self.get(&feature.id).is_some() {
            return Err(Error::DuplicateFeature(feature.id));
        }

        info!(feature_id = %feature.id, status = %feature.status, "Feature added");
        self.publisher.publish(&FeatureEvent::created(&feature));
        self.features.push(feature);
        Ok(())
    }

    /// Replace the whole collection, e.g. after loading from the backend
    pub fn load(&mut self, features: Vec<Feature>) {
        let in_progress = features
            .iter()
            .filter(|f| f.status == FeatureStatus::InProgress)
            .count();
        if in_progress > self.wip_limit {
            warn!(
                in_progress,
                limit = self.wip_limit,
                "Loaded board exceeds the WIP limit"
            );
        }
        self.features = features;
    }

    /// Apply a partial update
    ///
    /// A status change obeys the same admission rule as [`move_feature`]
    /// and is refused as a whole when the WIP limit is reached.
    ///
    /// [`move_feature`]: FeatureStore::move_feature
    pub fn update(&mut self, id: &str, update: &FeatureUpdate) -> Result<()> {
        FeatureValidator::validate_update(update)?;
        let index = self
            .position(id)
            .ok_or_else(|| Error::FeatureNotFound(id.to_string()))?;

        let previous = self.features[index].status;
        let target = update.status.filter(|s| *s != previous);
        if let Some(target) = target
            && !self.admits(previous, target)
        {
            warn!(feature_id = %id, limit = self.wip_limit, "WIP limit reached, update refused");
            return Err(Error::WipLimitReached {
                limit: self.wip_limit,
            });
        }

        let feature = &mut self.features[index];
        update.apply_fields(feature);
        feature.touch();

        if let Some(target) = target {
            self.relocate(index, target, previous);
        }
        Ok(())
    }

    /// Remove a feature, returning its former position for a possible restore
    pub fn remove(&mut self, id: &str) -> Option<(usize, Feature)> {
        let index = self.position(id)?;
        let feature = self.features.remove(index);
        info!(feature_id = %id, "Feature removed");
        Some((index, feature))
    }

    /// Move a feature to another column
    ///
    /// Returns false, leaving the store untouched, when the feature is
    /// unknown or the move would exceed the WIP limit.
    pub fn move_feature(&mut self, id: &str, status: FeatureStatus) -> bool {
        self.try_move(id, status).is_ok()
    }

    /// [`move_feature`](FeatureStore::move_feature) with the refusal reason
    pub fn try_move(&mut self, id: &str, status: FeatureStatus) -> Result<()> {
        let index = self
            .position(id)
            .ok_or_else(|| Error::FeatureNotFound(id.to_string()))?;

        let previous = self.features[index].status;
        if previous == status {
            debug!(feature_id = %id, status = %status, "Feature already in column");
            return Ok(());
        }

        if !self.admits(previous, status) {
            warn!(
                feature_id = %id,
                limit = self.wip_limit,
                "WIP limit reached, move refused"
            );
            return Err(Error::WipLimitReached {
                limit: self.wip_limit,
            });
        }

        self.features[index].touch();
        self.relocate(index, status, previous);
        Ok(())
    }

    /// Set the status, append the feature to its new column and emit events
    fn relocate(&mut self, index: usize, status: FeatureStatus, previous: FeatureStatus) {
        let mut feature = self.features.remove(index);
        feature.status = status;

        info!(
            feature_id = %feature.id,
            from = %previous,
            to = %status,
            "Feature moved"
        );
        for event in FeatureEvent::for_move(&feature, previous) {
            self.publisher.publish(&event);
        }
        self.features.push(feature);
    }

    /// Reorder within one column; other columns keep their relative order
    pub fn reorder(&mut self, column: FeatureStatus, old_index: usize, new_index: usize) -> bool {
        let moved =
            reorder_subsequence(&mut self.features, |f| f.status == column, old_index, new_index);
        if moved {
            debug!(column = %column, old_index, new_index, "Column reordered");
        } else {
            debug!(column = %column, old_index, new_index, "Reorder ignored");
        }
        moved
    }

    /// Refresh the task summaries embedded in a feature card
    pub fn set_task_summaries(&mut self, id: &str, tasks: Vec<TaskSummary>) -> Result<()> {
        let feature = self
            .features
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| Error::FeatureNotFound(id.to_string()))?;
        feature.tasks = tasks;
        Ok(())
    }

    // ========== Sync support ==========

    /// [`update`](FeatureStore::update), returning what
    /// [`undo`](FeatureStore::undo) needs to take it back
    pub fn update_undoable(&mut self, id: &str, update: &FeatureUpdate) -> Result<FeatureUndo> {
        let (index, before) = self.snapshot(id)?;
        self.update(id, update)?;
        Ok(self.record_undo(before, index, update.clone()))
    }

    /// [`try_move`](FeatureStore::try_move), returning what
    /// [`undo`](FeatureStore::undo) needs to take it back
    pub fn move_undoable(&mut self, id: &str, status: FeatureStatus) -> Result<FeatureUndo> {
        let (index, before) = self.snapshot(id)?;
        self.try_move(id, status)?;
        Ok(self.record_undo(before, index, FeatureUpdate::status(status)))
    }

    /// Take back one optimistic change
    ///
    /// Fields changed again since the change was applied keep their newer
    /// value. A moved feature returns to its old slot only while it still
    /// sits where the move left it.
    pub fn undo(&mut self, undo: FeatureUndo) {
        let FeatureUndo {
            before,
            index: old_index,
            applied,
            applied_index,
            applied_status,
        } = undo;
        let Some(index) = self.position(&before.id) else {
            warn!(feature_id = %before.id, "Feature gone before rollback");
            return;
        };

        let feature = &mut self.features[index];
        applied.revert_fields(&before, feature);
        if before.status != applied_status && feature.status == applied_status {
            feature.status = before.status;
            if index == applied_index {
                let feature = self.features.remove(index);
                self.features.insert(old_index.min(self.features.len()), feature);
            }
            debug!(feature_id = %before.id, status = %before.status, "Move rolled back");
        }
    }

    fn snapshot(&self, id: &str) -> Result<(usize, Feature)> {
        let index = self
            .position(id)
            .ok_or_else(|| Error::FeatureNotFound(id.to_string()))?;
        Ok((index, self.features[index].clone()))
    }

    fn record_undo(&self, before: Feature, index: usize, applied: FeatureUpdate) -> FeatureUndo {
        let applied_index = self.position(&before.id).unwrap_or(index);
        let applied_status = self
            .features
            .get(applied_index)
            .map_or(before.status, |f| f.status);
        FeatureUndo {
            before,
            index,
            applied,
            applied_index,
            applied_status,
        }
    }

    /// Put a feature snapshot back at `index`, replacing any current copy
    pub fn restore(&mut self, index: usize, feature: Feature) {
        self.features.retain(|f| f.id != feature.id);
        let index = index.min(self.features.len());
        debug!(feature_id = %feature.id, index, "Feature restored");
        self.features.insert(index, feature);
    }

    /// Overwrite a feature in place without admission checks or events
    pub fn replace(&mut self, feature: Feature) -> Result<()> {
        let index = self
            .position(&feature.id)
            .ok_or_else(|| Error::FeatureNotFound(feature.id.clone()))?;
        self.features[index] = feature;
        Ok(())
    }

    /// Swap a provisional feature for the backend's version of it
    pub fn rekey(&mut self, provisional_id: &str, feature: Feature) -> Result<()> {
        let index = self
            .position(provisional_id)
            .ok_or_else(|| Error::FeatureNotFound(provisional_id.to_string()))?;
        self.features[index] = feature;
        Ok(())
    }

    /// Upsert a feature pushed by the backend
    ///
    /// The backend is authoritative, so the WIP limit is reported but not
    /// enforced here.
    pub fn apply_remote(&mut self, feature: Feature) {
        match self.position(&feature.id) {
            Some(index) => self.features[index] = feature,
            None => self.features.push(feature),
        }

        let in_progress = self.count(FeatureStatus::InProgress);
        if in_progress > self.wip_limit {
            warn!(
                in_progress,
                limit = self.wip_limit,
                "Backend update exceeds the WIP limit"
            );
        }
    }
}
