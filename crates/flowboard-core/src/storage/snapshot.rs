//! Board snapshot file
//!
//! The whole board (features, tasks and the run) as one pretty-printed JSON
//! document. Used by the CLI to keep a board between invocations.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::application::{ExecutionStore, FeatureStore};
use crate::config::Config;
use crate::domain::{EventPublisher, ExecutionRun, Feature, Task};
use crate::error::{Error, Result};

/// Current snapshot format version
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoardSnapshot {
    pub version: u32,
    #[serde(default)]
    pub features: Vec<Feature>,
    #[serde(default)]
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub run: ExecutionRun,
}

impl Default for BoardSnapshot {
    fn default() -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            features: Vec::new(),
            tasks: Vec::new(),
            run: ExecutionRun::default(),
        }
    }
}

impl BoardSnapshot {
    /// Load a snapshot; a missing file is an empty board
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "No board file, starting empty");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        let snapshot: Self = serde_json::from_str(&content)?;
        if snapshot.version > SNAPSHOT_VERSION {
            return Err(Error::InvalidInput(format!(
                "Board file version {} is newer than supported version {}",
                snapshot.version, SNAPSHOT_VERSION
            )));
        }
        Ok(snapshot)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!(
            path = %path.display(),
            features = self.features.len(),
            tasks = self.tasks.len(),
            "Board saved"
        );
        Ok(())
    }

    pub fn from_stores(features: &FeatureStore, tasks: &ExecutionStore) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            features: features.features().to_vec(),
            tasks: tasks.tasks().to_vec(),
            run: tasks.run().clone(),
        }
    }

    /// Build stores configured by `config`; tasks are validated as a graph
    pub fn into_stores(
        self,
        config: &Config,
        publisher: Arc<dyn EventPublisher>,
    ) -> Result<(FeatureStore, ExecutionStore)> {
        let mut features = FeatureStore::from_config(&config.board, publisher);
        features.load(self.features);

        let mut tasks = ExecutionStore::new(&config.execution);
        tasks.load_tasks(self.tasks)?;
        tasks.load_run(self.run);
        Ok((features, tasks))
    }
}
