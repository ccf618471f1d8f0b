//! JSON snapshots of a [`MemoryStore`].
//!
//! The whole store is written as one pretty-printed JSON file so that a host
//! process can pick up where a previous run stopped.

use crate::error::{StoreError, StoreResult};
use crate::memory::{MemoryStore, StoreState};
use kgraph_core::{DataStage, IdUtils};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Snapshot format version.
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Serialize, Deserialize)]
struct Snapshot {
    version: u32,
    namespace: String,
    #[serde(flatten)]
    state: StoreState,
}

impl MemoryStore {
    pub fn save_snapshot(&self, path: &Path) -> StoreResult<()> {
        let snapshot = Snapshot {
            version: SNAPSHOT_VERSION,
            namespace: self.id_utils().namespace().to_string(),
            state: self.state.read().clone(),
        };
        let json = serde_json::to_string_pretty(&snapshot)?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, json)?;
        tracing::info!(path = %path.display(), "saved store snapshot");
        Ok(())
    }

    /// Load a snapshot written by [`MemoryStore::save_snapshot`].
    pub fn load_snapshot(path: &Path, ids: IdUtils) -> StoreResult<Self> {
        let contents = std::fs::read_to_string(path)?;
        let snapshot: Snapshot = serde_json::from_str(&contents)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StoreError::MalformedDocument {
                id: path.display().to_string(),
                reason: format!("unsupported snapshot version {}", snapshot.version),
            });
        }
        let known: Vec<&str> = DataStage::ALL.iter().map(|s| s.as_str()).collect();
        if let Some(unknown) = snapshot.state.stages.keys().find(|k| !known.contains(&k.as_str())) {
            return Err(StoreError::MalformedDocument {
                id: path.display().to_string(),
                reason: format!("unknown stage {unknown}"),
            });
        }
        if snapshot.namespace != ids.namespace() {
            tracing::warn!(
                snapshot = %snapshot.namespace,
                configured = %ids.namespace(),
                "snapshot was written with a different namespace"
            );
        }
        Ok(MemoryStore::from_state(ids, snapshot.state))
    }

    /// Load the snapshot if the file exists, otherwise start empty.
    pub fn open(path: &Path, ids: IdUtils) -> StoreResult<Self> {
        if path.exists() {
            Self::load_snapshot(path, ids)
        } else {
            Ok(MemoryStore::new(ids))
        }
    }
}
