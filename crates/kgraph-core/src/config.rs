//! Runtime configuration.

use crate::ids::IdUtils;
use crate::reference::DataStage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_NAMESPACE: &str = "https://kg.example.org/instances/";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Top-level configuration of the structure and inference pipelines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KgConfig {
    /// Absolute-URL prefix of instance ids
    pub namespace: String,
    /// JSON snapshot of the reference store (if any)
    pub snapshot_path: Option<PathBuf>,
    pub structure: StructureConfig,
    pub reconcile: ReconcileConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    /// Repair incoming property links when a document's type list changes
    pub track_incoming_links: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReconcileConfig {
    /// Stage holding inferred instances
    pub stage: DataStage,
}

impl Default for KgConfig {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            snapshot_path: None,
            structure: StructureConfig::default(),
            reconcile: ReconcileConfig::default(),
        }
    }
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            track_incoming_links: true,
        }
    }
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            stage: DataStage::InProgress,
        }
    }
}

impl KgConfig {
    /// Load from a JSON file. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn id_utils(&self) -> IdUtils {
        IdUtils::new(self.namespace.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let config = KgConfig::load(&dir.path().join("absent.json")).unwrap();
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
        assert!(config.structure.track_incoming_links);
        assert_eq!(config.reconcile.stage, DataStage::InProgress);
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kgraph.json");
        std::fs::write(&path, r#"{"structure": {"track_incoming_links": false}}"#).unwrap();
        let config = KgConfig::load(&path).unwrap();
        assert!(!config.structure.track_incoming_links);
        assert_eq!(config.namespace, DEFAULT_NAMESPACE);
    }

    #[test]
    fn test_save_then_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("kgraph.json");
        let mut config = KgConfig::default();
        config.namespace = "https://example.com/ids/".to_string();
        config.save(&path).unwrap();
        assert_eq!(KgConfig::load(&path).unwrap().namespace, "https://example.com/ids/");
    }
}
