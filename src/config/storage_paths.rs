//! StorageConfig and resolved directory roles for the durable store.

use crate::config::paths;
use crate::error::SyncError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

fn default_states_dir() -> PathBuf {
    PathBuf::from("states")
}

fn default_workflows_dir() -> PathBuf {
    PathBuf::from("workflows")
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("results")
}

fn default_temp_dir() -> PathBuf {
    PathBuf::from("temp")
}

/// Storage configuration
///
/// Each directory role is configured independently so it can be inspected or
/// backed up on its own. Relative paths are resolved against `root`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base directory; platform data directory when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<PathBuf>,

    /// One record file per state identifier
    #[serde(default = "default_states_dir")]
    pub states_dir: PathBuf,

    /// Workflow artifacts (owned by the orchestration layer)
    #[serde(default = "default_workflows_dir")]
    pub workflows_dir: PathBuf,

    /// Task results (owned by the orchestration layer)
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    /// Scratch space (record writes stage beside their target instead)
    #[serde(default = "default_temp_dir")]
    pub temp_dir: PathBuf,
}

/// Absolute storage locations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoragePaths {
    pub states: PathBuf,
    pub workflows: PathBuf,
    pub results: PathBuf,
    pub temp: PathBuf,
}

impl StoragePaths {
    /// Default directory layout under `root`
    pub fn under(root: &Path) -> Self {
        Self {
            states: root.join(default_states_dir()),
            workflows: root.join(default_workflows_dir()),
            results: root.join(default_results_dir()),
            temp: root.join(default_temp_dir()),
        }
    }

    pub fn all(&self) -> [&Path; 4] {
        [&self.states, &self.workflows, &self.results, &self.temp]
    }
}

impl StorageConfig {
    /// Resolve directory roles, preferring `root_override` over the configured root.
    pub fn resolve_paths(&self, root_override: Option<&Path>) -> Result<StoragePaths, SyncError> {
        let root = match (root_override, &self.root) {
            (Some(root), _) => root.to_path_buf(),
            (None, Some(root)) => root.clone(),
            (None, None) => paths::data_root()?,
        };

        // `join` keeps absolute role paths as-is
        Ok(StoragePaths {
            states: root.join(&self.states_dir),
            workflows: root.join(&self.workflows_dir),
            results: root.join(&self.results_dir),
            temp: root.join(&self.temp_dir),
        })
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: None,
            states_dir: default_states_dir(),
            workflows_dir: default_workflows_dir(),
            results_dir: default_results_dir(),
            temp_dir: default_temp_dir(),
        }
    }
}
