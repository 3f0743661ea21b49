//! ConfigLoader facade delegating to merge service.

use super::merge::service::MergeService;
use super::SyncConfig;
use crate::error::SyncError;
use std::path::Path;

/// Configuration loader facade.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from defaults and environment, plus `path` when given.
    pub fn load(path: Option<&Path>) -> Result<SyncConfig, SyncError> {
        Ok(MergeService::load(path)?)
    }

    /// Load configuration from a specific file that must exist.
    pub fn load_from_file(path: &Path) -> Result<SyncConfig, SyncError> {
        if !path.exists() {
            return Err(SyncError::Config(format!(
                "Config file not found: {}",
                path.display()
            )));
        }
        Self::load(Some(path))
    }

    /// Create default configuration.
    pub fn default() -> SyncConfig {
        SyncConfig::default()
    }
}
