//! Configuration
//!
//! Layered configuration for the engine, its durable store, and logging.
//! Precedence: built-in defaults (lowest) -> config file -> `STATESYNC_*`
//! environment variables (highest).

mod facade;
pub mod merge;
pub mod paths;
pub mod sources;
pub mod storage_paths;

pub use facade::ConfigLoader;
pub use storage_paths::{StorageConfig, StoragePaths};

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncConfig {
    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_event_capacity() -> usize {
    256
}

/// Engine behaviour knobs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Upper bound on lock waits inside `set_state`; unbounded when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lock_timeout_ms: Option<u64>,

    /// Whether `delete_state` also removes the durable copy
    #[serde(default)]
    pub purge_on_delete: bool,

    /// Buffered events per broadcast subscriber
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl EngineConfig {
    pub fn lock_timeout(&self) -> Option<Duration> {
        self.lock_timeout_ms.map(Duration::from_millis)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lock_timeout_ms: None,
            purge_on_delete: false,
            event_capacity: default_event_capacity(),
        }
    }
}
