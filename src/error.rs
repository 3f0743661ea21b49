//! Error types for the state synchronization engine.

use crate::types::StateID;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by a durable state store
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Corrupt record for {id}: {reason}")]
    Corrupt { id: StateID, reason: String },

    #[error("Invalid state id: {0:?}")]
    InvalidId(StateID),
}

impl StorageError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors surfaced by the engine's public operations
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("State sync engine not initialized")]
    NotInitialized,

    #[error("State not found: {0}")]
    NotFound(StateID),

    #[error("Unsupported conflict resolution strategy: {0}")]
    UnsupportedStrategy(String),

    #[error("Persistence failed: {0}")]
    Persistence(#[from] StorageError),

    #[error("Timed out after {timeout_ms}ms waiting for lock on {id}")]
    LockTimeout { id: StateID, timeout_ms: u64 },

    #[error("Lock table closed while waiting for {0}")]
    LockClosed(StateID),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<config::ConfigError> for SyncError {
    fn from(err: config::ConfigError) -> Self {
        SyncError::Config(err.to_string())
    }
}
