//! Durable State Store
//!
//! Persistence port consumed by the engine. One record per state identifier;
//! writes replace the previous record for that identifier. Implementations must
//! be safe to share across tasks.

pub mod file;
pub mod memory;

use crate::error::StorageError;
use crate::types::{StateID, StateRecord};
use async_trait::async_trait;

pub use file::FileStateStore;
pub use memory::MemoryStateStore;

/// Durable state store interface
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Ensure the storage location exists. Idempotent.
    async fn initialize_directories(&self) -> Result<(), StorageError>;

    /// Persist `record`, replacing any prior record with the same id
    async fn write_record(&self, record: &StateRecord) -> Result<(), StorageError>;

    async fn read_record(&self, id: &str) -> Result<Option<StateRecord>, StorageError>;

    /// Identifiers currently persisted, sorted
    async fn list_ids(&self) -> Result<Vec<StateID>, StorageError>;

    /// Remove the record for `id`; returns whether one existed
    async fn delete_record(&self, id: &str) -> Result<bool, StorageError>;
}
