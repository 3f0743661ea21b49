//! In-process state store.
//!
//! Same contract as the file store without touching disk. Useful for embedding
//! the engine in tests or in single-process deployments.

use crate::error::StorageError;
use crate::store::StateStore;
use crate::types::{StateID, StateRecord};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;

#[derive(Default)]
pub struct MemoryStateStore {
    records: RwLock<BTreeMap<StateID, StateRecord>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn initialize_directories(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn write_record(&self, record: &StateRecord) -> Result<(), StorageError> {
        self.records
            .write()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn read_record(&self, id: &str) -> Result<Option<StateRecord>, StorageError> {
        Ok(self.records.read().get(id).cloned())
    }

    async fn list_ids(&self) -> Result<Vec<StateID>, StorageError> {
        Ok(self.records.read().keys().cloned().collect())
    }

    async fn delete_record(&self, id: &str) -> Result<bool, StorageError> {
        Ok(self.records.write().remove(id).is_some())
    }
}
