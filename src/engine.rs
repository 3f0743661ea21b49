//! State Synchronization Engine
//!
//! Versioned in-memory cache of state records backed by a durable store. Writes
//! to one identifier are serialized through the lock table and persisted before
//! the cache changes; every accepted mutation is announced on the event sink.
//!
//! Remote visibility goes through the shared store only: `load_remote_state`
//! and `sync_all_states` pull records written by peers into the local cache.
//! Loads are not serialized against a concurrent `set_state` on the same id, so a
//! load can race a local write.

use crate::concurrency::LockTable;
use crate::config::EngineConfig;
use crate::error::SyncError;
use crate::events::{BroadcastSink, EventSink, SyncEvent};
use crate::resolve::ConflictStrategy;
use crate::store::StateStore;
use crate::types::{StateID, StateRecord, StateStats, StateSummary, Version};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cached records, the version table, and first-insertion order
#[derive(Default)]
struct StateCache {
    records: HashMap<StateID, StateRecord>,
    versions: HashMap<StateID, Version>,
    order: Vec<StateID>,
}

impl StateCache {
    fn version_of(&self, id: &str) -> Version {
        self.versions.get(id).copied().unwrap_or(0)
    }

    fn insert(&mut self, record: StateRecord) {
        let id = record.id.clone();
        self.versions.insert(id.clone(), record.version);
        if self.records.insert(id.clone(), record).is_none() {
            self.order.push(id);
        }
    }

    fn remove(&mut self, id: &str) -> bool {
        self.versions.remove(id);
        let existed = self.records.remove(id).is_some();
        if existed {
            self.order.retain(|entry| entry != id);
        }
        existed
    }

    fn clear(&mut self) {
        self.records.clear();
        self.versions.clear();
        self.order.clear();
    }
}

/// State synchronization engine
pub struct StateSyncEngine {
    store: Arc<dyn StateStore>,
    events: Arc<dyn EventSink>,
    locks: LockTable,
    cache: RwLock<StateCache>,
    ready: AtomicBool,
    config: EngineConfig,
}

impl StateSyncEngine {
    /// Create an engine with default settings. Call `initialize` before use.
    pub fn new(store: Arc<dyn StateStore>, events: Arc<dyn EventSink>) -> Self {
        Self::with_config(store, events, EngineConfig::default())
    }

    pub fn with_config(
        store: Arc<dyn StateStore>,
        events: Arc<dyn EventSink>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            events,
            locks: LockTable::new(),
            cache: RwLock::new(StateCache::default()),
            ready: AtomicBool::new(false),
            config,
        }
    }

    /// Engine publishing to a fresh broadcast sink sized from `config`
    pub fn broadcasting(
        store: Arc<dyn StateStore>,
        config: EngineConfig,
    ) -> (Self, Arc<BroadcastSink>) {
        let sink = Arc::new(BroadcastSink::new(config.event_capacity));
        let engine = Self::with_config(store, sink.clone(), config);
        (engine, sink)
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Prepare the durable store and mark the engine ready
    pub async fn initialize(&self) -> Result<(), SyncError> {
        self.store.initialize_directories().await?;
        self.ready.store(true, Ordering::SeqCst);
        info!("State sync engine initialized");
        Ok(())
    }

    pub fn is_ready(&self) -> bool {
        self.ready.load(Ordering::SeqCst)
    }

    fn ensure_ready(&self) -> Result<(), SyncError> {
        if self.is_ready() {
            Ok(())
        } else {
            Err(SyncError::NotInitialized)
        }
    }

    /// Write a new version of `id` and return its version number
    ///
    /// The record is persisted before the cache changes, so a storage failure
    /// leaves the cache as it was. The lock is released on every path.
    ///
    /// If `shutdown` runs while the record is being persisted, the durable copy
    /// stays but the cache is left cleared and the call fails with
    /// `NotInitialized`.
    pub async fn set_state(
        &self,
        id: &str,
        value: Value,
        agent_id: &str,
    ) -> Result<Version, SyncError> {
        self.ensure_ready()?;
        let hold = self.locks.hold(id, self.config.lock_timeout()).await?;
        // Shutdown may have happened while we waited
        self.ensure_ready()?;

        let version = self.cache.read().version_of(id) + 1;
        let record = StateRecord::new(id, value, version, agent_id);

        if let Err(e) = self.store.write_record(&record).await {
            warn!(state_id = %id, version, error = %e, "Failed to persist state");
            return Err(e.into());
        }

        let value = record.state.clone();
        {
            let mut cache = self.cache.write();
            // `shutdown` marks not-ready before clearing the cache and closes the
            // lock table after, so one of these catches every overlap
            if hold.is_cleared() || !self.is_ready() {
                warn!(state_id = %id, version, "Engine shut down during write; cache not updated");
                return Err(SyncError::NotInitialized);
            }
            cache.insert(record);
        }

        debug!(state_id = %id, version, agent_id = %agent_id, "State updated");
        self.events.publish(SyncEvent::StateUpdated {
            id: id.to_string(),
            version,
            agent_id: agent_id.to_string(),
            value,
        });

        Ok(version)
    }

    /// Cached value for `id`; never consults the durable store
    pub fn get_state(&self, id: &str) -> Result<Option<Value>, SyncError> {
        self.ensure_ready()?;
        Ok(self.cache.read().records.get(id).map(|r| r.state.clone()))
    }

    /// Full cached record for `id`
    pub fn get_record(&self, id: &str) -> Result<Option<StateRecord>, SyncError> {
        self.ensure_ready()?;
        Ok(self.cache.read().records.get(id).cloned())
    }

    /// Cached version for `id`, if any
    pub fn get_version(&self, id: &str) -> Result<Option<Version>, SyncError> {
        self.ensure_ready()?;
        Ok(self.cache.read().versions.get(id).copied())
    }

    /// Pull the persisted record for `id` into the cache
    ///
    /// The stored version becomes the local baseline, even if it is lower than
    /// the cached one.
    pub async fn load_remote_state(&self, id: &str) -> Result<StateRecord, SyncError> {
        self.ensure_ready()?;
        let record = self
            .store
            .read_record(id)
            .await?
            .ok_or_else(|| SyncError::NotFound(id.to_string()))?;

        let previous = {
            let mut cache = self.cache.write();
            let previous = cache.versions.get(id).copied();
            cache.insert(record.clone());
            previous
        };

        debug!(
            state_id = %id,
            version = record.version,
            previous_version = ?previous,
            "Loaded remote state"
        );
        Ok(record)
    }

    /// Load every persisted record into the cache; returns how many were loaded
    ///
    /// Entries cached locally but absent from storage are kept. A record that
    /// fails to load does not stop the others: every readable record is cached,
    /// then the first failure is returned.
    pub async fn sync_all_states(&self) -> Result<usize, SyncError> {
        self.ensure_ready()?;
        let ids = self.store.list_ids().await?;
        let mut loaded = 0;
        let mut first_failure = None;
        for id in &ids {
            match self.load_remote_state(id).await {
                Ok(_) => loaded += 1,
                // Removed by a peer since it was listed
                Err(SyncError::NotFound(_)) => {
                    debug!(state_id = %id, "Persisted state vanished before load");
                }
                Err(e) => {
                    warn!(state_id = %id, error = %e, "Failed to load persisted state");
                    first_failure.get_or_insert(e);
                }
            }
        }

        if let Some(e) = first_failure {
            warn!(loaded, failed_of = ids.len(), "Partial sync from durable store");
            return Err(e);
        }
        info!(count = loaded, "Synchronized states from durable store");
        Ok(loaded)
    }

    /// Combine two divergent values under the named strategy
    ///
    /// Does not touch the cache; feed the result back through `set_state` to
    /// persist it.
    pub fn resolve_conflict(
        &self,
        id: &str,
        local: &Value,
        remote: &Value,
        strategy: &str,
    ) -> Result<Value, SyncError> {
        self.ensure_ready()?;
        let strategy: ConflictStrategy = strategy.parse()?;
        let resolved = strategy.resolve(local, remote);

        debug!(state_id = %id, strategy = %strategy, "Conflict resolved");
        self.events.publish(SyncEvent::ConflictResolved {
            id: id.to_string(),
            strategy: strategy.as_str().to_string(),
            resolved: resolved.clone(),
        });
        Ok(resolved)
    }

    /// Take the lock for `id`, suspending until it is free
    ///
    /// Pair every call with `release_lock`. Acquiring a lock already held by the
    /// caller deadlocks. Do not call `set_state` or `delete_state` on `id` while
    /// holding it.
    pub async fn acquire_lock(&self, id: &str) -> Result<(), SyncError> {
        self.ensure_ready()?;
        self.locks.acquire(id).await
    }

    /// Like `acquire_lock`, but gives up with `LockTimeout` after `timeout`
    pub async fn acquire_lock_timeout(
        &self,
        id: &str,
        timeout: Duration,
    ) -> Result<(), SyncError> {
        self.ensure_ready()?;
        self.locks.acquire_timeout(id, timeout).await
    }

    /// Release the lock for `id`, letting the next waiter in
    pub fn release_lock(&self, id: &str) -> Result<(), SyncError> {
        self.ensure_ready()?;
        self.locks.release(id);
        Ok(())
    }

    pub fn is_locked(&self, id: &str) -> bool {
        self.locks.is_held(id)
    }

    /// Drop `id` from the cache; returns whether it was cached
    ///
    /// The durable copy is removed too when `purge_on_delete` is set. Takes the
    /// lock for `id`, so a delete never interleaves with a write to it.
    pub async fn delete_state(&self, id: &str) -> Result<bool, SyncError> {
        self.ensure_ready()?;
        let hold = self.locks.hold(id, self.config.lock_timeout()).await?;
        self.ensure_ready()?;

        if self.config.purge_on_delete {
            let purged = self.store.delete_record(id).await?;
            debug!(state_id = %id, purged, "Purged durable copy");
        }

        let existed = {
            let mut cache = self.cache.write();
            if hold.is_cleared() || !self.is_ready() {
                return Err(SyncError::NotInitialized);
            }
            cache.remove(id)
        };
        debug!(state_id = %id, existed, "State deleted");
        self.events.publish(SyncEvent::StateDeleted { id: id.to_string() });
        Ok(existed)
    }

    /// Summaries of cached records in first-insertion order
    pub fn get_state_list(&self) -> Result<Vec<StateSummary>, SyncError> {
        self.ensure_ready()?;
        let cache = self.cache.read();
        Ok(cache
            .order
            .iter()
            .filter_map(|id| cache.records.get(id))
            .map(StateRecord::summary)
            .collect())
    }

    pub fn get_state_stats(&self) -> Result<StateStats, SyncError> {
        self.ensure_ready()?;
        let cache = self.cache.read();
        let total_states = cache.versions.len();
        let total_versions: Version = cache.versions.values().sum();
        let avg_version = if total_states == 0 {
            0.0
        } else {
            total_versions as f64 / total_states as f64
        };
        Ok(StateStats {
            total_states,
            total_versions,
            avg_version,
        })
    }

    /// Discard in-memory state and locks; durable copies are untouched
    ///
    /// Tasks waiting on a lock are woken with `LockClosed`. Every operation
    /// fails with `NotInitialized` until `initialize` is called again.
    pub fn shutdown(&self) {
        self.ready.store(false, Ordering::SeqCst);
        self.cache.write().clear();
        self.locks.clear();
        info!("State sync engine shut down");
    }
}
