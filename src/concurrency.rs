//! Per-state lock table
//!
//! Serializes mutations to a single state identifier while leaving unrelated
//! identifiers free to proceed. Each identifier maps to a single-permit
//! semaphore created on first use: holding the lock means the permit has been
//! taken. Waiters suspend their task rather than the thread and are granted the
//! lock in arrival order.
//!
//! The table carries no ownership token. A holder that calls `acquire` again on
//! the same identifier before releasing will wait on itself forever; callers must
//! not re-enter.

use crate::error::SyncError;
use crate::types::StateID;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

/// Lock table keyed by state identifier
pub struct LockTable {
    /// Map from StateID to its single-permit semaphore
    locks: Mutex<HashMap<StateID, Arc<Semaphore>>>,
}

impl LockTable {
    pub fn new() -> Self {
        Self {
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create the semaphore backing a state's lock
    fn get_lock(&self, id: &str) -> Arc<Semaphore> {
        let mut map = self.locks.lock();
        map.entry(id.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(1)))
            .clone()
    }

    /// Take the permit of the semaphore currently registered for `id`
    async fn acquire_semaphore(&self, id: &str) -> Result<Arc<Semaphore>, SyncError> {
        let lock = self.get_lock(id);
        let permit = lock
            .acquire()
            .await
            .map_err(|_| SyncError::LockClosed(id.to_string()))?;
        // The permit is handed back explicitly, not by scope.
        permit.forget();
        debug!(state_id = %id, "Lock acquired");
        Ok(lock)
    }

    /// Acquire the lock for `id`, suspending until it is free
    ///
    /// Fails with `LockClosed` if the table is cleared while waiting.
    pub async fn acquire(&self, id: &str) -> Result<(), SyncError> {
        self.acquire_semaphore(id).await.map(|_| ())
    }

    /// Acquire the lock for `id`, giving up after `timeout`
    pub async fn acquire_timeout(&self, id: &str, timeout: Duration) -> Result<(), SyncError> {
        self.acquire_semaphore_timeout(id, timeout).await.map(|_| ())
    }

    async fn acquire_semaphore_timeout(
        &self,
        id: &str,
        timeout: Duration,
    ) -> Result<Arc<Semaphore>, SyncError> {
        match tokio::time::timeout(timeout, self.acquire_semaphore(id)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    state_id = %id,
                    timeout_ms = timeout.as_millis() as u64,
                    "Timed out waiting for lock"
                );
                Err(SyncError::LockTimeout {
                    id: id.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
            }
        }
    }

    /// Release the lock for `id`, letting the next waiter proceed
    ///
    /// Releasing a lock that is not held is a no-op.
    pub fn release(&self, id: &str) {
        let map = self.locks.lock();
        match map.get(id) {
            Some(lock) if lock.available_permits() == 0 => {
                lock.add_permits(1);
                debug!(state_id = %id, "Lock released");
            }
            Some(_) => {
                warn!(state_id = %id, "Release called on a lock that is not held");
            }
            None => {
                debug!(state_id = %id, "Release called with no lock entry");
            }
        }
    }

    /// Acquire the lock and return a guard that releases it on drop
    ///
    /// The guard releases the semaphore it acquired. If the table is cleared
    /// while the guard is alive, dropping it leaves any newer entry for `id`
    /// untouched.
    pub async fn hold(&self, id: &str, timeout: Option<Duration>) -> Result<LockHold, SyncError> {
        let lock = match timeout {
            Some(timeout) => self.acquire_semaphore_timeout(id, timeout).await?,
            None => self.acquire_semaphore(id).await?,
        };
        Ok(LockHold {
            lock,
            id: id.to_string(),
        })
    }

    /// Whether the lock for `id` is currently held
    pub fn is_held(&self, id: &str) -> bool {
        self.locks
            .lock()
            .get(id)
            .map(|lock| lock.available_permits() == 0)
            .unwrap_or(false)
    }

    /// Number of identifiers whose lock is currently held
    pub fn held_count(&self) -> usize {
        self.locks
            .lock()
            .values()
            .filter(|lock| lock.available_permits() == 0)
            .count()
    }

    /// Drop every lock entry, waking pending waiters with `LockClosed`
    pub fn clear(&self) {
        let drained = std::mem::take(&mut *self.locks.lock());
        for lock in drained.values() {
            lock.close();
        }
        debug!(cleared = drained.len(), "Lock table cleared");
    }
}

impl Default for LockTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Scoped hold on a state lock, released when dropped
pub struct LockHold {
    lock: Arc<Semaphore>,
    id: StateID,
}

impl LockHold {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Whether the table was cleared since this hold was taken
    pub fn is_cleared(&self) -> bool {
        self.lock.is_closed()
    }
}

impl Drop for LockHold {
    fn drop(&mut self) {
        if self.lock.is_closed() {
            debug!(state_id = %self.id, "Dropped hold on a cleared lock");
        } else if self.lock.available_permits() == 0 {
            self.lock.add_permits(1);
            debug!(state_id = %self.id, "Lock released");
        }
    }
}
