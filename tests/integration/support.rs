use async_trait::async_trait;
use parking_lot::Mutex;
use statesync::{
    BroadcastSink, FileStateStore, MemoryStateStore, StateRecord, StateStore, StateSyncEngine,
    StorageError, SyncEvent,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::{broadcast, Notify, Semaphore};

/// Initialized engine over an in-memory store
pub async fn memory_engine() -> (Arc<StateSyncEngine>, Arc<MemoryStateStore>, Arc<BroadcastSink>) {
    let store = Arc::new(MemoryStateStore::new());
    let sink = Arc::new(BroadcastSink::new(1024));
    let engine = Arc::new(StateSyncEngine::new(store.clone(), sink.clone()));
    engine.initialize().await.unwrap();
    (engine, store, sink)
}

/// Initialized engine over a file store rooted in `dir`
pub async fn file_engine(dir: &TempDir) -> Arc<StateSyncEngine> {
    let store = Arc::new(FileStateStore::under(dir.path()));
    let engine = Arc::new(StateSyncEngine::new(store, Arc::new(BroadcastSink::default())));
    engine.initialize().await.unwrap();
    engine
}

/// Everything currently buffered on a receiver
pub fn drain(events: &mut broadcast::Receiver<SyncEvent>) -> Vec<SyncEvent> {
    let mut drained = Vec::new();
    while let Ok(event) = events.try_recv() {
        drained.push(event);
    }
    drained
}

/// Store whose writes fail while `failing` is set
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStateStore,
    pub failing: AtomicBool,
    pub attempts: Mutex<Vec<StateRecord>>,
}

impl FlakyStore {
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl StateStore for FlakyStore {
    async fn initialize_directories(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn write_record(&self, record: &StateRecord) -> Result<(), StorageError> {
        self.attempts.lock().push(record.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Io {
                path: "/flaky/states".into(),
                source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
            });
        }
        self.inner.write_record(record).await
    }

    async fn read_record(&self, id: &str) -> Result<Option<StateRecord>, StorageError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(StorageError::Serialization("unreadable".to_string()));
        }
        self.inner.read_record(id).await
    }

    async fn list_ids(&self) -> Result<Vec<String>, StorageError> {
        self.inner.list_ids().await
    }

    async fn delete_record(&self, id: &str) -> Result<bool, StorageError> {
        self.inner.delete_record(id).await
    }
}

/// Store whose writes park until the test opens the gate
pub struct GatedStore {
    pub inner: MemoryStateStore,
    /// Signalled each time a write reaches the store
    pub entered: Notify,
    gate: Semaphore,
}

impl Default for GatedStore {
    fn default() -> Self {
        Self {
            inner: MemoryStateStore::new(),
            entered: Notify::new(),
            gate: Semaphore::new(0),
        }
    }
}

impl GatedStore {
    /// Let `writes` parked or future writes through
    pub fn open(&self, writes: usize) {
        self.gate.add_permits(writes);
    }
}

#[async_trait]
impl StateStore for GatedStore {
    async fn initialize_directories(&self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn write_record(&self, record: &StateRecord) -> Result<(), StorageError> {
        self.entered.notify_one();
        self.gate
            .acquire()
            .await
            .expect("gate is never closed")
            .forget();
        self.inner.write_record(record).await
    }

    async fn read_record(&self, id: &str) -> Result<Option<StateRecord>, StorageError> {
        self.inner.read_record(id).await
    }

    async fn list_ids(&self) -> Result<Vec<String>, StorageError> {
        self.inner.list_ids().await
    }

    async fn delete_record(&self, id: &str) -> Result<bool, StorageError> {
        self.inner.delete_record(id).await
    }
}
