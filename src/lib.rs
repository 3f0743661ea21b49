//! Statesync: Versioned State Synchronization for Cooperating Agents
//!
//! Agents share named pieces of mutable state through a local in-memory cache
//! backed by a durable file store. Writes to one identifier are serialized by a
//! per-identifier lock, each accepted write bumps a monotonic version, and
//! diverging views are reconciled with a named conflict resolution strategy.
//!
//! ```no_run
//! use statesync::{BroadcastSink, FileStateStore, StateSyncEngine};
//! use std::sync::Arc;
//!
//! # async fn demo() -> Result<(), statesync::SyncError> {
//! let sink = Arc::new(BroadcastSink::default());
//! let mut events = sink.subscribe();
//! let store = Arc::new(FileStateStore::under(std::path::Path::new("/var/lib/agents")));
//! let engine = StateSyncEngine::new(store, sink);
//! engine.initialize().await?;
//!
//! let version = engine
//!     .set_state("plan", serde_json::json!({"step": 1}), "planner")
//!     .await?;
//! assert_eq!(version, 1);
//! let _ = events.recv().await;
//! # Ok(())
//! # }
//! ```

pub mod concurrency;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod logging;
pub mod resolve;
pub mod store;
pub mod tooling;
pub mod types;

pub use concurrency::LockTable;
pub use engine::StateSyncEngine;
pub use error::{StorageError, SyncError};
pub use events::{BroadcastSink, EventSink, NullSink, SyncEvent};
pub use resolve::ConflictStrategy;
pub use store::{FileStateStore, MemoryStateStore, StateStore};
pub use types::{StateID, StateRecord, StateStats, StateSummary, Version};
