//! Lifecycle events emitted by the engine
//!
//! Observers (dashboards, message routers) subscribe to these instead of polling
//! the cache. The sink is injected at engine construction.

use crate::types::{StateID, Version};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;

/// Engine lifecycle event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum SyncEvent {
    /// One accepted write
    #[serde(rename = "state:updated", rename_all = "camelCase")]
    StateUpdated {
        id: StateID,
        version: Version,
        agent_id: String,
        value: Value,
    },
    /// One `resolve_conflict` call
    #[serde(rename = "conflict:resolved")]
    ConflictResolved {
        id: StateID,
        strategy: String,
        resolved: Value,
    },
    /// One `delete_state` call
    #[serde(rename = "state:deleted")]
    StateDeleted { id: StateID },
}

impl SyncEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            SyncEvent::StateUpdated { .. } => "state:updated",
            SyncEvent::ConflictResolved { .. } => "conflict:resolved",
            SyncEvent::StateDeleted { .. } => "state:deleted",
        }
    }

    pub fn state_id(&self) -> &str {
        match self {
            SyncEvent::StateUpdated { id, .. }
            | SyncEvent::ConflictResolved { id, .. }
            | SyncEvent::StateDeleted { id } => id,
        }
    }
}

/// Destination for engine events
pub trait EventSink: Send + Sync {
    fn publish(&self, event: SyncEvent);
}

/// Fan-out sink backed by a tokio broadcast channel
///
/// Receivers that fall behind by more than the channel capacity lose the oldest
/// events and observe `RecvError::Lagged`.
pub struct BroadcastSink {
    sender: broadcast::Sender<SyncEvent>,
}

impl BroadcastSink {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for BroadcastSink {
    fn default() -> Self {
        Self::new(256)
    }
}

impl EventSink for BroadcastSink {
    fn publish(&self, event: SyncEvent) {
        let name = event.name();
        // No subscribers is not an error
        if self.sender.send(event).is_err() {
            trace!(event = name, "Event dropped, no subscribers");
        }
    }
}

/// Sink that discards every event
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
    fn publish(&self, _event: SyncEvent) {}
}
