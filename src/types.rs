//! Core types for the state synchronization engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// StateID: caller-chosen key naming one synchronized piece of state
pub type StateID = String;

/// Version: count of accepted writes for an identifier
pub type Version = u64;

/// StateRecord: the cached and persisted unit of synchronized data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateRecord {
    pub id: StateID,
    /// Opaque payload, only inspected during conflict resolution
    pub state: Value,
    pub version: Version,
    /// Writer that produced this version
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
}

impl StateRecord {
    /// Build a record stamped with the current time
    pub fn new(
        id: impl Into<StateID>,
        state: Value,
        version: Version,
        agent_id: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            state,
            version,
            agent_id: agent_id.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn summary(&self) -> StateSummary {
        StateSummary {
            id: self.id.clone(),
            version: self.version,
            agent_id: self.agent_id.clone(),
            timestamp: self.timestamp,
        }
    }
}

/// Listing entry for a cached record (payload omitted)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSummary {
    pub id: StateID,
    pub version: Version,
    pub agent_id: String,
    pub timestamp: DateTime<Utc>,
}

/// Aggregate counters over the cache
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateStats {
    /// Distinct cached identifiers
    pub total_states: usize,
    /// Sum of current versions across cached identifiers
    pub total_versions: Version,
    /// `total_versions / total_states`, 0.0 when nothing is cached
    pub avg_version: f64,
}
