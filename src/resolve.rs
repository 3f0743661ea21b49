//! Conflict Resolution
//!
//! Stateless strategies that combine a local and a remote candidate value into
//! one. Payloads are opaque JSON; only the fields the strategy needs are read.
//!
//! - `merge`: shallow field merge of two objects, remote wins on collision, and the
//!   result is marked with `_merged: true`. If either side is not an object the
//!   remote value wins unmodified.
//! - `latest`: the candidate with the later `_timestamp` wins unmodified. Ties go
//!   to remote. A side whose `_timestamp` is missing or unparseable loses to one
//!   that has it; if neither has one, remote wins.

use crate::error::SyncError;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Marker field set on merged objects
pub const MERGED_FIELD: &str = "_merged";

/// Field carrying a candidate's logical write time
pub const TIMESTAMP_FIELD: &str = "_timestamp";

/// Named conflict resolution strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictStrategy {
    Merge,
    Latest,
}

impl ConflictStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStrategy::Merge => "merge",
            ConflictStrategy::Latest => "latest",
        }
    }

    /// Resolve two candidates under this strategy
    pub fn resolve(&self, local: &Value, remote: &Value) -> Value {
        match self {
            ConflictStrategy::Merge => merge(local, remote),
            ConflictStrategy::Latest => latest(local, remote),
        }
    }
}

impl fmt::Display for ConflictStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConflictStrategy {
    type Err = SyncError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        match name {
            "merge" => Ok(ConflictStrategy::Merge),
            "latest" => Ok(ConflictStrategy::Latest),
            other => Err(SyncError::UnsupportedStrategy(other.to_string())),
        }
    }
}

/// Shallow merge: local fields, overwritten by remote fields, plus `_merged`
pub fn merge(local: &Value, remote: &Value) -> Value {
    match (local, remote) {
        (Value::Object(local_fields), Value::Object(remote_fields)) => {
            let mut merged = local_fields.clone();
            for (key, value) in remote_fields {
                merged.insert(key.clone(), value.clone());
            }
            merged.insert(MERGED_FIELD.to_string(), Value::Bool(true));
            Value::Object(merged)
        }
        _ => remote.clone(),
    }
}

/// Last-writer-wins on the embedded `_timestamp` field
pub fn latest(local: &Value, remote: &Value) -> Value {
    let winner = match (embedded_timestamp(local), embedded_timestamp(remote)) {
        (Some(l), Some(r)) if l > r => local,
        (Some(_), None) => local,
        _ => remote,
    };
    winner.clone()
}

/// Read `_timestamp` as RFC 3339 text or integer epoch milliseconds
fn embedded_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value.get(TIMESTAMP_FIELD)? {
        Value::String(text) => DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        Value::Number(millis) => millis
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}
