use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::TypeError;

/// What a history entry records.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryOperation {
    /// `/rkns` was derived from the raw blob.
    Populated,
    /// `/rkns` was deleted and derived again.
    Reset,
    /// The channel mapping in `/popis` was replaced.
    ChannelsRemapped,
    /// Any processing step outside the core lifecycle.
    Custom(String),
}

impl fmt::Display for HistoryOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Populated => write!(f, "populated"),
            Self::Reset => write!(f, "reset"),
            Self::ChannelsRemapped => write!(f, "channels_remapped"),
            Self::Custom(name) => write!(f, "{name}"),
        }
    }
}

/// One immutable entry of a document's append-only history log.
///
/// `seq` is 1-based and strictly increasing in append order. `details` is
/// an opaque structured payload owned by whichever step wrote the entry.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub seq: u64,
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub operation: HistoryOperation,
    #[serde(default)]
    pub details: serde_json::Value,
}

impl HistoryEntry {
    /// Create an entry stamped now.
    pub fn new(seq: u64, operation: HistoryOperation, details: serde_json::Value) -> Self {
        Self {
            seq,
            id: Uuid::now_v7(),
            timestamp: Utc::now(),
            operation,
            details,
        }
    }

    /// Node name under `/history`; zero-padded so lexical order is append order.
    pub fn node_name(&self) -> String {
        Self::node_name_for(self.seq)
    }

    pub fn node_name_for(seq: u64) -> String {
        format!("{seq:010}")
    }

    /// Attribute form of the entry.
    pub fn to_attributes(&self) -> Result<serde_json::Map<String, serde_json::Value>, TypeError> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => Ok(map),
            Ok(other) => Err(TypeError::InvalidHistoryEntry(format!(
                "expected an object, got {other}"
            ))),
            Err(e) => Err(TypeError::InvalidHistoryEntry(e.to_string())),
        }
    }

    pub fn from_attributes(
        attrs: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<Self, TypeError> {
        serde_json::from_value(serde_json::Value::Object(attrs.clone()))
            .map_err(|e| TypeError::InvalidHistoryEntry(e.to_string()))
    }
}
