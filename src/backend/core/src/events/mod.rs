//! Audit events.
//!
//! A [`LogEvent`] records one committed mutation. It travels over the bus as
//! JSON `{action, timestamp, entity_id, data}` and is written to the sink
//! unchanged. Events are immutable once built.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Result;

/// Kind of mutation an event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Create,
    Update,
    Delete,
    Reprioritize,
}

impl Action {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Reprioritize => "reprioritize",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An audit record of one mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    pub action: Action,
    /// Producer-side time of the mutation
    pub timestamp: DateTime<Utc>,
    pub entity_id: i64,
    /// Action-specific payload
    pub data: serde_json::Value,
}

impl LogEvent {
    /// Build an event stamped with the current time.
    pub fn new(action: Action, entity_id: i64, data: serde_json::Value) -> Self {
        Self {
            action,
            timestamp: Utc::now(),
            entity_id,
            data,
        }
    }

    /// Build an event from any serializable payload.
    pub fn with_payload<T: Serialize + ?Sized>(
        action: Action,
        entity_id: i64,
        payload: &T,
    ) -> Result<Self> {
        Ok(Self::new(action, entity_id, serde_json::to_value(payload)?))
    }

    /// Wire form published on the bus.
    pub fn encode(&self) -> Result<Bytes> {
        Ok(Bytes::from(serde_json::to_vec(self)?))
    }

    /// Parse the wire form.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_shape() {
        let event = LogEvent::new(Action::Reprioritize, 7, serde_json::json!({"project_id": 1}));
        let json: serde_json::Value = serde_json::from_slice(&event.encode().unwrap()).unwrap();

        assert_eq!(json["action"], "reprioritize");
        assert_eq!(json["entity_id"], 7);
        assert_eq!(json["data"]["project_id"], 1);
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_decode_from_other_producers() {
        let raw = br#"{"action":"delete","timestamp":"2024-05-01T10:00:00Z","entity_id":3,"data":null}"#;
        let event = LogEvent::decode(raw).unwrap();

        assert_eq!(event.action, Action::Delete);
        assert_eq!(event.entity_id, 3);
        assert!(event.data.is_null());
    }

    #[test]
    fn test_decode_rejects_unknown_action() {
        let raw = br#"{"action":"purge","timestamp":"2024-05-01T10:00:00Z","entity_id":3,"data":null}"#;
        assert!(LogEvent::decode(raw).is_err());
    }
}
