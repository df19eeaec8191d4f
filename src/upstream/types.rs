//! Upstream wire types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

/// Identifier as the upstream emits it: numeric or string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventId {
    Number(u64),
    Text(String),
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventId::Number(n) => write!(f, "{}", n),
            EventId::Text(s) => f.write_str(s),
        }
    }
}

/// Inbound event body: `{name, userId, ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventPayload {
    pub name: String,
    pub user_id: EventId,
    /// Any further fields are forwarded untouched.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Event as forwarded upstream, stamped with an identifier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StampedEvent {
    pub id: u64,
    #[serde(flatten)]
    pub payload: EventPayload,
}

impl StampedEvent {
    /// Stamp `payload` with the current Unix time in milliseconds.
    pub fn now(payload: EventPayload) -> Self {
        let id = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self::with_id(payload, id)
    }

    pub fn with_id(mut payload: EventPayload, id: u64) -> Self {
        // A client-supplied id would otherwise serialize twice.
        payload.extra.remove("id");
        Self { id, payload }
    }
}

/// Parent resource read before fanning out.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct UserRecord {
    #[serde(default)]
    pub events: Vec<EventId>,
}
