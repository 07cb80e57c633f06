//! GameEvent — the room-scoped broadcast message type.
//!
//! DESIGN
//! ======
//! Every server→client push is a `GameEvent`: an event name plus a flat
//! key-value payload, serialized as `{"event": <name>, ...payload}`. The
//! engine builds events and returns them; route handlers hand them to the
//! broadcast layer and, for some endpoints, echo them in the HTTP response.
//!
//! Event names: `user-joined`, `user-banned`, `reveal-item`,
//! `vote-status-update`, `cards-revealed`, `show-summary`, `banned-by-admin`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Flat key-value payload. Alias to reduce noise in signatures.
pub type Data = HashMap<String, serde_json::Value>;

/// A named, room-scoped event with a flat payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameEvent {
    pub event: String,
    #[serde(flatten)]
    pub data: Data,
}

impl GameEvent {
    /// Create an empty event with the given name.
    pub fn named(event: impl Into<String>) -> Self {
        Self { event: event.into(), data: Data::new() }
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// Read a payload field. Test and poll-fallback convenience.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }
}
