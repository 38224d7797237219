//! Event envelope definitions and serialization

use crate::error::Result;
use anyhow::Context;
use serde::{de::DeserializeOwned, Deserialize, Serialize};

/// Routing keys for events
pub const MATCH_STARTING_ROUTING_KEY: &str = "rumble.match.starting";
pub const PLAYER_LEFT_ROUTING_KEY: &str = "rumble.player.left";
pub const MATCH_CLOSED_ROUTING_KEY: &str = "rumble.match.closed";

/// Event payload with delivery metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageEnvelope<T> {
    pub payload: T,
    pub correlation_id: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub routing_key: String,
}

impl<T> MessageEnvelope<T>
where
    T: Serialize + DeserializeOwned,
{
    /// Create a new message envelope
    pub fn new(payload: T, routing_key: &str) -> Self {
        Self {
            payload,
            correlation_id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now(),
            routing_key: routing_key.to_string(),
        }
    }

    /// Serialize the envelope to a JSON string
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).context("Failed to serialize event envelope")
    }

    /// Deserialize an envelope from JSON bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).context("Failed to deserialize event envelope")
    }
}
