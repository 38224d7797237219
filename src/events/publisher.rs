//! Event publisher for outbound rumble events

use crate::error::Result;
use crate::events::messages::{
    MessageEnvelope, MATCH_CLOSED_ROUTING_KEY, MATCH_STARTING_ROUTING_KEY, PLAYER_LEFT_ROUTING_KEY,
};
use crate::types::{MatchClosed, MatchStarting, PlayerLeftMatch, RumbleEvent};
use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};
use std::sync::Mutex;
use tracing::info;

/// Sink for events the gameplay and reporting layers consume
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish the roster of a match that just started
    async fn publish_match_starting(&self, event: MatchStarting) -> Result<()>;

    /// Publish a player leaving a match
    async fn publish_player_left(&self, event: PlayerLeftMatch) -> Result<()>;

    /// Publish a match being removed from the registry
    async fn publish_match_closed(&self, event: MatchClosed) -> Result<()>;
}

/// Publisher that writes each event envelope to the log as JSON
#[derive(Debug, Default)]
pub struct LogEventPublisher;

impl LogEventPublisher {
    pub fn new() -> Self {
        Self
    }

    fn emit<T>(&self, payload: T, routing_key: &str) -> Result<()>
    where
        T: Serialize + DeserializeOwned,
    {
        let envelope = MessageEnvelope::new(payload, routing_key);
        let json = envelope.to_json()?;
        info!(
            target: "rumble_events",
            routing_key = %envelope.routing_key,
            correlation_id = %envelope.correlation_id,
            "{}",
            json
        );
        Ok(())
    }
}

#[async_trait]
impl EventPublisher for LogEventPublisher {
    async fn publish_match_starting(&self, event: MatchStarting) -> Result<()> {
        self.emit(event, MATCH_STARTING_ROUTING_KEY)
    }

    async fn publish_player_left(&self, event: PlayerLeftMatch) -> Result<()> {
        self.emit(event, PLAYER_LEFT_ROUTING_KEY)
    }

    async fn publish_match_closed(&self, event: MatchClosed) -> Result<()> {
        self.emit(event, MATCH_CLOSED_ROUTING_KEY)
    }
}

/// In-memory publisher that records events for tests
#[derive(Debug, Default)]
pub struct MockEventPublisher {
    published_events: Mutex<Vec<RumbleEvent>>,
}

impl MockEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self, event: RumbleEvent) {
        if let Ok(mut events) = self.published_events.lock() {
            events.push(event);
        }
    }

    /// All published events in order
    pub fn get_published_events(&self) -> Vec<RumbleEvent> {
        self.published_events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    /// Count events of a specific type
    pub fn count_events_of_type(&self, event_type: &str) -> usize {
        self.get_published_events()
            .iter()
            .filter(|event| match event {
                RumbleEvent::MatchStarting(_) => event_type == "MatchStarting",
                RumbleEvent::PlayerLeftMatch(_) => event_type == "PlayerLeftMatch",
                RumbleEvent::MatchClosed(_) => event_type == "MatchClosed",
            })
            .count()
    }

    pub fn clear_events(&self) {
        if let Ok(mut events) = self.published_events.lock() {
            events.clear();
        }
    }
}

#[async_trait]
impl EventPublisher for MockEventPublisher {
    async fn publish_match_starting(&self, event: MatchStarting) -> Result<()> {
        self.record(RumbleEvent::MatchStarting(event));
        Ok(())
    }

    async fn publish_player_left(&self, event: PlayerLeftMatch) -> Result<()> {
        self.record(RumbleEvent::PlayerLeftMatch(event));
        Ok(())
    }

    async fn publish_match_closed(&self, event: MatchClosed) -> Result<()> {
        self.record(RumbleEvent::MatchClosed(event));
        Ok(())
    }
}
