//! Test fixtures and helpers shared by the integration tests

#![allow(dead_code)]

use anyhow::anyhow;
use async_trait::async_trait;
use rumble_lobby::error::Result;
use rumble_lobby::events::{EventPublisher, MockEventPublisher};
use rumble_lobby::metrics::MetricsCollector;
use rumble_lobby::types::{MatchClosed, MatchStarting, PlayerLeftMatch};
use rumble_lobby::{CommandHandler, MatchRegistry, RumbleCommand};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Publisher whose sink is always down
#[derive(Debug, Default)]
pub struct FailingEventPublisher {
    attempts: AtomicUsize,
}

impl FailingEventPublisher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn fail(&self) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        Err(anyhow!("event sink unavailable"))
    }
}

#[async_trait]
impl EventPublisher for FailingEventPublisher {
    async fn publish_match_starting(&self, _event: MatchStarting) -> Result<()> {
        self.fail()
    }

    async fn publish_player_left(&self, _event: PlayerLeftMatch) -> Result<()> {
        self.fail()
    }

    async fn publish_match_closed(&self, _event: MatchClosed) -> Result<()> {
        self.fail()
    }
}

/// A handler over a fresh registry, recording events
pub fn create_test_system() -> (CommandHandler, Arc<MatchRegistry>, Arc<MockEventPublisher>) {
    let registry = Arc::new(MatchRegistry::new());
    let publisher = Arc::new(MockEventPublisher::new());
    let metrics = Arc::new(MetricsCollector::new().expect("Failed to create collector"));
    let handler = CommandHandler::new(registry.clone(), publisher.clone(), metrics);
    (handler, registry, publisher)
}

/// Player ids `{prefix}_0` .. `{prefix}_{count-1}`
pub fn player_ids(prefix: &str, count: usize) -> Vec<String> {
    (0..count).map(|i| format!("{}_{}", prefix, i)).collect()
}

pub fn join(server_id: &str, player_id: &str) -> RumbleCommand {
    RumbleCommand::Join {
        server_id: server_id.to_string(),
        player_id: player_id.to_string(),
    }
}

pub fn leave(server_id: &str, player_id: &str) -> RumbleCommand {
    RumbleCommand::Leave {
        server_id: server_id.to_string(),
        player_id: player_id.to_string(),
    }
}

pub fn ready(server_id: &str, player_id: &str) -> RumbleCommand {
    RumbleCommand::Ready {
        server_id: server_id.to_string(),
        player_id: player_id.to_string(),
    }
}

pub fn start(server_id: &str) -> RumbleCommand {
    RumbleCommand::Start {
        server_id: server_id.to_string(),
    }
}

pub fn finish(server_id: &str) -> RumbleCommand {
    RumbleCommand::Finish {
        server_id: server_id.to_string(),
    }
}

pub fn status(server_id: &str) -> RumbleCommand {
    RumbleCommand::Status {
        server_id: server_id.to_string(),
    }
}

/// Join and ready every player through the registry
pub async fn fill_ready(registry: &MatchRegistry, server_id: &str, players: &[String]) {
    for player in players {
        assert!(registry.join(server_id, player).await);
    }
    for player in players {
        assert!(registry.toggle_ready(server_id, player).await);
    }
}
