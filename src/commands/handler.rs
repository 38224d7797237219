//! Command dispatch into the match registry

use crate::error::{LobbyResult, RumbleError};
use crate::events::EventPublisher;
use crate::lobby::MatchRegistry;
use crate::metrics::MetricsCollector;
use crate::types::{
    CloseReason, MatchClosed, MatchId, MatchStarting, MatchStatus, MatchView, PlayerId,
    PlayerLeftMatch, RosterSnapshot, ServerId, Team,
};
use crate::utils::current_timestamp;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

/// A user action routed in from the bot layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum RumbleCommand {
    Join {
        server_id: ServerId,
        player_id: PlayerId,
    },
    Leave {
        server_id: ServerId,
        player_id: PlayerId,
    },
    Ready {
        server_id: ServerId,
        player_id: PlayerId,
    },
    Start {
        server_id: ServerId,
    },
    Finish {
        server_id: ServerId,
    },
    Status {
        server_id: ServerId,
    },
    /// Moderator teardown of the server's match in any state
    Cancel {
        server_id: ServerId,
    },
}

impl RumbleCommand {
    /// Command name, used in logs and as a metrics label
    pub fn name(&self) -> &'static str {
        match self {
            RumbleCommand::Join { .. } => "join",
            RumbleCommand::Leave { .. } => "leave",
            RumbleCommand::Ready { .. } => "ready",
            RumbleCommand::Start { .. } => "start",
            RumbleCommand::Finish { .. } => "finish",
            RumbleCommand::Status { .. } => "status",
            RumbleCommand::Cancel { .. } => "cancel",
        }
    }

    pub fn server_id(&self) -> &str {
        match self {
            RumbleCommand::Join { server_id, .. }
            | RumbleCommand::Leave { server_id, .. }
            | RumbleCommand::Ready { server_id, .. }
            | RumbleCommand::Start { server_id }
            | RumbleCommand::Finish { server_id }
            | RumbleCommand::Status { server_id }
            | RumbleCommand::Cancel { server_id } => server_id,
        }
    }
}

/// Reply for the bot layer to render
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandReply {
    pub ok: bool,
    pub message: String,
    /// Lobby state after the command, if a lobby still exists
    pub view: Option<MatchView>,
    /// Roster handed to gameplay, on a successful start
    pub roster: Option<RosterSnapshot>,
    /// Machine-readable rejection kind
    pub error: Option<String>,
}

impl CommandReply {
    fn accepted(message: String, view: Option<MatchView>) -> Self {
        Self {
            ok: true,
            message,
            view,
            roster: None,
            error: None,
        }
    }

    fn rejected(error: &RumbleError) -> Self {
        Self {
            ok: false,
            message: error.user_message(),
            view: None,
            roster: None,
            error: Some(error.kind().to_string()),
        }
    }
}

/// Routes commands into the registry and publishes the resulting events
#[derive(Clone)]
pub struct CommandHandler {
    registry: Arc<MatchRegistry>,
    publisher: Arc<dyn EventPublisher>,
    metrics: Arc<MetricsCollector>,
}

impl CommandHandler {
    pub fn new(
        registry: Arc<MatchRegistry>,
        publisher: Arc<dyn EventPublisher>,
        metrics: Arc<MetricsCollector>,
    ) -> Self {
        Self {
            registry,
            publisher,
            metrics,
        }
    }

    pub fn registry(&self) -> Arc<MatchRegistry> {
        self.registry.clone()
    }

    /// Handle one command and produce a user-facing reply
    pub async fn handle(&self, command: RumbleCommand) -> CommandReply {
        let start_time = Instant::now();
        debug!(
            "Handling '{}' command for server '{}'",
            command.name(),
            command.server_id()
        );

        let result = self.dispatch(&command).await;

        let outcome = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        self.metrics
            .record_command(command.name(), outcome, start_time.elapsed());

        match result {
            Ok(reply) => reply,
            Err(e) => {
                debug!(
                    "Command '{}' on server '{}' rejected: {}",
                    command.name(),
                    command.server_id(),
                    e
                );
                CommandReply::rejected(&e)
            }
        }
    }

    async fn dispatch(&self, command: &RumbleCommand) -> LobbyResult<CommandReply> {
        match command {
            RumbleCommand::Join {
                server_id,
                player_id,
            } => self.join(server_id, player_id).await,
            RumbleCommand::Leave {
                server_id,
                player_id,
            } => self.leave(server_id, player_id).await,
            RumbleCommand::Ready {
                server_id,
                player_id,
            } => self.ready(server_id, player_id).await,
            RumbleCommand::Start { server_id } => self.start(server_id).await,
            RumbleCommand::Finish { server_id } => self.finish(server_id).await,
            RumbleCommand::Status { server_id } => self.status(server_id).await,
            RumbleCommand::Cancel { server_id } => self.cancel(server_id).await,
        }
    }

    async fn join(&self, server_id: &str, player_id: &str) -> LobbyResult<CommandReply> {
        let team = self.registry.join_player(server_id, player_id).await?;
        let view = self.registry.view(server_id).await;

        let message = match &view {
            Some(view) => format!(
                "{} joined team {} (RED {} vs BLUE {})",
                player_id, team, view.red_count, view.blue_count
            ),
            None => format!("{} joined team {}", player_id, team),
        };
        Ok(CommandReply::accepted(message, view))
    }

    async fn leave(&self, server_id: &str, player_id: &str) -> LobbyResult<CommandReply> {
        let outcome = self.registry.remove_player(server_id, player_id).await?;
        let view = self.registry.view(server_id).await;

        if outcome.departure.forced_forfeit {
            let event = PlayerLeftMatch {
                server_id: server_id.to_string(),
                match_id: outcome.match_id,
                departure: outcome.departure.clone(),
                remaining_players: outcome.remaining_players,
                timestamp: current_timestamp(),
            };
            if let Err(e) = self.publisher.publish_player_left(event).await {
                error!("Failed to publish forfeit for '{}': {}", player_id, e);
            }
        }

        if outcome.lobby_reaped {
            self.closed(server_id, outcome.match_id, CloseReason::Empty)
                .await;
        }

        let message = if outcome.departure.forced_forfeit {
            format!(
                "{} left mid-match and forfeits for team {}",
                player_id, outcome.departure.team
            )
        } else if outcome.lobby_reaped {
            format!("{} left; the lobby is now closed", player_id)
        } else {
            format!("{} left the rumble", player_id)
        };
        Ok(CommandReply::accepted(message, view))
    }

    async fn ready(&self, server_id: &str, player_id: &str) -> LobbyResult<CommandReply> {
        let now_ready = self
            .registry
            .toggle_player_ready(server_id, player_id)
            .await?;
        let view = self.registry.view(server_id).await;

        let counts = view
            .as_ref()
            .map(|v| format!(" ({}/{} ready)", v.ready_count(), v.player_count()))
            .unwrap_or_default();
        let message = if now_ready {
            format!("{} is ready{}", player_id, counts)
        } else {
            format!("{} is no longer ready{}", player_id, counts)
        };
        Ok(CommandReply::accepted(message, view))
    }

    async fn start(&self, server_id: &str) -> LobbyResult<CommandReply> {
        let roster = self.registry.start(server_id).await?;
        self.metrics.record_match_started(roster.teams.len());

        let event = MatchStarting {
            roster: roster.clone(),
            timestamp: current_timestamp(),
        };
        if let Err(e) = self.publisher.publish_match_starting(event).await {
            error!(
                "Failed to publish start of rumble {} on server '{}': {}",
                roster.match_id, server_id, e
            );
        }

        let message = format!(
            "Rumble started: RED [{}] vs BLUE [{}]",
            roster.members(Team::Red).join(", "),
            roster.members(Team::Blue).join(", ")
        );
        let mut reply = CommandReply::accepted(message, self.registry.view(server_id).await);
        reply.roster = Some(roster);
        Ok(reply)
    }

    async fn finish(&self, server_id: &str) -> LobbyResult<CommandReply> {
        let final_view = self.registry.finish_match(server_id).await?;
        self.closed(server_id, final_view.match_id, CloseReason::Finished)
            .await;

        Ok(CommandReply::accepted(
            "The rumble is over".to_string(),
            Some(final_view),
        ))
    }

    async fn status(&self, server_id: &str) -> LobbyResult<CommandReply> {
        let view = self
            .registry
            .view(server_id)
            .await
            .ok_or_else(|| RumbleError::NotFound {
                server_id: server_id.to_string(),
            })?;

        let message = match view.status {
            MatchStatus::Waiting => format!(
                "Rumble is waiting: RED {} vs BLUE {}, {}/{} ready{}",
                view.red_count,
                view.blue_count,
                view.ready_count(),
                view.player_count(),
                if view.can_start {
                    ", ready to start"
                } else {
                    ""
                }
            ),
            status => format!(
                "Rumble is {} with {} players",
                status,
                view.player_count()
            ),
        };
        Ok(CommandReply::accepted(message, Some(view)))
    }

    async fn cancel(&self, server_id: &str) -> LobbyResult<CommandReply> {
        let view = self
            .registry
            .abandon(server_id)
            .await
            .ok_or_else(|| RumbleError::NotFound {
                server_id: server_id.to_string(),
            })?;
        self.closed(server_id, view.match_id, CloseReason::Abandoned)
            .await;

        Ok(CommandReply::accepted(
            "The rumble was cancelled".to_string(),
            None,
        ))
    }

    /// Expire stale lobbies and report each one closed
    pub async fn sweep(&self, max_idle: Duration) -> usize {
        let closed = self.registry.sweep_idle(max_idle).await;
        let count = closed.len();

        for event in closed {
            self.metrics.record_match_closed(event.reason);
            if let Err(e) = self.publisher.publish_match_closed(event).await {
                error!("Failed to publish swept lobby: {}", e);
            }
        }

        let stats = self.registry.stats().await;
        self.metrics.update_from_registry_stats(&stats);

        if count > 0 {
            info!(
                "Lobby sweep closed {} matches, {} still active",
                count, stats.active_matches
            );
        }
        count
    }

    async fn closed(&self, server_id: &str, match_id: MatchId, reason: CloseReason) {
        self.metrics.record_match_closed(reason);

        let event = MatchClosed {
            server_id: server_id.to_string(),
            match_id,
            reason,
            timestamp: current_timestamp(),
        };
        if let Err(e) = self.publisher.publish_match_closed(event).await {
            error!(
                "Failed to publish close of rumble {} on server '{}': {}",
                match_id, server_id, e
            );
        }
    }
}
