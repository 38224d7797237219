//! Common types used throughout the rumble lobby service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of the community (guild) a rumble belongs to
pub type ServerId = String;

/// Identifier of a player as resolved by the bot layer
pub type PlayerId = String;

/// Unique identifier for a single lobby instance
pub type MatchId = Uuid;

/// One of the two rumble teams
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Team {
    Red,
    Blue,
}

impl Team {
    /// Enumeration order; the first entry wins balance ties
    pub const ALL: [Team; 2] = [Team::Red, Team::Blue];

    /// The opposing team
    pub fn opponent(self) -> Team {
        match self {
            Team::Red => Team::Blue,
            Team::Blue => Team::Red,
        }
    }
}

impl fmt::Display for Team {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Team::Red => write!(f, "RED"),
            Team::Blue => write!(f, "BLUE"),
        }
    }
}

/// Lifecycle status of a match
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    /// Lobby is open for joins, leaves and ready toggles
    Waiting,
    /// Start was accepted; the gameplay layer owns the match
    InProgress,
    /// Gameplay reported completion (terminal)
    Finished,
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MatchStatus::Waiting => write!(f, "waiting"),
            MatchStatus::InProgress => write!(f, "in progress"),
            MatchStatus::Finished => write!(f, "finished"),
        }
    }
}

/// A player's team assignment
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub player_id: PlayerId,
    pub team: Team,
}

/// Roster handed to the gameplay layer when a match starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterSnapshot {
    pub server_id: ServerId,
    pub match_id: MatchId,
    /// Team assignments in join order
    pub teams: Vec<RosterEntry>,
    pub started_at: DateTime<Utc>,
}

impl RosterSnapshot {
    /// Team of a rostered player
    pub fn team_of(&self, player_id: &str) -> Option<Team> {
        self.teams
            .iter()
            .find(|entry| entry.player_id == player_id)
            .map(|entry| entry.team)
    }

    /// Players on one team, in join order
    pub fn members(&self, team: Team) -> Vec<PlayerId> {
        self.teams
            .iter()
            .filter(|entry| entry.team == team)
            .map(|entry| entry.player_id.clone())
            .collect()
    }
}

/// Player as shown in a lobby view
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerSlot {
    pub player_id: PlayerId,
    pub team: Team,
    pub ready: bool,
}

/// Read-only snapshot of a match, safe to hold across awaits
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchView {
    pub server_id: ServerId,
    pub match_id: MatchId,
    pub status: MatchStatus,
    pub players: Vec<PlayerSlot>,
    pub red_count: usize,
    pub blue_count: usize,
    pub can_start: bool,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl MatchView {
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn ready_count(&self) -> usize {
        self.players.iter().filter(|p| p.ready).count()
    }
}

/// Outcome of removing a player from a match
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Departure {
    pub player_id: PlayerId,
    pub team: Team,
    /// Player left a match that was already in progress
    pub forced_forfeit: bool,
}

/// Result of removing a player through the registry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaveOutcome {
    pub match_id: MatchId,
    pub departure: Departure,
    /// Players still in the match after the departure
    pub remaining_players: usize,
    /// The lobby was left empty while waiting and has been removed
    pub lobby_reaped: bool,
}

/// Why a match was removed from the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Finished,
    Empty,
    Idle,
    Abandoned,
}

impl CloseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CloseReason::Finished => "finished",
            CloseReason::Empty => "empty",
            CloseReason::Idle => "idle",
            CloseReason::Abandoned => "abandoned",
        }
    }
}

/// Event emitted when a match transitions to in progress
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchStarting {
    pub roster: RosterSnapshot,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a player leaves a match
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlayerLeftMatch {
    pub server_id: ServerId,
    pub match_id: MatchId,
    pub departure: Departure,
    pub remaining_players: usize,
    pub timestamp: DateTime<Utc>,
}

/// Event emitted when a match is removed from the registry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchClosed {
    pub server_id: ServerId,
    pub match_id: MatchId,
    pub reason: CloseReason,
    pub timestamp: DateTime<Utc>,
}

/// Union type for all outbound events
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RumbleEvent {
    MatchStarting(MatchStarting),
    PlayerLeftMatch(PlayerLeftMatch),
    MatchClosed(MatchClosed),
}
