//! Rumble match state and transition logic
//!
//! A [`Match`] owns one server's roster, team assignments and readiness set.
//! It performs no I/O and no locking; the registry serializes access to it.

use crate::error::{LobbyResult, RumbleError};
use crate::types::{
    Departure, MatchId, MatchStatus, MatchView, PlayerId, PlayerSlot, RosterEntry, RosterSnapshot,
    ServerId, Team,
};
use crate::utils::{current_timestamp, generate_match_id, idle_longer_than};
use chrono::{DateTime, Utc};
use std::collections::HashSet;
use std::time::Duration;

/// One server's rumble lobby
#[derive(Debug, Clone)]
pub struct Match {
    server_id: ServerId,
    id: MatchId,
    status: MatchStatus,
    /// Team assignments in join order
    players: Vec<(PlayerId, Team)>,
    ready: HashSet<PlayerId>,
    created_at: DateTime<Utc>,
    last_activity: DateTime<Utc>,
}

impl Match {
    /// Create an empty waiting match for a server
    pub fn new(server_id: impl Into<ServerId>) -> Self {
        Self::with_id(server_id, generate_match_id())
    }

    /// Create an empty waiting match with a specific ID
    pub fn with_id(server_id: impl Into<ServerId>, id: MatchId) -> Self {
        let now = current_timestamp();
        Self {
            server_id: server_id.into(),
            id,
            status: MatchStatus::Waiting,
            players: Vec::new(),
            ready: HashSet::new(),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn id(&self) -> MatchId {
        self.id
    }

    pub fn status(&self) -> MatchStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_activity(&self) -> DateTime<Utc> {
        self.last_activity
    }

    /// Backdate the activity clock (for testing idle expiry)
    #[cfg(test)]
    pub fn set_last_activity(&mut self, at: DateTime<Utc>) {
        self.last_activity = at;
    }

    fn touch(&mut self) {
        self.last_activity = current_timestamp();
    }

    fn position(&self, player_id: &str) -> Option<usize> {
        self.players.iter().position(|(id, _)| id == player_id)
    }

    /// Add a player, assigning the smaller team (RED on ties)
    ///
    /// Balance is only restored by later joins; see `smaller_team`.
    pub fn join(&mut self, player_id: &str) -> LobbyResult<Team> {
        if self.status != MatchStatus::Waiting {
            return Err(RumbleError::WrongStatus {
                status: self.status,
            });
        }

        if self.contains(player_id) {
            return Err(RumbleError::AlreadyMember {
                player_id: player_id.to_string(),
            });
        }

        let team = self.smaller_team();
        self.players.push((player_id.to_string(), team));
        self.touch();

        Ok(team)
    }

    /// Add a player; false if already present or the match is not waiting
    pub fn add_player(&mut self, player_id: &str) -> bool {
        self.join(player_id).is_ok()
    }

    /// Remove a player from the roster and the ready set
    ///
    /// Allowed in any status. Leaving an in-progress match is reported as a
    /// forced forfeit but does not change the status.
    pub fn leave(&mut self, player_id: &str) -> LobbyResult<Departure> {
        let index = self
            .position(player_id)
            .ok_or_else(|| RumbleError::NotMember {
                player_id: player_id.to_string(),
            })?;

        let (player_id, team) = self.players.remove(index);
        self.ready.remove(&player_id);
        self.touch();

        Ok(Departure {
            player_id,
            team,
            forced_forfeit: self.status == MatchStatus::InProgress,
        })
    }

    /// Remove a player; false if absent
    pub fn remove_player(&mut self, player_id: &str) -> bool {
        self.leave(player_id).is_ok()
    }

    /// Flip a player's readiness and return the new value
    pub fn flip_ready(&mut self, player_id: &str) -> LobbyResult<bool> {
        if !self.contains(player_id) {
            return Err(RumbleError::NotMember {
                player_id: player_id.to_string(),
            });
        }

        if self.status != MatchStatus::Waiting {
            return Err(RumbleError::WrongStatus {
                status: self.status,
            });
        }

        let now_ready = if self.ready.remove(player_id) {
            false
        } else {
            self.ready.insert(player_id.to_string());
            true
        };
        self.touch();

        Ok(now_ready)
    }

    /// Toggle readiness; false if absent or the match is not waiting
    pub fn toggle_ready(&mut self, player_id: &str) -> bool {
        self.flip_ready(player_id).is_ok()
    }

    /// Check the start gate: waiting, non-empty even teams, everyone ready
    pub fn start_check(&self) -> LobbyResult<()> {
        if self.status != MatchStatus::Waiting {
            return Err(RumbleError::WrongStatus {
                status: self.status,
            });
        }

        let red = self.team_count(Team::Red);
        let blue = self.team_count(Team::Blue);

        if red == 0 {
            return Err(RumbleError::NotReady {
                reason: "each team needs at least one player".to_string(),
            });
        }

        if red != blue {
            return Err(RumbleError::NotReady {
                reason: format!("teams are uneven ({} RED, {} BLUE)", red, blue),
            });
        }

        let unready = self.player_count() - self.ready_count();
        if unready > 0 {
            return Err(RumbleError::NotReady {
                reason: format!("{} player(s) not ready", unready),
            });
        }

        Ok(())
    }

    /// Whether the match may start right now
    pub fn can_start(&self) -> bool {
        self.start_check().is_ok()
    }

    /// Transition to in progress, re-checking the start gate
    ///
    /// Only the registry drives lifecycle transitions, so it can count them
    /// and retire finished matches.
    pub(crate) fn mark_in_progress(&mut self) -> LobbyResult<RosterSnapshot> {
        self.start_check()?;

        self.status = MatchStatus::InProgress;
        self.touch();

        Ok(self.roster_snapshot())
    }

    /// Transition from in progress to finished
    pub(crate) fn mark_finished(&mut self) -> LobbyResult<()> {
        if self.status != MatchStatus::InProgress {
            return Err(RumbleError::NotInProgress {
                status: self.status,
            });
        }

        self.status = MatchStatus::Finished;
        self.touch();
        Ok(())
    }

    pub fn contains(&self, player_id: &str) -> bool {
        self.position(player_id).is_some()
    }

    pub fn team_of(&self, player_id: &str) -> Option<Team> {
        self.position(player_id).map(|index| self.players[index].1)
    }

    pub fn team_count(&self, team: Team) -> usize {
        self.players.iter().filter(|(_, t)| *t == team).count()
    }

    /// Members of a team in join order
    pub fn team_members(&self, team: Team) -> Vec<PlayerId> {
        self.players
            .iter()
            .filter(|(_, t)| *t == team)
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn is_ready(&self, player_id: &str) -> bool {
        self.ready.contains(player_id)
    }

    pub fn ready_count(&self) -> usize {
        self.ready.len()
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }

    /// Waiting with nobody in it
    pub fn is_garbage(&self) -> bool {
        self.status == MatchStatus::Waiting && self.is_empty()
    }

    /// Waiting and untouched for longer than `max_idle`
    pub fn is_idle(&self, max_idle: Duration) -> bool {
        self.status == MatchStatus::Waiting && idle_longer_than(self.last_activity, max_idle)
    }

    /// Team for the next joiner: the smaller side, RED on ties
    ///
    /// Teams stay within 1 of each other for join-only sequences. Leaves are
    /// not rebalanced, so a gap opened by departures closes one join at a
    /// time.
    fn smaller_team(&self) -> Team {
        let first = Team::ALL[0];
        if self.team_count(first) > self.team_count(first.opponent()) {
            first.opponent()
        } else {
            first
        }
    }

    /// Current team assignments for the gameplay layer
    pub fn roster_snapshot(&self) -> RosterSnapshot {
        RosterSnapshot {
            server_id: self.server_id.clone(),
            match_id: self.id,
            teams: self
                .players
                .iter()
                .map(|(player_id, team)| RosterEntry {
                    player_id: player_id.clone(),
                    team: *team,
                })
                .collect(),
            started_at: current_timestamp(),
        }
    }

    /// Detached snapshot of the whole match
    pub fn view(&self) -> MatchView {
        MatchView {
            server_id: self.server_id.clone(),
            match_id: self.id,
            status: self.status,
            players: self
                .players
                .iter()
                .map(|(player_id, team)| PlayerSlot {
                    player_id: player_id.clone(),
                    team: *team,
                    ready: self.ready.contains(player_id),
                })
                .collect(),
            red_count: self.team_count(Team::Red),
            blue_count: self.team_count(Team::Blue),
            can_start: self.can_start(),
            created_at: self.created_at,
            last_activity: self.last_activity,
        }
    }
}
