//! Registry of active rumble matches, one per server
//!
//! The registry is the only way to reach a [`Match`]. Each match sits behind
//! its own async mutex so operations on different servers never contend,
//! while operations on the same server run one at a time. The server map
//! itself is guarded by a short-lived `RwLock` that is never held across an
//! await point.
//!
//! Lock order is always match first, then map. A handle that was removed
//! from the map while a caller waited for its lock is detected after locking
//! and treated as gone.

use crate::error::{LobbyResult, RumbleError};
use crate::lobby::instance::Match;
use crate::types::{
    CloseReason, LeaveOutcome, MatchClosed, MatchStatus, MatchView, RosterSnapshot, ServerId, Team,
};
use crate::utils::current_timestamp;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

type MatchHandle = Arc<Mutex<Match>>;

/// Counters describing registry activity since creation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    /// Total number of matches created
    pub matches_created: u64,
    /// Total number of matches that reached in progress
    pub matches_started: u64,
    /// Total number of matches finished by the gameplay layer
    pub matches_finished: u64,
    /// Total number of empty lobbies removed
    pub matches_reaped: u64,
    /// Total number of idle lobbies expired by a sweep
    pub matches_expired: u64,
    /// Total number of matches torn down by force
    pub matches_abandoned: u64,
    /// Current number of live matches
    pub active_matches: usize,
    /// Players currently sitting in waiting lobbies
    pub players_waiting: usize,
}

/// Owner of all live matches
#[derive(Default)]
pub struct MatchRegistry {
    matches: RwLock<HashMap<ServerId, MatchHandle>>,
    stats: RwLock<RegistryStats>,
}

impl MatchRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn read_map(&self) -> RwLockReadGuard<'_, HashMap<ServerId, MatchHandle>> {
        self.matches.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_map(&self) -> RwLockWriteGuard<'_, HashMap<ServerId, MatchHandle>> {
        self.matches.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn update_stats(&self, update: impl FnOnce(&mut RegistryStats)) {
        let mut stats = self.stats.write().unwrap_or_else(PoisonError::into_inner);
        update(&mut stats);
    }

    fn not_found(server_id: &str) -> RumbleError {
        RumbleError::NotFound {
            server_id: server_id.to_string(),
        }
    }

    fn handle(&self, server_id: &str) -> Option<MatchHandle> {
        self.read_map().get(server_id).cloned()
    }

    /// Look up the server's handle, inserting a fresh waiting match if absent
    fn handle_or_create(&self, server_id: &str) -> MatchHandle {
        if let Some(handle) = self.handle(server_id) {
            return handle;
        }

        let mut matches = self.write_map();
        // Re-check under the write lock; another caller may have won the race
        if let Some(handle) = matches.get(server_id) {
            return handle.clone();
        }

        let rumble = Match::new(server_id);
        info!("Created rumble {} for server '{}'", rumble.id(), server_id);
        let handle = Arc::new(Mutex::new(rumble));
        matches.insert(server_id.to_string(), handle.clone());
        drop(matches);

        self.update_stats(|stats| stats.matches_created += 1);
        handle
    }

    /// Whether the map still points at this exact handle
    fn is_current(&self, server_id: &str, handle: &MatchHandle) -> bool {
        self.read_map()
            .get(server_id)
            .is_some_and(|current| Arc::ptr_eq(current, handle))
    }

    /// Remove the handle from the map if it is still the registered one.
    /// Callers hold the match lock.
    fn detach(&self, server_id: &str, handle: &MatchHandle) -> bool {
        let mut matches = self.write_map();
        match matches.get(server_id) {
            Some(current) if Arc::ptr_eq(current, handle) => {
                matches.remove(server_id);
                true
            }
            _ => false,
        }
    }

    /// Return the server's match, creating a waiting one if none exists
    pub async fn get_or_create(&self, server_id: &str) -> MatchView {
        loop {
            let handle = self.handle_or_create(server_id);
            let rumble = handle.lock().await;
            if self.is_current(server_id, &handle) {
                return rumble.view();
            }
            // Torn down while we waited; go round and create a fresh lobby
        }
    }

    /// Snapshot of the server's match without creating one
    pub async fn view(&self, server_id: &str) -> Option<MatchView> {
        self.with_match(server_id, |rumble| rumble.view()).await.ok()
    }

    /// Run `op` on the server's match under its exclusive lock
    ///
    /// A match that `op` leaves finished is retired before the lock is
    /// released, so the registry never holds a finished match.
    pub async fn with_match<T, F>(&self, server_id: &str, op: F) -> LobbyResult<T>
    where
        F: FnOnce(&mut Match) -> T,
    {
        let handle = self
            .handle(server_id)
            .ok_or_else(|| Self::not_found(server_id))?;
        let mut rumble = handle.lock().await;

        if !self.is_current(server_id, &handle) {
            return Err(Self::not_found(server_id));
        }

        let out = op(&mut rumble);
        if rumble.status() == MatchStatus::Finished && self.detach(server_id, &handle) {
            self.update_stats(|stats| stats.matches_finished += 1);
            info!(
                "Rumble {} on server '{}' finished and retired",
                rumble.id(),
                server_id
            );
        }
        Ok(out)
    }

    /// Add a player to the server's lobby, creating the lobby on demand
    pub async fn join_player(&self, server_id: &str, player_id: &str) -> LobbyResult<Team> {
        loop {
            let handle = self.handle_or_create(server_id);
            let mut rumble = handle.lock().await;
            if !self.is_current(server_id, &handle) {
                continue;
            }

            let team = rumble.join(player_id)?;
            debug!(
                "Player '{}' joined {} on server '{}' (RED {}, BLUE {})",
                player_id,
                team,
                server_id,
                rumble.team_count(Team::Red),
                rumble.team_count(Team::Blue)
            );
            return Ok(team);
        }
    }

    /// Add a player; false if they are already in or the match has started
    pub async fn join(&self, server_id: &str, player_id: &str) -> bool {
        self.join_player(server_id, player_id).await.is_ok()
    }

    /// Remove a player, reaping the lobby if it is left empty while waiting
    pub async fn remove_player(
        &self,
        server_id: &str,
        player_id: &str,
    ) -> LobbyResult<LeaveOutcome> {
        let handle = self
            .handle(server_id)
            .ok_or_else(|| Self::not_found(server_id))?;
        let mut rumble = handle.lock().await;

        if !self.is_current(server_id, &handle) {
            return Err(Self::not_found(server_id));
        }

        let departure = rumble.leave(player_id)?;
        if departure.forced_forfeit {
            warn!(
                "Player '{}' ({}) left rumble {} on server '{}' mid-match",
                player_id,
                departure.team,
                rumble.id(),
                server_id
            );
        } else {
            debug!(
                "Player '{}' left rumble {} on server '{}'",
                player_id,
                rumble.id(),
                server_id
            );
        }

        let lobby_reaped = rumble.is_garbage() && self.detach(server_id, &handle);
        if lobby_reaped {
            info!(
                "Reaped empty rumble {} on server '{}'",
                rumble.id(),
                server_id
            );
            self.update_stats(|stats| stats.matches_reaped += 1);
        }

        Ok(LeaveOutcome {
            match_id: rumble.id(),
            departure,
            remaining_players: rumble.player_count(),
            lobby_reaped,
        })
    }

    /// Remove a player; false if there is no such player or match
    pub async fn leave(&self, server_id: &str, player_id: &str) -> bool {
        self.remove_player(server_id, player_id).await.is_ok()
    }

    /// Flip a player's readiness and return the new value
    pub async fn toggle_player_ready(&self, server_id: &str, player_id: &str) -> LobbyResult<bool> {
        let ready = self
            .with_match(server_id, |rumble| rumble.flip_ready(player_id))
            .await??;
        debug!(
            "Player '{}' on server '{}' is now {}",
            player_id,
            server_id,
            if ready { "ready" } else { "not ready" }
        );
        Ok(ready)
    }

    /// Flip a player's readiness; false if the toggle was rejected
    pub async fn toggle_ready(&self, server_id: &str, player_id: &str) -> bool {
        self.toggle_player_ready(server_id, player_id).await.is_ok()
    }

    /// Start the server's match
    ///
    /// The start gate is evaluated in the same critical section that flips
    /// the status, so a concurrent leave or un-ready cannot slip between the
    /// check and the transition.
    pub async fn start(&self, server_id: &str) -> LobbyResult<RosterSnapshot> {
        let result = self
            .with_match(server_id, |rumble| rumble.mark_in_progress())
            .await?;

        match &result {
            Ok(snapshot) => {
                info!(
                    "Rumble {} on server '{}' started with {} players",
                    snapshot.match_id,
                    server_id,
                    snapshot.teams.len()
                );
                self.update_stats(|stats| stats.matches_started += 1);
            }
            Err(e) => {
                warn!("Rejected start on server '{}': {}", server_id, e);
            }
        }

        result
    }

    /// Finish the server's in-progress match and remove it, returning its
    /// final state
    pub async fn finish_match(&self, server_id: &str) -> LobbyResult<MatchView> {
        let handle = self
            .handle(server_id)
            .ok_or_else(|| Self::not_found(server_id))?;
        let mut rumble = handle.lock().await;

        if !self.is_current(server_id, &handle) {
            return Err(Self::not_found(server_id));
        }

        rumble.mark_finished()?;
        self.detach(server_id, &handle);
        self.update_stats(|stats| stats.matches_finished += 1);

        info!(
            "Rumble {} on server '{}' finished and retired",
            rumble.id(),
            server_id
        );
        Ok(rumble.view())
    }

    /// Finish the server's in-progress match and remove it
    pub async fn finish(&self, server_id: &str) -> LobbyResult<()> {
        self.finish_match(server_id).await.map(|_| ())
    }

    /// Remove the server's match if it is waiting with nobody in it
    pub async fn reap_empty(&self, server_id: &str) -> bool {
        let Some(handle) = self.handle(server_id) else {
            return false;
        };
        let rumble = handle.lock().await;

        if rumble.is_garbage() && self.detach(server_id, &handle) {
            info!(
                "Reaped empty rumble {} on server '{}'",
                rumble.id(),
                server_id
            );
            self.update_stats(|stats| stats.matches_reaped += 1);
            return true;
        }

        false
    }

    /// Tear down the server's match regardless of status
    pub async fn abandon(&self, server_id: &str) -> Option<MatchView> {
        let handle = self.handle(server_id)?;
        let rumble = handle.lock().await;

        if !self.detach(server_id, &handle) {
            return None;
        }

        warn!(
            "Abandoned rumble {} on server '{}' while {} with {} players",
            rumble.id(),
            server_id,
            rumble.status(),
            rumble.player_count()
        );
        self.update_stats(|stats| stats.matches_abandoned += 1);
        Some(rumble.view())
    }

    /// Remove waiting lobbies that are empty or idle longer than `max_idle`
    ///
    /// Matches in progress are never expired here; the gameplay layer owns
    /// their lifetime.
    pub async fn sweep_idle(&self, max_idle: Duration) -> Vec<MatchClosed> {
        let candidates: Vec<(ServerId, MatchHandle)> = self
            .read_map()
            .iter()
            .map(|(server_id, handle)| (server_id.clone(), handle.clone()))
            .collect();

        let mut closed = Vec::new();
        for (server_id, handle) in candidates {
            let rumble = handle.lock().await;

            let reason = if rumble.is_garbage() {
                CloseReason::Empty
            } else if rumble.is_idle(max_idle) {
                CloseReason::Idle
            } else {
                continue;
            };

            if !self.detach(&server_id, &handle) {
                continue;
            }

            match reason {
                CloseReason::Empty => self.update_stats(|stats| stats.matches_reaped += 1),
                _ => self.update_stats(|stats| stats.matches_expired += 1),
            }

            debug!(
                "Swept rumble {} on server '{}' ({})",
                rumble.id(),
                server_id,
                reason.as_str()
            );
            closed.push(MatchClosed {
                server_id,
                match_id: rumble.id(),
                reason,
                timestamp: current_timestamp(),
            });
        }

        if !closed.is_empty() {
            info!("Swept {} stale rumble lobbies", closed.len());
        }

        closed
    }

    /// Number of live matches
    pub fn active_count(&self) -> usize {
        self.read_map().len()
    }

    /// Snapshots of every live match
    pub async fn active_matches(&self) -> Vec<MatchView> {
        let handles: Vec<MatchHandle> = self.read_map().values().cloned().collect();

        let mut views = Vec::with_capacity(handles.len());
        for handle in handles {
            views.push(handle.lock().await.view());
        }
        views
    }

    /// Current registry statistics
    pub async fn stats(&self) -> RegistryStats {
        let views = self.active_matches().await;
        let mut stats = self
            .stats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();

        stats.active_matches = views.len();
        stats.players_waiting = views
            .iter()
            .filter(|view| view.status == MatchStatus::Waiting)
            .map(|view| view.player_count())
            .sum();
        stats
    }
}
