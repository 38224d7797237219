//! Error types for the rumble lobby service
//!
//! Lobby operations fail with a [`RumbleError`] so callers can report a
//! precise reason to the user. Service setup and configuration use anyhow.

use crate::types::{MatchStatus, PlayerId, ServerId};

/// Result type alias for service and configuration code
pub type Result<T> = anyhow::Result<T>;

/// Result type for lobby and registry operations
pub type LobbyResult<T> = std::result::Result<T, RumbleError>;

/// Reasons a lobby operation can be rejected
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RumbleError {
    #[error("Player {player_id} is already in the rumble")]
    AlreadyMember { player_id: PlayerId },

    #[error("Player {player_id} is not in the rumble")]
    NotMember { player_id: PlayerId },

    #[error("Operation not allowed while match is {status}")]
    WrongStatus { status: MatchStatus },

    #[error("Match cannot start: {reason}")]
    NotReady { reason: String },

    #[error("Match is not in progress (currently {status})")]
    NotInProgress { status: MatchStatus },

    #[error("No active rumble for server {server_id}")]
    NotFound { server_id: ServerId },
}

impl RumbleError {
    /// Short machine-readable kind, used as a metrics label
    pub fn kind(&self) -> &'static str {
        match self {
            RumbleError::AlreadyMember { .. } => "already_member",
            RumbleError::NotMember { .. } => "not_member",
            RumbleError::WrongStatus { .. } => "wrong_status",
            RumbleError::NotReady { .. } => "not_ready",
            RumbleError::NotInProgress { .. } => "not_in_progress",
            RumbleError::NotFound { .. } => "not_found",
        }
    }

    /// Reply text suitable for showing to the player who issued the command
    pub fn user_message(&self) -> String {
        match self {
            RumbleError::AlreadyMember { .. } => "You are already in this rumble.".to_string(),
            RumbleError::NotMember { .. } => "You are not in this rumble.".to_string(),
            RumbleError::WrongStatus { status } => {
                format!("That can't be done right now, the rumble is {}.", status)
            }
            RumbleError::NotReady { reason } => format!("The rumble can't start yet: {}.", reason),
            RumbleError::NotInProgress { .. } => "There is no rumble in progress.".to_string(),
            RumbleError::NotFound { .. } => "There is no rumble on this server.".to_string(),
        }
    }
}
