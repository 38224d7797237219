//! Rumble Lobby - per-server team lobbies with readiness-gated starts
//!
//! Each server (guild) hosts at most one rumble at a time. Players join one
//! of two balanced teams, mark themselves ready, and the match starts once
//! every player is ready and the teams are even. The registry serializes
//! work per server so many communities can play at once.

pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod lobby;
pub mod metrics;
pub mod service;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{LobbyResult, Result, RumbleError};
pub use types::*;

// Re-export key components
pub use commands::{CommandHandler, CommandReply, RumbleCommand};
pub use events::EventPublisher;
pub use lobby::{Match, MatchRegistry, RegistryStats};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
