//! Command handling for the rumble lobby
//!
//! The bot layer turns user interactions into [`RumbleCommand`]s and hands
//! them to a [`CommandHandler`], which owns no state of its own: the registry
//! and the event publisher are injected at construction.

pub mod handler;

pub use handler::{CommandHandler, CommandReply, RumbleCommand};
