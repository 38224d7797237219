//! Outbound rumble events
//!
//! Start, forfeit and teardown notifications are handed to an
//! [`EventPublisher`] so the gameplay and reporting layers can react without
//! the lobby core knowing who they are.

pub mod messages;
pub mod publisher;

pub use messages::MessageEnvelope;
pub use publisher::{EventPublisher, LogEventPublisher, MockEventPublisher};
