//! Rumble lobby management
//!
//! [`Match`] holds one server's roster, teams and readiness; the
//! [`MatchRegistry`] owns every live match and serializes access per server.

pub mod instance;
pub mod registry;

// Re-export commonly used types
pub use instance::Match;
pub use registry::{MatchRegistry, RegistryStats};
