//! Service layer for the rumble lobby
//!
//! Application state, health probes, the command intake and background task
//! management for the running service.

pub mod app;
pub mod health;
pub mod intake;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthContext, HealthStatus};
pub use intake::serve_json_lines;
