//! Utility functions for the rumble lobby service

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Generate a new unique match ID
pub fn generate_match_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Whether `since` lies further in the past than `max_idle`
pub fn idle_longer_than(since: DateTime<Utc>, max_idle: std::time::Duration) -> bool {
    match Duration::from_std(max_idle) {
        Ok(limit) => current_timestamp() - since > limit,
        // Out-of-range limits never expire
        Err(_) => false,
    }
}
