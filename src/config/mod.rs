//! Configuration management for the rumble lobby service
//!
//! Settings are read from environment variables or a TOML file, validated,
//! and may be overridden by command line flags in `main`.

pub mod app;

pub use app::{validate_config, AppConfig, LobbySettings, ServiceSettings};
