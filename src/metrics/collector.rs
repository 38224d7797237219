//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the rumble lobby service
//! using Prometheus metrics.

use crate::lobby::RegistryStats;
use crate::types::CloseReason;
use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
};
use std::sync::Arc;
use std::time::Duration;

/// Main metrics collector for the rumble lobby service
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Match lifecycle metrics
    lobby_metrics: LobbyMetrics,

    /// Command handling metrics
    command_metrics: CommandMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,
}

/// Match lifecycle metrics
#[derive(Clone)]
pub struct LobbyMetrics {
    /// Number of live matches
    pub active_matches: IntGauge,

    /// Players sitting in waiting lobbies
    pub players_waiting: IntGauge,

    /// Lobbies created since start, mirrored from the registry
    pub matches_created: IntGauge,

    /// Matches that passed the start gate
    pub matches_started_total: IntCounter,

    /// Matches removed from the registry, by reason
    pub matches_closed_total: IntCounterVec,

    /// Players per match at start
    pub match_size: Histogram,
}

/// Command handling metrics
#[derive(Clone)]
pub struct CommandMetrics {
    /// Commands handled, by command and outcome
    pub commands_total: IntCounterVec,

    /// Command handling duration, by command
    pub command_duration: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with its own registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let lobby_metrics = LobbyMetrics::new(&registry)?;
        let command_metrics = CommandMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            lobby_metrics,
            command_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    pub fn lobby(&self) -> &LobbyMetrics {
        &self.lobby_metrics
    }

    pub fn command(&self) -> &CommandMetrics {
        &self.command_metrics
    }

    /// Refresh gauges from registry stats
    pub fn update_from_registry_stats(&self, stats: &RegistryStats) {
        self.lobby_metrics
            .active_matches
            .set(stats.active_matches as i64);
        self.lobby_metrics
            .players_waiting
            .set(stats.players_waiting as i64);
        self.lobby_metrics
            .matches_created
            .set(stats.matches_created as i64);
    }

    /// Record one handled command
    pub fn record_command(&self, command: &str, outcome: &str, duration: Duration) {
        self.command_metrics
            .commands_total
            .with_label_values(&[command, outcome])
            .inc();

        self.command_metrics
            .command_duration
            .with_label_values(&[command])
            .observe(duration.as_secs_f64());
    }

    /// Record a match passing the start gate
    pub fn record_match_started(&self, player_count: usize) {
        self.lobby_metrics.matches_started_total.inc();
        self.lobby_metrics.match_size.observe(player_count as f64);
    }

    /// Record a match leaving the registry
    pub fn record_match_closed(&self, reason: CloseReason) {
        self.lobby_metrics
            .matches_closed_total
            .with_label_values(&[reason.as_str()])
            .inc();
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update uptime
    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("rumble_lobby_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "rumble_lobby_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
        })
    }
}

impl LobbyMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let active_matches =
            IntGauge::new("rumble_lobby_active_matches", "Number of live matches")?;
        registry.register(Box::new(active_matches.clone()))?;

        let players_waiting = IntGauge::new(
            "rumble_lobby_players_waiting",
            "Players currently in waiting lobbies",
        )?;
        registry.register(Box::new(players_waiting.clone()))?;

        let matches_created = IntGauge::new(
            "rumble_lobby_matches_created",
            "Lobbies created since service start",
        )?;
        registry.register(Box::new(matches_created.clone()))?;

        let matches_started_total = IntCounter::new(
            "rumble_lobby_matches_started_total",
            "Total matches started",
        )?;
        registry.register(Box::new(matches_started_total.clone()))?;

        let matches_closed_total = IntCounterVec::new(
            Opts::new(
                "rumble_lobby_matches_closed_total",
                "Total matches removed from the registry",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(matches_closed_total.clone()))?;

        let match_size = Histogram::with_opts(
            HistogramOpts::new("rumble_lobby_match_size", "Players per match at start")
                .buckets(vec![2.0, 4.0, 6.0, 8.0, 12.0, 16.0, 24.0, 32.0]),
        )?;
        registry.register(Box::new(match_size.clone()))?;

        Ok(Self {
            active_matches,
            players_waiting,
            matches_created,
            matches_started_total,
            matches_closed_total,
            match_size,
        })
    }
}

impl CommandMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let commands_total = IntCounterVec::new(
            Opts::new("rumble_lobby_commands_total", "Total commands handled"),
            &["command", "outcome"],
        )?;
        registry.register(Box::new(commands_total.clone()))?;

        let command_duration = HistogramVec::new(
            HistogramOpts::new(
                "rumble_lobby_command_duration_seconds",
                "Command handling duration",
            )
            .buckets(vec![0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1]),
            &["command"],
        )?;
        registry.register(Box::new(command_duration.clone()))?;

        Ok(Self {
            commands_total,
            command_duration,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metric_names(collector: &MetricsCollector) -> Vec<String> {
        collector
            .registry()
            .gather()
            .iter()
            .map(|mf| mf.get_name().to_string())
            .collect()
    }

    #[test]
    fn test_metrics_collector_creation() {
        let collector = MetricsCollector::new().unwrap();
        let names = metric_names(&collector);

        assert!(names.contains(&"rumble_lobby_active_matches".to_string()));
        assert!(names.contains(&"rumble_lobby_matches_started_total".to_string()));
    }

    #[test]
    fn test_record_command() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_command("join", "ok", Duration::from_micros(50));
        collector.record_command("join", "already_member", Duration::from_micros(20));

        let counter = &collector.command().commands_total;
        assert_eq!(counter.with_label_values(&["join", "ok"]).get(), 1);
        assert_eq!(counter.with_label_values(&["join", "already_member"]).get(), 1);
    }

    #[test]
    fn test_lifecycle_metrics() {
        let collector = MetricsCollector::new().unwrap();
        collector.record_match_started(4);
        collector.record_match_closed(CloseReason::Finished);
        collector.record_match_closed(CloseReason::Idle);

        assert_eq!(collector.lobby().matches_started_total.get(), 1);
        assert_eq!(
            collector
                .lobby()
                .matches_closed_total
                .with_label_values(&["idle"])
                .get(),
            1
        );

        let stats = RegistryStats {
            active_matches: 3,
            players_waiting: 7,
            matches_created: 5,
            ..Default::default()
        };
        collector.update_from_registry_stats(&stats);
        assert_eq!(collector.lobby().active_matches.get(), 3);
        assert_eq!(collector.lobby().players_waiting.get(), 7);
        assert_eq!(collector.lobby().matches_created.get(), 5);
    }

    #[test]
    fn test_separate_collectors_do_not_conflict() {
        let first = MetricsCollector::new();
        let second = MetricsCollector::new();
        assert!(first.is_ok());
        assert!(second.is_ok());
    }
}
