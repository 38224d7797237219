//! Health checks for the rumble lobby service
//!
//! Readiness and liveness probes plus a detailed report built from the
//! registry's statistics.

use crate::lobby::{MatchRegistry, RegistryStats};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::warn;

/// Registry stats slower than this mark the registry as degraded
const REGISTRY_PROBE_TIMEOUT: Duration = Duration::from_secs(1);

/// Health check status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Numeric form used by the health status gauge
    pub fn as_gauge(self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    fn worst(self, other: HealthStatus) -> HealthStatus {
        if self.as_gauge() <= other.as_gauge() {
            self
        } else {
            other
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "healthy"),
            HealthStatus::Degraded => write!(f, "degraded"),
            HealthStatus::Unhealthy => write!(f, "unhealthy"),
        }
    }
}

/// What the probes need to see of the running service
#[derive(Clone)]
pub struct HealthContext {
    service_name: String,
    registry: Arc<MatchRegistry>,
    is_running: Arc<RwLock<bool>>,
    started_at: Instant,
}

impl HealthContext {
    pub fn new(
        service_name: impl Into<String>,
        registry: Arc<MatchRegistry>,
        is_running: Arc<RwLock<bool>>,
    ) -> Self {
        Self {
            service_name: service_name.into(),
            registry,
            is_running,
            started_at: Instant::now(),
        }
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    pub service: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    pub name: String,
    pub status: HealthStatus,
    /// Set when the component is not healthy
    pub message: Option<String>,
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    pub active_matches: usize,
    pub players_waiting: usize,
    pub matches_created: u64,
    pub matches_started: u64,
    pub matches_finished: u64,
    pub matches_expired: u64,
    pub uptime_seconds: u64,
}

impl ServiceStats {
    fn from_registry(stats: &RegistryStats, uptime: Duration) -> Self {
        Self {
            active_matches: stats.active_matches,
            players_waiting: stats.players_waiting,
            matches_created: stats.matches_created,
            matches_started: stats.matches_started,
            matches_finished: stats.matches_finished,
            matches_expired: stats.matches_expired,
            uptime_seconds: uptime.as_secs(),
        }
    }
}

impl HealthCheck {
    /// Perform a full health check of the service
    pub async fn check(context: &HealthContext) -> Result<Self> {
        let service_check = Self::check_service_running(context).await;
        let (registry_check, registry_stats) = Self::check_registry(context).await;

        let status = service_check.status.worst(registry_check.status);
        let stats = registry_stats
            .map(|s| ServiceStats::from_registry(&s, context.uptime()))
            .unwrap_or_else(|| ServiceStats {
                uptime_seconds: context.uptime().as_secs(),
                ..Default::default()
            });

        Ok(HealthCheck {
            status,
            service: context.service_name().to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: chrono::Utc::now(),
            checks: vec![service_check, registry_check],
            stats,
        })
    }

    /// Liveness: the service has started and not begun shutting down
    pub async fn liveness_check(context: &HealthContext) -> Result<HealthStatus> {
        if context.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness: running, and the registry answers promptly
    pub async fn readiness_check(context: &HealthContext) -> Result<HealthStatus> {
        if !context.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }
        Ok(Self::check_registry(context).await.0.status)
    }

    async fn check_service_running(context: &HealthContext) -> ComponentCheck {
        let start = Instant::now();

        let (status, message) = if context.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// Gathering stats touches every match lock, so a wedged match shows here
    async fn check_registry(context: &HealthContext) -> (ComponentCheck, Option<RegistryStats>) {
        let start = Instant::now();

        let (status, message, stats) =
            match tokio::time::timeout(REGISTRY_PROBE_TIMEOUT, context.registry.stats()).await {
                Ok(stats) => (HealthStatus::Healthy, None, Some(stats)),
                Err(_) => {
                    warn!(
                        "Registry stats took longer than {:?}",
                        REGISTRY_PROBE_TIMEOUT
                    );
                    (
                        HealthStatus::Degraded,
                        Some("Registry stats timed out".to_string()),
                        None,
                    )
                }
            };

        let check = ComponentCheck {
            name: "match_registry".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        };
        (check, stats)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
