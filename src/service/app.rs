//! Main application state and service coordination
//!
//! [`AppState`] wires the registry, the event publisher, metrics and the
//! command handler together and owns the background tasks.

use crate::commands::CommandHandler;
use crate::config::AppConfig;
use crate::events::{EventPublisher, LogEventPublisher};
use crate::lobby::{MatchRegistry, RegistryStats};
use crate::metrics::{HealthServer, HealthServerConfig, MetricsCollector, MetricsService};
use crate::service::health::HealthContext;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// How often uptime and registry gauges are refreshed
const METRICS_REFRESH_INTERVAL: Duration = Duration::from_secs(15);

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },
}

/// Main application state containing all service components
pub struct AppState {
    config: AppConfig,
    registry: Arc<MatchRegistry>,
    handler: CommandHandler,
    metrics_service: Arc<MetricsService>,
    background_tasks: Vec<JoinHandle<()>>,
    is_running: Arc<RwLock<bool>>,
}

impl AppState {
    /// Initialize the application, publishing events to the log
    pub async fn new(config: AppConfig) -> Result<Self, ServiceError> {
        Self::with_publisher(config, Arc::new(LogEventPublisher::new())).await
    }

    /// Initialize the application with a custom event sink
    pub async fn with_publisher(
        config: AppConfig,
        publisher: Arc<dyn EventPublisher>,
    ) -> Result<Self, ServiceError> {
        info!(
            "Initializing {} (idle timeout {}s, sweep every {}s)",
            config.service.name,
            config.lobby.idle_timeout_seconds,
            config.lobby.sweep_interval_seconds
        );

        crate::config::validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        let registry = Arc::new(MatchRegistry::new());
        let is_running = Arc::new(RwLock::new(false));

        let collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let health_config = HealthServerConfig {
            port: config.service.health_port,
            host: config.service.health_host.clone(),
        };
        let context = HealthContext::new(
            config.service.name.clone(),
            registry.clone(),
            is_running.clone(),
        );
        let health_server =
            Arc::new(HealthServer::new(health_config, collector.clone()).with_context(context));
        let metrics_service = Arc::new(MetricsService::new(collector.clone(), health_server));

        let handler = CommandHandler::new(registry.clone(), publisher, collector);

        Ok(Self {
            config,
            registry,
            handler,
            metrics_service,
            background_tasks: Vec::new(),
            is_running,
        })
    }

    /// Start the health server and background maintenance
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        if self.is_running().await {
            return Err(ServiceError::Initialization {
                message: "Service is already running".to_string(),
            });
        }

        info!("Starting {}", self.config.service.name);
        *self.is_running.write().await = true;

        self.start_metrics_service();
        self.start_background_tasks();

        info!(
            "{} started, health endpoints on {}:{}",
            self.config.service.name,
            self.config.service.health_host,
            self.config.service.health_port
        );
        Ok(())
    }

    /// Stop background work and return the final statistics
    pub async fn shutdown(&mut self) -> Result<RegistryStats, ServiceError> {
        info!("Starting graceful shutdown of {}", self.config.service.name);
        *self.is_running.write().await = false;

        if let Err(e) = self.metrics_service.stop().await {
            warn!("Failed to stop metrics service: {}", e);
        }
        self.stop_background_tasks().await;

        let final_stats = self.registry.stats().await;
        info!("Final registry statistics: {:?}", final_stats);
        info!("{} shutdown completed", self.config.service.name);

        Ok(final_stats)
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    pub fn registry(&self) -> Arc<MatchRegistry> {
        self.registry.clone()
    }

    /// Entry point for the bot layer
    pub fn handler(&self) -> &CommandHandler {
        &self.handler
    }

    pub fn metrics_service(&self) -> Arc<MetricsService> {
        self.metrics_service.clone()
    }

    fn start_metrics_service(&mut self) {
        let metrics_service = self.metrics_service.clone();

        let handle = tokio::spawn(async move {
            if let Err(e) = metrics_service.start().await {
                error!("Metrics service failed: {:#}", e);
            }
        });
        self.background_tasks.push(handle);
    }

    fn start_background_tasks(&mut self) {
        let sweep_task = {
            let handler = self.handler.clone();
            let sweep_interval = self.config.sweep_interval();
            let idle_timeout = self.config.idle_timeout();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(sweep_interval);
                // The first tick completes immediately
                interval.tick().await;
                debug!("Idle lobby sweeper started");

                while *is_running.read().await {
                    interval.tick().await;
                    let closed = handler.sweep(idle_timeout).await;
                    if closed == 0 {
                        debug!("Sweep found no stale lobbies");
                    }
                }

                debug!("Idle lobby sweeper stopped");
            })
        };

        let metrics_task = {
            let registry = self.registry.clone();
            let collector = self.metrics_service.collector();
            let is_running = self.is_running.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(METRICS_REFRESH_INTERVAL);
                let start_time = tokio::time::Instant::now();

                while *is_running.read().await {
                    interval.tick().await;
                    collector.update_uptime(start_time.elapsed());
                    collector.update_from_registry_stats(&registry.stats().await);
                }
            })
        };

        self.background_tasks.push(sweep_task);
        self.background_tasks.push(metrics_task);
        info!("Background maintenance tasks started");
    }

    async fn stop_background_tasks(&mut self) {
        let grace = self.config.shutdown_timeout();

        for task in self.background_tasks.drain(..) {
            task.abort();
            // Aborted tasks resolve with a cancellation error
            if tokio::time::timeout(grace, task).await.is_err() {
                warn!("Background task did not stop within {:?}", grace);
            }
        }
    }
}
