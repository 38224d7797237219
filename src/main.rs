//! Main entry point for the rumble lobby service
//!
//! Loads configuration, starts the health server and idle sweeper, and
//! optionally serves line-delimited JSON commands on stdin until shutdown.

use anyhow::Result;
use clap::Parser;
use rumble_lobby::config::{validate_config, AppConfig};
use rumble_lobby::service::{serve_json_lines, AppState};
use std::path::PathBuf;
use tokio::io::BufReader;
use tokio::signal;
use tracing::{error, info, warn};

/// Rumble Lobby - per-server team lobbies with readiness-gated starts
#[derive(Parser)]
#[command(
    name = "rumble-lobby",
    version,
    about = "Per-server team rumble lobby manager",
    long_about = "Rumble Lobby keeps one team lobby per server, balances players across \
                 RED and BLUE, and starts a match once everyone is ready and the teams \
                 are even. Stale lobbies are swept in the background."
)]
struct Args {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Path to configuration file (TOML format)"
    )]
    config: Option<PathBuf>,

    #[arg(
        short,
        long,
        value_name = "LEVEL",
        help = "Override log level (trace, debug, info, warn, error)"
    )]
    log_level: Option<String>,

    #[arg(long, value_name = "PORT", help = "Override health server port")]
    health_port: Option<u16>,

    #[arg(long, help = "Read JSON commands from stdin and write replies to stdout")]
    stdin: bool,

    #[arg(short, long, help = "Enable debug mode with verbose logging")]
    debug: bool,

    #[arg(
        long,
        help = "Validate configuration and exit without starting service"
    )]
    dry_run: bool,
}

/// Initialize structured logging with the configured level
fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_level.into()),
        )
        .with_target(false)
        .with_thread_ids(true)
        .with_line_number(true)
        // Replies own stdout when the command intake is enabled
        .with_writer(std::io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT (Ctrl+C) signal"),
        _ = terminate => info!("Received SIGTERM signal"),
    }
}

fn display_startup_banner(config: &AppConfig) {
    info!("Rumble Lobby v{}", rumble_lobby::VERSION);
    info!("   Service: {}", config.service.name);
    info!("   Log level: {}", config.service.log_level);
    info!(
        "   Health: {}:{}",
        config.service.health_host, config.service.health_port
    );
    info!(
        "   Idle timeout: {}s (sweep every {}s)",
        config.lobby.idle_timeout_seconds, config.lobby.sweep_interval_seconds
    );
}

/// Load configuration from file or environment and apply CLI overrides
fn load_config(args: &Args) -> Result<AppConfig> {
    let mut config = match &args.config {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::from_env()?,
    };

    if let Some(log_level) = &args.log_level {
        config.service.log_level = log_level.clone();
    }
    if args.debug {
        config.service.log_level = "debug".to_string();
    }
    if let Some(port) = args.health_port {
        config.service.health_port = port;
    }

    validate_config(&config)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = load_config(&args).unwrap_or_else(|e| {
        eprintln!("Configuration error: {:#}", e);
        std::process::exit(1);
    });

    if let Err(e) = init_logging(&config.service.log_level) {
        eprintln!("Failed to initialize logging: {}", e);
        std::process::exit(1);
    }

    display_startup_banner(&config);

    if args.dry_run {
        info!("Dry run completed - configuration is valid");
        return Ok(());
    }

    let mut app_state = match AppState::new(config.clone()).await {
        Ok(state) => state,
        Err(e) => {
            error!("Failed to initialize application: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = app_state.start().await {
        error!("Failed to start service: {}", e);
        std::process::exit(1);
    }

    if args.stdin {
        let handler = app_state.handler().clone();
        let intake = serve_json_lines(
            &handler,
            BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
        );

        tokio::select! {
            result = intake => match result {
                Ok(handled) => info!("stdin closed after {} commands", handled),
                Err(e) => error!("Command intake failed: {:#}", e),
            },
            _ = wait_for_shutdown_signal() => {}
        }
    } else {
        info!("Press Ctrl+C to shutdown gracefully...");
        wait_for_shutdown_signal().await;
    }

    info!("Shutdown signal received, beginning graceful shutdown...");
    match tokio::time::timeout(config.shutdown_timeout(), app_state.shutdown()).await {
        Ok(Ok(stats)) => info!(
            "Shutdown complete: {} matches started, {} still active",
            stats.matches_started, stats.active_matches
        ),
        Ok(Err(e)) => error!("Shutdown failed: {}", e),
        Err(_) => warn!("Shutdown timeout exceeded, forcing exit"),
    }

    Ok(())
}
