//! TSP Gateway Daemon
//!
//! Bridges WebSocket clients to the backend router. Every client gets its
//! own backend connection, over which its requests are multiplexed by
//! request id.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tsp_core::config::{self, GatewayConfig};
use tsp_gateway::{GatewayServer, GatewayState};

#[derive(Parser)]
#[command(name = "tsp-gateway")]
#[command(about = "TSP gateway daemon")]
#[command(version)]
struct Args {
    /// Path to configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Bind address (overrides config)
    #[arg(short, long, env = "TSP_GATEWAY_BIND")]
    bind: Option<String>,

    /// Backend host (overrides config)
    #[arg(long, env = "TSP_BACKEND_HOST")]
    backend_host: Option<String>,

    /// Backend port (overrides config)
    #[arg(long, env = "TSP_BACKEND_PORT")]
    backend_port: Option<u16>,

    /// Write a configuration file (defaults plus overrides) and exit
    #[arg(long)]
    init_config: bool,

    /// Overwrite an existing file with --init-config
    #[arg(long, requires = "init_config")]
    force: bool,

    /// Run in foreground with verbose output
    #[arg(short, long)]
    foreground: bool,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.foreground { "debug" } else { &args.log_level };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("TSP gateway starting...");

    if args.init_config {
        return write_config(&args);
    }

    let mut config = load_config(&args)?;
    apply_overrides(&mut config, &args);
    config.validate().context("Invalid configuration")?;

    tracing::info!(
        "Backend router at {} (connect timeout {:?})",
        config.backend.address(),
        config.backend.connect_timeout
    );
    if config.strict_sequencing {
        tracing::info!("Strict response sequencing enabled");
    }

    let bind_addr = config.bind_address.clone();
    let state = Arc::new(GatewayState::new(config));

    // Create cancellation token for graceful shutdown
    let cancel = CancellationToken::new();
    tokio::spawn(shutdown_signal(cancel.clone()));

    let server = GatewayServer::new(Arc::clone(&state), cancel);
    server.run(&bind_addr).await?;

    tracing::info!(
        "Gateway shutdown complete ({} sessions served)",
        state.total_sessions()
    );
    Ok(())
}

/// Load the configuration file, falling back to defaults
fn load_config(args: &Args) -> Result<GatewayConfig> {
    if let Some(config_path) = &args.config {
        return config::load_config(config_path)
            .with_context(|| format!("Failed to load config from {:?}", config_path));
    }

    let default_path = config::default_config_path();
    if default_path.exists() {
        Ok(config::load_config(&default_path).unwrap_or_else(|e| {
            tracing::warn!("Failed to load config from {:?}: {}", default_path, e);
            GatewayConfig::default()
        }))
    } else {
        tracing::info!("Using default configuration");
        Ok(GatewayConfig::default())
    }
}

/// Command line overrides
fn apply_overrides(config: &mut GatewayConfig, args: &Args) {
    if let Some(bind) = &args.bind {
        config.bind_address = bind.clone();
    }
    if let Some(host) = &args.backend_host {
        config.backend.host = host.clone();
    }
    if let Some(port) = args.backend_port {
        config.backend.port = port;
    }
}

/// Write the default configuration, with command line overrides applied
fn write_config(args: &Args) -> Result<()> {
    let path = args
        .config
        .clone()
        .unwrap_or_else(config::default_config_path);

    let mut config = GatewayConfig::default();
    apply_overrides(&mut config, args);
    config.validate().context("Invalid configuration")?;

    config::init_config(&path, &config, args.force)
        .with_context(|| format!("Failed to write config to {:?}", path))?;

    tracing::info!("Wrote configuration to {:?}", path);
    Ok(())
}

/// Cancel `cancel` on Ctrl+C or SIGTERM
async fn shutdown_signal(cancel: CancellationToken) {
    let ctrl_c = tokio::signal::ctrl_c();

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown...");
        }
    }

    cancel.cancel();
}
