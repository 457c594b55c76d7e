//! Stresswatch server - HTTP/WebSocket surface for the live stress dashboard.

use anyhow::Result;
use axum::Router;
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use stresswatch_server::{config, logging, routes, state};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use config::Config;
use logging::{LogConfig, LogFormat};
use state::AppState;

/// Stresswatch server - coordinates a live stress-monitoring session.
#[derive(Parser, Debug)]
#[command(name = "stresswatch-server")]
#[command(about = "HTTP/WebSocket server for the live stress dashboard")]
#[command(version)]
struct Cli {
    /// Path to config file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override port from config
    #[arg(short, long)]
    port: Option<u16>,

    /// Override the video-analysis backend URL
    #[arg(long, value_name = "URL")]
    backend_url: Option<String>,

    /// Enable verbose logging (INFO level for most targets)
    #[arg(short, long)]
    verbose: bool,

    /// Enable debug logging (DEBUG level, excludes poll and ping traces)
    #[arg(short, long)]
    debug: bool,

    /// Enable trace logging (TRACE level for everything)
    #[arg(long)]
    trace: bool,

    /// Quiet mode (WARN and ERROR only)
    #[arg(short, long)]
    quiet: bool,

    /// Set log level for specific targets (e.g., "liveness=debug").
    /// Can be specified multiple times. Targets are prefixed with "stresswatch::" automatically.
    #[arg(long = "log", value_name = "TARGET=LEVEL")]
    log_overrides: Vec<String>,

    /// Log output format
    #[arg(long = "log-format", value_name = "FORMAT", default_value = "text")]
    log_format: LogFormat,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_config = LogConfig::from_cli(
        cli.verbose,
        cli.debug,
        cli.trace,
        cli.quiet,
        cli.log_overrides,
        cli.log_format,
    );
    logging::init(&log_config);

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };

    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(url) = cli.backend_url {
        config.backend_url = url;
    }

    tracing::info!(
        target: "stresswatch::startup",
        "Loaded configuration (port: {}, backend: {})",
        config.port,
        config.backend_url
    );

    let state = Arc::new(AppState::new(config.clone())?);
    if !state.backend.is_reachable().await {
        tracing::warn!(
            target: "stresswatch::startup",
            "Backend at {} is not answering yet; sessions will fail until it is up",
            config.backend_url
        );
    }

    let app = Router::new()
        .nest("/api", routes::api_routes())
        .nest("/ws", routes::ws_routes())
        .fallback_service(ServeDir::new(&config.static_dir))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    tracing::info!(target: "stresswatch::startup", "Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.coordinator.shutdown().await;
    tracing::info!(target: "stresswatch::startup", "Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(target: "stresswatch::startup", "Failed to listen for shutdown signal: {}", e);
    }
}
