//! Music transcriber (mts-server) - Main entry point
//!
//! Serves the transcription API and the dashboard page.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use mts_common::config::{self, CliOverrides, ServiceConfig};
use mts_server::{build_router, AppState, Pipeline};
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for mts-server
#[derive(Parser, Debug)]
#[command(name = "mts-server")]
#[command(about = "Audio-to-MIDI transcription service")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, env = "MTS_PORT")]
    port: Option<u16>,

    /// Bootstrap TOML file
    #[arg(short, long, env = config::ENV_CONFIG)]
    config: Option<PathBuf>,

    /// Folder holding input_audio/ and outputs/
    #[arg(short, long, env = config::ENV_ROOT_FOLDER)]
    root_folder: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().or_else(config::default_config_path);
    let toml_config = match &config_path {
        Some(path) => config::load_toml_config(path)?,
        None => Default::default(),
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                let level = &toml_config.logging.level;
                format!("mts_server={},mts_common={},tower_http={}", level, level, level).into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = CliOverrides {
        root_folder: args.root_folder,
        port: args.port,
    };
    let service_config = ServiceConfig::resolve(&cli, toml_config).context("Invalid configuration")?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("MTS_GIT_HASH"),
        config = ?config_path,
        "Starting mts-server"
    );
    info!(
        root_folder = %service_config.layout.root.display(),
        sample_rate = service_config.sample_rate,
        backend = ?service_config.inference.backend,
        "Configuration resolved"
    );

    let port = service_config.port;
    let pipeline = Pipeline::from_config(service_config).context("Failed to initialize pipeline")?;
    let app = build_router(AppState::new(pipeline));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
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
                error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
