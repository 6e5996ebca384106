//! saarthi-api - Tabular analytics microservice
//!
//! Accepts CSV uploads, keeps each one in its own session and serves
//! previews, missing-value reports, summary statistics and EDA charts.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use saarthi_api::AppState;
use saarthi_common::config::{CliOverrides, SettingsResolver};

/// Command-line arguments for saarthi-api
#[derive(Parser, Debug)]
#[command(name = "saarthi-api")]
#[command(about = "Session-scoped tabular analytics service")]
#[command(version)]
struct Args {
    /// Config file (TOML)
    #[arg(short, long, env = "SAARTHI_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on, e.g. 127.0.0.1:8000
    #[arg(short, long, env = "SAARTHI_BIND")]
    bind: Option<String>,

    /// Folder holding uploads, published charts and the session registry
    #[arg(short, long, env = "SAARTHI_STORAGE_ROOT")]
    storage_root: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "SAARTHI_LOG_LEVEL")]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Cloudinary credentials may live in a .env file next to the binary
    let dotenv = dotenvy::dotenv();

    let args = Args::parse();
    let resolver = SettingsResolver::new(CliOverrides {
        config_path: args.config,
        bind_addr: args.bind,
        storage_root: args.storage_root,
        log_level: args.log_level,
    });
    let settings = resolver.resolve().context("Failed to resolve settings")?;

    let log_file = saarthi_api::logging::file_layer(settings.logging.file.as_deref())
        .context("Failed to open log file")?;

    // RUST_LOG takes precedence over the configured level
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("saarthi_api={0},saarthi_common={0},tower_http={0}", settings.logging.level)
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(log_file)
        .init();

    info!(
        "Starting saarthi-api v{} [{}] built {} ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_TIMESTAMP"),
        env!("BUILD_PROFILE")
    );

    match dotenv {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) if e.not_found() => {}
        Err(e) => warn!("Failed to load .env file: {}", e),
    }
    match &settings.config_file {
        Some(path) => info!("Config file: {}", path.display()),
        None => warn!("No config file found, using defaults"),
    }
    info!("Storage root: {}", settings.storage_root.display());
    if let Some(path) = &settings.logging.file {
        info!("Log file: {}", path.display());
    }

    tokio::fs::create_dir_all(&settings.uploads_dir)
        .await
        .with_context(|| format!("Failed to create {}", settings.uploads_dir.display()))?;

    let state = AppState::from_settings(&settings).context("Failed to initialize publisher")?;

    let dropped = state
        .store
        .reconcile()
        .await
        .context("Failed to reconcile session registry")?;
    let sessions = state.store.list().await.context("Failed to read session registry")?;
    info!(
        sessions = sessions.len(),
        dropped = dropped.len(),
        "Session registry loaded"
    );

    let app = saarthi_api::build_router(state);

    let listener = tokio::net::TcpListener::bind(&settings.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", settings.bind_addr))?;
    info!("Listening on http://{}", settings.bind_addr);
    info!("Health check: http://{}/health", settings.bind_addr);

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
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
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
