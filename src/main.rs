//! Streaming control plane daemon
//!
//! Supervises the encoder, decoder and server processes and exposes the
//! HTTP control API.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cast_control::{
    api::{self, AppState},
    audio::LevelMonitor,
    auth::{CredentialStore, SessionStore},
    config::ConfigStore,
    constants,
    registry::SessionRegistry,
};

/// Credential file kept next to the role configs
const PASSWORD_FILE: &str = "password.txt";

fn config_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("CAST_CONTROL_CONFIG_DIR") {
        return Ok(PathBuf::from(dir));
    }
    directories::ProjectDirs::from("", "", "cast-control")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .context("could not determine a config directory")
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting streaming control plane");

    let dir = config_dir()?;
    let config = Arc::new(ConfigStore::load(&dir)?);
    tracing::info!("Config directory: {}", dir.display());

    let credentials = Arc::new(CredentialStore::load_or_init(dir.join(PASSWORD_FILE))?);
    let sessions = SessionStore::new();
    let _sweeper = SessionStore::spawn_sweeper(sessions.clone());

    let levels = LevelMonitor::new(config.clone());
    let _level_task = levels.spawn();

    let registry = SessionRegistry::new(config.clone(), levels.clone());

    let state = Arc::new(AppState {
        registry,
        config,
        levels,
        credentials,
        sessions,
    });

    let addr: SocketAddr = match std::env::var("CAST_CONTROL_BIND") {
        Ok(bind) => bind.parse().context("invalid CAST_CONTROL_BIND address")?,
        Err(_) => SocketAddr::from(([0, 0, 0, 0], constants::DEFAULT_HTTP_PORT)),
    };

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for shutdown signal: {e}");
        }
        tracing::info!("Shutdown requested");
    };

    api::serve(addr, state.clone(), shutdown).await?;

    // Bring every supervised process down before exiting
    state.registry.stop_all().await;
    tracing::info!("All roles stopped, exiting");
    Ok(())
}
