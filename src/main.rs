mod api;
mod bridge;
mod config;
mod error;
mod platform;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api::AppState;
use crate::bridge::Pipeline;
use crate::config::Config;
use crate::platform::telegram::TelegramClient;
use crate::platform::MessagingApi;
use crate::store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,telegram_bridge=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Listen: {}", config.bind_addr());
    info!("  Database: {}", config.database.path.display());
    info!(
        "  Poller: every {}ms, batch mode {}",
        config.poller.poll_interval_ms, config.poller.batch_mode
    );

    let store = Store::open(&config.database.path)?;
    let api: Arc<dyn MessagingApi> =
        Arc::new(TelegramClient::new(config.telegram.api_base_url.clone()));

    let last_seen = store
        .last_update_id()
        .await
        .context("Failed to read the last processed update")?;

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Shutdown requested");
                shutdown.cancel();
            }
            Err(e) => warn!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    info!("Running telegram bridge listener (last update {})", last_seen);
    let pipeline = Pipeline::spawn(
        Arc::clone(&api),
        store.clone(),
        &config.poller,
        last_seen,
        cancel.clone(),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr())
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr()))?;

    let served = api::serve(listener, AppState { store, api }, cancel.clone()).await;

    // The server only returns on shutdown or failure; stop the pipeline either way.
    cancel.cancel();
    pipeline.join().await;
    info!("Bridge stopped");

    served
}
