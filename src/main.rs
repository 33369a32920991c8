//! Telebus Broker - Entry Point
//!
//! Starts the broker actor and the server with graceful shutdown support.

use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod broker;
mod bus;
mod catalog;
mod config;
mod error;
mod models;
mod registry;

use api::ApiServer;
use broker::Broker;
use catalog::Catalog;
use config::Config;

#[tokio::main]
async fn main() -> error::Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing; RUST_LOG overrides the configured level
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log.filter_directive()));
    let registry = tracing_subscriber::registry().with(filter);
    if config.log.is_json() {
        registry
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    info!("Starting Telebus broker");
    info!("Configuration loaded");

    // Load the descriptor catalog
    let catalog = match &config.catalog.path {
        Some(path) => Catalog::load(path)?,
        None => {
            info!("No descriptor catalog configured, producers log in bare");
            Catalog::empty()
        }
    };

    // Spawn the broker actor
    let broker = Broker::spawn(catalog);

    // Create shutdown channel
    let (shutdown_tx, _) = watch::channel(false);

    // Start the server
    let server = ApiServer::new(config.clone(), broker);
    let server_shutdown = shutdown_tx.subscribe();
    let server_task = tokio::spawn(async move {
        if let Err(e) = server.run(server_shutdown).await {
            error!("Server error: {}", e);
        }
    });

    info!(
        "Broker started - listening on {}:{}",
        config.server.host, config.server.port
    );

    // Wait for shutdown signal
    shutdown_signal().await;
    info!("Shutdown signal received");

    let _ = shutdown_tx.send(true);
    let _ = tokio::join!(server_task);

    info!("Telebus broker stopped");
    Ok(())
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
