//! Broker server using Axum
//!
//! One listener carries both WebSocket roles and the dashboard assets.

use std::net::SocketAddr;

use axum::Router;
use tokio::sync::watch;
use tower_http::trace::TraceLayer;
use tracing::{info, instrument};

use crate::broker::BrokerHandle;
use crate::config::Config;
use crate::error::{Result, TelebusError};

use super::routes;

/// Shared state for connection handlers
#[derive(Clone)]
pub struct AppState {
    pub broker: BrokerHandle,
    pub public_root: String,
}

/// Broker-facing HTTP/WebSocket server
pub struct ApiServer {
    config: Config,
    state: AppState,
}

impl ApiServer {
    /// Create a new server around a running broker
    pub fn new(config: Config, broker: BrokerHandle) -> Self {
        let state = AppState {
            broker,
            public_root: config.assets.public_root.clone(),
        };

        Self { config, state }
    }

    /// Build the router
    fn build_router(&self) -> Router {
        routes::create_router(self.state.clone()).layer(TraceLayer::new_for_http())
    }

    /// Run the server until the shutdown signal flips
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let addr: SocketAddr = self
            .config
            .bind_addr()
            .parse()
            .map_err(|_| TelebusError::InvalidConfig("invalid bind address".into()))?;

        let router = self.build_router();

        info!("Server listening on {}", addr);

        let listener = tokio::net::TcpListener::bind(addr).await?;

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await
            .map_err(|e| TelebusError::Internal(e.to_string()))?;

        info!("Server shut down");
        Ok(())
    }
}
