//! Route definitions

use axum::routing::get;
use axum::Router;

use super::server::AppState;
use super::statics;
use super::websocket;

/// Create the router with both WebSocket roles and the asset fallback
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Producer connections (monitored processes)
        .route("/api", get(websocket::producer::producer_ws))
        // Consumer connections (dashboard viewers)
        .route("/user", get(websocket::consumer::consumer_ws))
        // Everything else is a dashboard asset
        .fallback(get(statics::serve_asset))
        .with_state(state)
}
