//! Server implementation
//!
//! WebSocket endpoints for both connection roles plus dashboard asset
//! delivery.

pub mod routes;
pub mod server;
pub mod statics;
pub mod websocket;

pub use server::ApiServer;
