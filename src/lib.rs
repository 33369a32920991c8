//! Telebus - telemetry and control relay broker
//!
//! Relays messages between two populations of long-lived WebSocket
//! connections: producers (monitored processes reporting status and channel
//! data) and consumers (dashboard viewers watching producer state and
//! issuing commands back).
//!
//! ## Features
//!
//! - Bounded-replay publish/subscribe bus with structured topic keys
//! - Producer identity registry surviving reconnects
//! - Per-channel replay history with snapshot delivery to late subscribers
//! - Port-scoped targeted deliveries and command round-tripping
//! - Stacked "panic" alerts resolved explicitly from the dashboard
//! - Path-traversal-safe dashboard asset serving

pub mod api;
pub mod broker;
pub mod bus;
pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod registry;

pub use broker::{Broker, BrokerHandle};
pub use catalog::Catalog;
pub use config::Config;
pub use error::{Result, TelebusError};
