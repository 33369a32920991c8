use thiserror::Error;

use crate::models::ProducerKey;

/// Unified error type for the Telebus broker
#[derive(Error, Debug)]
pub enum TelebusError {
    // Frame errors
    #[error("Malformed frame: {0}")]
    MalformedFrame(String),

    #[error("Unknown message type: {0}")]
    UnknownMessageType(String),

    // Referential failures
    #[error("Unknown producer: {0}")]
    UnknownProducer(ProducerKey),

    #[error("Unknown channel '{channel}' for producer {producer}")]
    UnknownChannel {
        producer: ProducerKey,
        channel: String,
    },

    #[error("Producer on port {port} has not logged in")]
    NotLoggedIn { port: u64 },

    // Catalog errors
    #[error("Failed to load catalog from {path}: {reason}")]
    CatalogLoad { path: String, reason: String },

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // Broker lifecycle
    #[error("Broker is no longer running")]
    BrokerGone,

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    // I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Telebus operations
pub type Result<T> = std::result::Result<T, TelebusError>;

impl TelebusError {
    /// True for failures the broker logs and drops without touching state.
    ///
    /// Covers the malformed-input, unknown-type and referential arms of the
    /// error taxonomy; none of these may take a connection (or the process)
    /// down.
    pub fn is_droppable(&self) -> bool {
        matches!(
            self,
            TelebusError::MalformedFrame(_)
                | TelebusError::UnknownMessageType(_)
                | TelebusError::UnknownProducer(_)
                | TelebusError::UnknownChannel { .. }
                | TelebusError::NotLoggedIn { .. }
                | TelebusError::Json(_)
        )
    }
}
