//! WebSocket connection endpoints
//!
//! One module per connection role. Both follow the same shape: split the
//! socket, drain an unbounded outbound channel in a send task, and feed
//! parsed frames into the broker inbox from the receive loop. The broker
//! never touches sockets; endpoints never touch broker state.

pub mod consumer;
pub mod producer;

use std::sync::atomic::{AtomicU64, Ordering};

use crate::models::ConnectionId;

static NEXT_PORT: AtomicU64 = AtomicU64::new(1);

/// Allocate the process-unique sequential id ("port") for a new connection
pub fn next_port() -> ConnectionId {
    NEXT_PORT.fetch_add(1, Ordering::Relaxed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ports_are_unique_and_increasing() {
        let first = next_port();
        let second = next_port();
        assert!(second > first);
    }
}
