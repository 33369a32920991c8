pub mod client;
pub mod command;
pub mod message;
pub mod panic;

pub use client::*;
pub use command::*;
pub use message::*;
pub use panic::*;

/// Process-unique sequential id of one socket connection, used as the "port"
/// for targeted reply addressing.
pub type ConnectionId = u64;
