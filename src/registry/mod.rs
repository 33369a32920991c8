//! Process-wide broker state
//!
//! Explicitly owned service objects, constructed once at startup and mutated
//! only from within the broker's single dispatch context.

pub mod channels;
pub mod clients;
pub mod panics;

pub use channels::{ChannelAddress, ChannelRegistry};
pub use clients::ClientRegistry;
pub use panics::PanicStack;
