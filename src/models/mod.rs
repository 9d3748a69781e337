//! Domain models shared across the bridge.

pub mod message;
pub mod tick;

pub use message::{OutboundRecord, TickMessage};
pub use tick::Tick;
