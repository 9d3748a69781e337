//! Ticker, publisher, and the bridge that wires them together.

pub mod bridge;
pub mod publisher;
pub mod retry;
pub mod ticker;

pub use bridge::Bridge;
pub use publisher::{Delivery, Publisher};
pub use retry::RetryPolicy;
pub use ticker::Ticker;
