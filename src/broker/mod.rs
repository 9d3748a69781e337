//! # broker
//!
//! The seam between the bridge and the message broker.
//!
//! The publisher only needs `publish(record) -> ack | error`, so that is all
//! [`Broker`] asks for.  Two implementations:
//!
//! * [`KafkaBroker`]: librdkafka `FutureProducer` (feature `kafka`).
//! * [`MemoryBroker`]: in-process sink with failure injection, used by tests
//!   and by builds without the `kafka` feature.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;
use crate::models::OutboundRecord;

#[cfg(feature = "kafka")]
pub mod kafka;
pub mod memory;

#[cfg(feature = "kafka")]
pub use kafka::KafkaBroker;
pub use memory::MemoryBroker;

/// Broker acknowledgement for one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ack {
    pub partition: i32,
    pub offset:    i64,
}

pub trait Broker: Send + Sync + 'static {
    /// Send one record and wait for the broker's verdict.
    fn publish(&self, record: &OutboundRecord) -> impl Future<Output = Result<Ack>> + Send;

    /// Push out anything buffered client-side.  Called once on shutdown.
    fn flush(&self, _timeout: Duration) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }
}
