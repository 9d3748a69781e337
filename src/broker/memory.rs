//! # broker::memory
//!
//! In-process [`Broker`] that keeps every accepted record in a `Vec`.
//!
//! Failure injection:
//! * [`MemoryBroker::failing_first`]: the first N sends fail with a
//!   connection error, later sends succeed.
//! * [`MemoryBroker::rejecting`]: every send is refused permanently.
//! * [`MemoryBroker::with_latency`]: each send takes this long.
//! * [`MemoryBroker::with_slow_flush`]: `flush` uses up its whole timeout.

use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU32, AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use tracing::debug;

use super::{Ack, Broker};
use crate::error::{BridgeError, Result};
use crate::models::OutboundRecord;

#[derive(Debug, Default)]
pub struct MemoryBroker {
    records:        Mutex<Vec<OutboundRecord>>,
    attempts:       AtomicU64,
    fail_remaining: AtomicU32,
    reject_all:     AtomicBool,
    next_offset:    AtomicI64,
    latency:        Option<Duration>,
    slow_flush:     bool,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// The first `n` publishes fail with [`BridgeError::Connection`].
    pub fn failing_first(n: u32) -> Self {
        let broker = Self::new();
        broker.fail_remaining.store(n, Ordering::SeqCst);
        broker
    }

    /// Every publish fails with [`BridgeError::Rejected`].
    pub fn rejecting() -> Self {
        let broker = Self::new();
        broker.reject_all.store(true, Ordering::SeqCst);
        broker
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn with_slow_flush(mut self) -> Self {
        self.slow_flush = true;
        self
    }

    /// Accepted records in arrival order.
    pub fn records(&self) -> Vec<OutboundRecord> {
        self.lock().clone()
    }

    /// Sequence numbers of accepted records, read from the counter header.
    pub fn sequences(&self) -> Vec<u64> {
        self.lock()
            .iter()
            .filter_map(|r| r.header(crate::models::message::HEADER_TIMER_COUNTER))
            .filter_map(|v| v.parse().ok())
            .collect()
    }

    /// Every publish call, successful or not.
    pub fn attempts(&self) -> u64 {
        self.attempts.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, Vec<OutboundRecord>> {
        // a panicking test thread must not hide the records from the others
        self.records.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Broker for MemoryBroker {
    async fn publish(&self, record: &OutboundRecord) -> Result<Ack> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }

        if self.reject_all.load(Ordering::SeqCst) {
            return Err(BridgeError::Rejected(format!("topic '{}' refuses writes", record.topic)));
        }

        let failed = self
            .fail_remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failed {
            return Err(BridgeError::Connection(format!("simulated outage on attempt {attempt}")));
        }

        let offset = self.next_offset.fetch_add(1, Ordering::SeqCst);
        self.lock().push(record.clone());

        debug!(topic = %record.topic, offset, bytes = record.payload.len(), "📥 record stored in memory sink");

        Ok(Ack { partition: 0, offset })
    }

    async fn flush(&self, timeout: Duration) -> Result<()> {
        if self.slow_flush {
            tokio::time::sleep(timeout).await;
        }
        Ok(())
    }
}
