//! # engine::publisher
//!
//! The **Publisher** turns a [`Tick`] into an [`OutboundRecord`] and hands it
//! to the [`Broker`], retrying transport failures with bounded exponential
//! backoff.
//!
//! Delivery is at-most-once per tick: a tick that still fails after the last
//! retry, or fails with a non-retryable error, is logged and dropped.

use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::broker::{Ack, Broker};
use crate::config::{Config, TimerConfig};
use crate::engine::retry::RetryPolicy;
use crate::error::{BridgeError, Result};
use crate::models::{OutboundRecord, Tick, TickMessage};
use crate::state::{BridgeStats, SharedStats};

/// Outcome of a successful publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delivery {
    pub ack:      Ack,
    /// Attempts it took, 1 = first try.
    pub attempts: u32,
}

pub struct Publisher<B> {
    broker:            Arc<B>,
    topic:             String,
    timer:             TimerConfig,
    max_message_bytes: usize,
    retry:             RetryPolicy,
    stats_every:       u64,
    stats:             SharedStats,
}

impl<B: Broker> Publisher<B> {
    pub fn new(broker: Arc<B>, config: &Config, stats: SharedStats) -> Self {
        Self {
            broker,
            topic:             config.kafka.topic.clone(),
            timer:             config.timer.clone(),
            max_message_bytes: config.kafka.max_message_bytes,
            retry:             config.retry,
            stats_every:       config.stats_every,
            stats,
        }
    }

    /// Build the wire record for a tick.  Fails only on encoding.
    pub fn build_record(&self, tick: &Tick) -> Result<OutboundRecord> {
        let message = TickMessage::from_tick(tick, &self.timer);
        let payload = message.encode(self.max_message_bytes)?;
        Ok(OutboundRecord::new(&self.topic, &message, payload))
    }

    /// Publish one tick, retrying [`BridgeError::Connection`] up to the
    /// policy's bound.  Returns the last error if every attempt failed.
    pub async fn publish(&self, tick: &Tick) -> Result<Delivery> {
        let record = self.build_record(tick)?;
        let max_attempts = self.retry.max_attempts();
        let mut attempt = 1;

        loop {
            match self.broker.publish(&record).await {
                Ok(ack) => return Ok(Delivery { ack, attempts: attempt }),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let backoff = self.retry.backoff_for(attempt);
                    warn!(
                        seq     = tick.seq,
                        attempt,
                        max_attempts,
                        backoff = ?backoff,
                        error   = %e,
                        "⚠️ Publish failed — backing off"
                    );
                    BridgeStats::incr(&self.stats.retries);
                    tokio::time::sleep(backoff).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Publish a tick and account for the result.  Never fails: errors are
    /// logged with the tick's sequence number and the tick is dropped.
    pub async fn forward(&self, tick: Tick) {
        match self.publish(&tick).await {
            Ok(delivery) => {
                let published = BridgeStats::incr(&self.stats.published);
                debug!(
                    seq       = tick.seq,
                    topic     = %self.topic,
                    partition = delivery.ack.partition,
                    offset    = delivery.ack.offset,
                    attempts  = delivery.attempts,
                    "✅ Tick published"
                );
                if self.stats_every > 0 && published % self.stats_every == 0 {
                    info!(stats = ?self.stats.snapshot(), "📊 Bridge stats");
                }
            }
            Err(BridgeError::QueueFull) => {
                BridgeStats::incr(&self.stats.ticks_dropped);
                warn!(seq = tick.seq, "🚧 Producer queue full — tick dropped");
            }
            Err(e) => {
                BridgeStats::incr(&self.stats.publish_failures);
                error!(
                    seq   = tick.seq,
                    kind  = e.kind(),
                    error = %e,
                    "❌ Tick dropped after publish failure"
                );
            }
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
