//! # state
//!
//! Run-time counters shared by the ticker loop and the publish worker.
//!
//! Plain atomics behind an `Arc`: the only shared mutable state in the
//! bridge.  Config is read-only and lives in its own `Arc`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;

#[derive(Debug, Default)]
pub struct BridgeStats {
    /// Ticks produced by the ticker.
    pub ticks_emitted:    AtomicU64,
    /// Ticks dropped because the hand-off queue or producer queue was full.
    pub ticks_dropped:    AtomicU64,
    /// Ticks acknowledged by the broker.
    pub published:        AtomicU64,
    /// Ticks given up on after a non-retryable error or exhausted retries.
    pub publish_failures: AtomicU64,
    /// Extra send attempts beyond the first.
    pub retries:          AtomicU64,
    /// Queued or in-flight ticks cut off when the shutdown grace ran out.
    pub abandoned:        AtomicU64,
}

/// Point-in-time copy of [`BridgeStats`], for logs and tests.
///
/// Once the bridge has stopped every emitted tick lands in exactly one
/// bucket: `published`, `ticks_dropped`, `publish_failures` or `abandoned`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub ticks_emitted:    u64,
    pub ticks_dropped:    u64,
    pub published:        u64,
    pub publish_failures: u64,
    pub retries:          u64,
    pub abandoned:        u64,
}

impl StatsSnapshot {
    /// Sum of all final outcomes, equals `ticks_emitted` after a stop.
    pub fn accounted(&self) -> u64 {
        self.published + self.ticks_dropped + self.publish_failures + self.abandoned
    }
}

impl BridgeStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn incr(counter: &AtomicU64) -> u64 {
        counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ticks_emitted:    self.ticks_emitted.load(Ordering::Relaxed),
            ticks_dropped:    self.ticks_dropped.load(Ordering::Relaxed),
            published:        self.published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
            retries:          self.retries.load(Ordering::Relaxed),
            abandoned:        self.abandoned.load(Ordering::Relaxed),
        }
    }
}

/// Convenience type alias
pub type SharedStats = Arc<BridgeStats>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_increments() {
        let stats = BridgeStats::new();
        BridgeStats::incr(&stats.ticks_emitted);
        BridgeStats::incr(&stats.ticks_emitted);
        assert_eq!(BridgeStats::incr(&stats.published), 1);

        let snap = stats.snapshot();
        assert_eq!(snap.ticks_emitted, 2);
        assert_eq!(snap.published, 1);
        assert_eq!(snap.ticks_dropped, 0);
        assert_eq!(snap.accounted(), 1);
    }
}
