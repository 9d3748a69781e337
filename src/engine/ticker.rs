//! # engine::ticker
//!
//! The **Ticker**: a lazy stream of [`Tick`]s, one per period.
//!
//! * The first tick arrives after `initial_delay` (one period by default).
//! * Between ticks the task is parked on a tokio timer, no busy-waiting.
//! * Missed deadlines are *delayed*, never bursted, so two consecutive ticks
//!   are always at least one period apart.
//! * With a `repeat_count` the stream ends after that many ticks; otherwise it
//!   is infinite.  A finished ticker cannot be restarted.

use std::pin::Pin;
use std::task::{ready, Context, Poll};
use std::time::Duration;

use chrono::Utc;
use futures_util::Stream;
use tokio::time::{self, Instant, Interval, MissedTickBehavior};

use crate::config::TimerConfig;
use crate::error::{BridgeError, Result};
use crate::models::Tick;

pub struct Ticker {
    interval:  Interval,
    next_seq:  u64,
    /// Ticks still allowed.  `None` = unbounded.
    remaining: Option<u64>,
}

impl Ticker {
    /// Must be called inside a tokio runtime.
    pub fn new(period: Duration, initial_delay: Duration, repeat_count: Option<u64>) -> Result<Self> {
        if period.is_zero() {
            return Err(BridgeError::InvalidConfig("ticker period must be > 0".into()));
        }

        let mut interval = time::interval_at(Instant::now() + initial_delay, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        Ok(Self {
            interval,
            next_seq: 1,
            remaining: repeat_count,
        })
    }

    pub fn from_config(timer: &TimerConfig) -> Result<Self> {
        Self::new(timer.period, timer.initial_delay, timer.repeat_count)
    }
}

impl Stream for Ticker {
    type Item = Tick;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Tick>> {
        let this = self.get_mut();

        if this.remaining == Some(0) {
            return Poll::Ready(None);
        }

        ready!(this.interval.poll_tick(cx));

        let tick = Tick::new(this.next_seq, Utc::now());
        this.next_seq += 1;
        if let Some(left) = this.remaining.as_mut() {
            *left -= 1;
        }

        Poll::Ready(Some(tick))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.remaining {
            Some(n) => (n as usize, Some(n as usize)),
            None => (usize::MAX, None),
        }
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    /// Allowed slack between measured and configured spacing on a real clock.
    const JITTER_TOLERANCE: Duration = Duration::from_millis(5);

    #[test]
    fn test_zero_period_rejected() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        rt.block_on(async {
            let result = Ticker::new(Duration::ZERO, Duration::ZERO, None);
            assert!(matches!(result, Err(BridgeError::InvalidConfig(_))));
        });
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_period() {
        let start = Instant::now();
        let period = Duration::from_millis(1000);
        let mut ticker = Ticker::new(period, period, None).unwrap();

        let first = ticker.next().await.unwrap();
        assert_eq!(first.seq, 1);
        assert!(start.elapsed() >= period);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sequence_strictly_increasing_and_spaced() {
        let period = Duration::from_millis(250);
        let mut ticker = Ticker::new(period, period, None).unwrap();

        let mut last: Option<(u64, Instant)> = None;
        for _ in 0..10 {
            let tick = ticker.next().await.unwrap();
            let now = Instant::now();
            if let Some((seq, at)) = last {
                assert_eq!(tick.seq, seq + 1);
                assert!(now - at >= period, "ticks {seq} and {} only {:?} apart", tick.seq, now - at);
            }
            last = Some((tick.seq, now));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_stall_is_delayed_not_bursted() {
        let period = Duration::from_millis(100);
        let mut ticker = Ticker::new(period, period, None).unwrap();

        ticker.next().await.unwrap();
        // consumer stalls for several periods
        time::sleep(Duration::from_millis(550)).await;
        ticker.next().await.unwrap();
        let after_stall = Instant::now();
        ticker.next().await.unwrap();
        assert!(Instant::now() - after_stall >= period);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_count_ends_stream() {
        let period = Duration::from_millis(10);
        let ticker = Ticker::new(period, period, Some(3)).unwrap();
        assert_eq!(ticker.size_hint(), (3, Some(3)));

        let seqs: Vec<u64> = ticker.map(|t| t.seq).collect().await;
        assert_eq!(seqs, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_real_clock_spacing_within_tolerance() {
        let period = Duration::from_millis(25);
        let mut ticker = Ticker::new(period, period, Some(6)).unwrap();

        let mut stamps = Vec::new();
        while let Some(_tick) = ticker.next().await {
            stamps.push(Instant::now());
        }
        assert_eq!(stamps.len(), 6);
        for pair in stamps.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(gap + JITTER_TOLERANCE >= period, "gap {gap:?} shorter than {period:?}");
        }
    }
}
