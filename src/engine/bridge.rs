//! # engine::bridge
//!
//! The single composition point: Ticker → bounded queue → Publisher.
//!
//! ```text
//!   run() future                         spawned worker
//!  ┌──────────────┐  try_send  ┌──────┐  recv  ┌────────────────────┐
//!  │ Ticker loop  │ ─────────▶ │ mpsc │ ─────▶ │ Publisher::forward │ ──▶ Broker
//!  └──────────────┘  (full →   └──────┘        └────────────────────┘
//!         ▲           drop newest)
//!         │ watch<bool> shutdown
//! ```
//!
//! On shutdown the ticker stops at once.  Queued and in-flight sends, and the
//! final broker flush, share one `shutdown_grace` budget.  Ticks still queued
//! or in flight when it runs out are counted as `abandoned` and logged by
//! `seq`.  When the ticker runs out on its own (`repeat_count`) the queue is
//! drained fully.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::broker::Broker;
use crate::config::{Config, TimerConfig};
use crate::engine::publisher::Publisher;
use crate::engine::ticker::Ticker;
use crate::error::Result;
use crate::models::Tick;
use crate::state::{BridgeStats, SharedStats, StatsSnapshot};

/// Why the ticker loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    Shutdown,
    Exhausted,
}

/// The publish task plus what the bridge needs to account for its ticks
/// if the task has to be aborted.
struct Worker {
    handle:    JoinHandle<()>,
    queue:     Arc<Mutex<mpsc::Receiver<Tick>>>,
    /// `seq` of the tick being published, 0 when idle.
    in_flight: Arc<AtomicU64>,
}

pub struct Bridge<B> {
    timer:          TimerConfig,
    queue_capacity: usize,
    shutdown_grace: Duration,
    broker:         Arc<B>,
    publisher:      Arc<Publisher<B>>,
    stats:          SharedStats,
}

impl<B: Broker> Bridge<B> {
    pub fn new(config: &Config, broker: Arc<B>) -> Self {
        let stats: SharedStats = Arc::new(BridgeStats::new());
        let publisher = Arc::new(Publisher::new(Arc::clone(&broker), config, Arc::clone(&stats)));

        Self {
            timer:          config.timer.clone(),
            queue_capacity: config.queue_capacity,
            shutdown_grace: config.shutdown_grace,
            broker,
            publisher,
            stats,
        }
    }

    /// Run until `shutdown` flips to `true` (or its sender is dropped), or
    /// until the ticker is exhausted.  Returns the final counters.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<StatsSnapshot> {
        let ticker = Ticker::from_config(&self.timer)?;
        let (tx, rx) = mpsc::channel::<Tick>(self.queue_capacity);

        let mut worker = spawn_worker(Arc::clone(&self.publisher), rx);

        info!(
            timer    = %self.timer.name,
            period   = ?self.timer.period,
            capacity = self.queue_capacity,
            "⏱️ Ticker started"
        );

        let reason = self.pump(ticker, tx, &mut shutdown).await;

        let flush_budget = match reason {
            StopReason::Exhausted => {
                info!("Ticker exhausted — draining queue");
                if let Err(e) = (&mut worker.handle).await {
                    error!(error = %e, "Publish worker crashed");
                }
                self.shutdown_grace
            }
            StopReason::Shutdown => {
                let deadline = Instant::now() + self.shutdown_grace;
                info!(grace = ?self.shutdown_grace, "🛑 Shutdown requested — waiting for in-flight sends");
                match tokio::time::timeout_at(deadline, &mut worker.handle).await {
                    Ok(Ok(())) => debug!("Publish worker drained"),
                    Ok(Err(e)) => error!(error = %e, "Publish worker crashed"),
                    Err(_) => self.abandon(worker).await,
                }
                deadline.saturating_duration_since(Instant::now())
            }
        };

        if let Err(e) = self.broker.flush(flush_budget).await {
            warn!(error = %e, "Broker flush incomplete");
        }

        let snapshot = self.stats.snapshot();
        info!(stats = ?snapshot, "Bridge stopped");
        Ok(snapshot)
    }

    async fn pump(
        &self,
        mut ticker: Ticker,
        tx: mpsc::Sender<Tick>,
        shutdown: &mut watch::Receiver<bool>,
    ) -> StopReason {
        loop {
            let stop_requested = *shutdown.borrow();
            if stop_requested {
                return StopReason::Shutdown;
            }

            tokio::select! {
                biased;

                changed = shutdown.changed() => {
                    if changed.is_err() {
                        return StopReason::Shutdown;
                    }
                }
                next = ticker.next() => match next {
                    Some(tick) => self.enqueue(&tx, tick),
                    None => return StopReason::Exhausted,
                },
            }
        }
    }

    /// Abort the worker and account for every tick it still held.
    async fn abandon(&self, worker: Worker) {
        warn!("Grace period elapsed — abandoning in-flight sends");

        let Worker { handle, queue, in_flight } = worker;
        handle.abort();
        // wait for the task to be dropped so it releases the queue
        let _ = handle.await;

        let current = in_flight.swap(0, Ordering::SeqCst);
        if current != 0 {
            BridgeStats::incr(&self.stats.abandoned);
            warn!(
                seq = current,
                "Tick abandoned mid-send — the broker client may still deliver it during the final flush"
            );
        }

        let mut rx = queue.lock().await;
        while let Ok(tick) = rx.try_recv() {
            BridgeStats::incr(&self.stats.abandoned);
            warn!(seq = tick.seq, "Queued tick abandoned at shutdown");
        }
    }

    fn enqueue(&self, tx: &mpsc::Sender<Tick>, tick: Tick) {
        BridgeStats::incr(&self.stats.ticks_emitted);

        match tx.try_send(tick) {
            Ok(()) => debug!(seq = tick.seq, "Tick queued"),
            Err(TrySendError::Full(tick)) => {
                BridgeStats::incr(&self.stats.ticks_dropped);
                warn!(seq = tick.seq, capacity = self.queue_capacity, "🚧 Queue full — newest tick dropped");
            }
            Err(TrySendError::Closed(tick)) => {
                BridgeStats::incr(&self.stats.publish_failures);
                error!(seq = tick.seq, "Publish worker gone — tick dropped");
            }
        }
    }
}

fn spawn_worker<B: Broker>(publisher: Arc<Publisher<B>>, rx: mpsc::Receiver<Tick>) -> Worker {
    let queue = Arc::new(Mutex::new(rx));
    let in_flight = Arc::new(AtomicU64::new(0));

    let handle = tokio::spawn({
        let queue = Arc::clone(&queue);
        let in_flight = Arc::clone(&in_flight);
        async move {
            loop {
                let next = queue.lock().await.recv().await;
                let Some(tick) = next else { break };

                in_flight.store(tick.seq, Ordering::SeqCst);
                publisher.forward(tick).await;
                in_flight.store(0, Ordering::SeqCst);
            }
        }
    });

    Worker { handle, queue, in_flight }
}

// ─── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;
    use std::collections::HashMap;

    fn config(pairs: &[(&str, &str)]) -> Config {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned()).unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_count_publishes_every_tick_once() {
        let config = config(&[("TIMER_PERIOD_MS", "10"), ("TIMER_REPEAT_COUNT", "20")]);
        let broker = Arc::new(MemoryBroker::new());
        let (_tx, rx) = watch::channel(false);

        let snap = Bridge::new(&config, Arc::clone(&broker)).run(rx).await.unwrap();

        assert_eq!(broker.sequences(), (1..=20).collect::<Vec<u64>>());
        assert_eq!(snap.ticks_emitted, 20);
        assert_eq!(snap.published, 20);
        assert_eq!(snap.ticks_dropped, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_queue_drops_newest() {
        let config = config(&[
            ("TIMER_PERIOD_MS", "100"),
            ("QUEUE_CAPACITY", "1"),
            ("SHUTDOWN_GRACE_MS", "5000"),
        ]);
        let broker = Arc::new(MemoryBroker::new().with_latency(Duration::from_millis(1000)));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(Bridge::new(&config, Arc::clone(&broker)).run(rx));
        tokio::time::sleep(Duration::from_millis(1050)).await;
        tx.send(true).unwrap();
        let snap = handle.await.unwrap().unwrap();

        // tick 1 in flight, tick 2 queued, the rest dropped
        assert_eq!(broker.sequences(), vec![1, 2]);
        assert_eq!(snap.published, 2);
        assert_eq!(snap.ticks_dropped, snap.ticks_emitted - 2);
        assert!(snap.ticks_dropped >= 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_grace_period_abandons_slow_sends() {
        let config = config(&[("TIMER_PERIOD_MS", "100"), ("SHUTDOWN_GRACE_MS", "200")]);
        let broker = Arc::new(MemoryBroker::new().with_latency(Duration::from_secs(10)));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(Bridge::new(&config, Arc::clone(&broker)).run(rx));
        tokio::time::sleep(Duration::from_millis(550)).await;
        tx.send(true).unwrap();

        let started = Instant::now();
        let snap = handle.await.unwrap().unwrap();

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(broker.attempts(), 1);
        // tick 1 in flight, ticks 2..=5 still queued
        assert_eq!(snap.ticks_emitted, 5);
        assert_eq!(snap.published, 0);
        assert_eq!(snap.abandoned, 5);
        assert_eq!(snap.accounted(), snap.ticks_emitted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_shares_the_grace_budget() {
        let config = config(&[("TIMER_PERIOD_MS", "100"), ("SHUTDOWN_GRACE_MS", "2000")]);
        let broker = Arc::new(
            MemoryBroker::new()
                .with_latency(Duration::from_secs(60))
                .with_slow_flush(),
        );
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(Bridge::new(&config, Arc::clone(&broker)).run(rx));
        tokio::time::sleep(Duration::from_millis(150)).await;
        tx.send(true).unwrap();

        let started = Instant::now();
        let snap = handle.await.unwrap().unwrap();
        let took = started.elapsed();

        assert!(took >= Duration::from_millis(2000), "stopped early after {took:?}");
        assert!(took < Duration::from_millis(2100), "shutdown took {took:?} with a 2s grace");
        assert_eq!(snap.abandoned, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clean_shutdown_accounts_every_tick() {
        let config = config(&[("TIMER_PERIOD_MS", "100"), ("SHUTDOWN_GRACE_MS", "1000")]);
        let broker = Arc::new(MemoryBroker::new().with_latency(Duration::from_millis(30)));
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(Bridge::new(&config, Arc::clone(&broker)).run(rx));
        tokio::time::sleep(Duration::from_millis(1010)).await;
        tx.send(true).unwrap();
        let snap = handle.await.unwrap().unwrap();

        assert_eq!(snap.abandoned, 0);
        assert_eq!(snap.published, snap.ticks_emitted);
        assert_eq!(snap.accounted(), snap.ticks_emitted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_shutdown_sender_stops_bridge() {
        let config = config(&[("TIMER_PERIOD_MS", "100")]);
        let broker = Arc::new(MemoryBroker::new());
        let (tx, rx) = watch::channel(false);
        drop(tx);

        let snap = Bridge::new(&config, broker).run(rx).await.unwrap();
        assert_eq!(snap.ticks_emitted, 0);
    }
}
