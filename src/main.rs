//! # Ticker Bridge
//!
//! Fires a timer every `TIMER_PERIOD_MS` and publishes one message per tick
//! to `KAFKA_TOPIC` on `KAFKA_BROKERS`.
//!
//! ## Environment Variables
//!
//! | Variable          | Default          | Description                      |
//! |-------------------|------------------|----------------------------------|
//! | `TIMER_NAME`      | `foo`            | Timer name stamped on messages   |
//! | `TIMER_PERIOD_MS` | `1000`           | Tick period, must be > 0         |
//! | `KAFKA_BROKERS`   | `kafka-1:19092`  | Comma-separated `host:port` list |
//! | `KAFKA_TOPIC`     | `test`           | Destination topic                |
//! | `RUST_LOG`        | `ticker_bridge=debug` | Tracing filter              |
//!
//! See `config.rs` for the full list.

use std::sync::Arc;

use anyhow::Context;
use tokio::sync::watch;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use ticker_bridge::{Bridge, Config};

// ─── Entry Point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Load .env (optional, CI/prod can use real env vars) ──────────────
    dotenvy::dotenv().ok();

    // ── 2. Initialise structured logging ─────────────────────────────────────
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env()
            .add_directive("ticker_bridge=debug".parse()?)
            .add_directive("rdkafka=warn".parse()?))
        .init();

    info!(
        r#"

  ╔═══════════════════════════════════════════════╗
  ║        TICKER BRIDGE — timer → Kafka          ║
  ╚═══════════════════════════════════════════════╝"#
    );

    // ── 3. Load & validate config (fails before any ticker exists) ───────────
    let config = Config::from_env().context("Failed to load config")?;

    info!(
        timer   = %config.timer.name,
        period  = ?config.timer.period,
        brokers = %config.kafka.bootstrap_servers(),
        topic   = %config.kafka.topic,
        retries = config.retry.max_retries,
        "Ticker bridge configured"
    );

    // ── 4. Shutdown signal ───────────────────────────────────────────────────
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        wait_for_signal().await;
        let _ = shutdown_tx.send(true);
    });

    // ── 5. Run ───────────────────────────────────────────────────────────────
    let stats = run(&config, shutdown_rx).await?;

    info!(
        emitted   = stats.ticks_emitted,
        published = stats.published,
        dropped   = stats.ticks_dropped,
        failed    = stats.publish_failures,
        abandoned = stats.abandoned,
        "👋 Ticker bridge exited"
    );

    Ok(())
}

#[cfg(feature = "kafka")]
async fn run(
    config: &Config,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<ticker_bridge::state::StatsSnapshot> {
    let broker = ticker_bridge::broker::KafkaBroker::connect(&config.kafka)
        .context("Failed to create Kafka producer")?;

    Bridge::new(config, Arc::new(broker))
        .run(shutdown)
        .await
        .context("Bridge failed")
}

#[cfg(not(feature = "kafka"))]
async fn run(
    config: &Config,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<ticker_bridge::state::StatsSnapshot> {
    warn!("built without the `kafka` feature — ticks go to the in-memory sink");

    Bridge::new(config, Arc::new(ticker_bridge::broker::MemoryBroker::new()))
        .run(shutdown)
        .await
        .context("Bridge failed")
}

/// Resolve on Ctrl-C, or SIGTERM on unix.
async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Ctrl-C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received"),
        _ = terminate => info!("SIGTERM received"),
    }
}
