//! # config
//!
//! Reads Config from environment variables.
//!
//! Everything is loaded once at startup and never mutated afterwards.  Any
//! invalid value aborts startup with [`BridgeError::InvalidConfig`] before the
//! ticker is created.
//!
//! [`Config::from_lookup`] takes the variable source as a closure so tests can
//! feed a map instead of touching the process environment.

use std::time::Duration;

use crate::engine::retry::RetryPolicy;
use crate::error::{BridgeError, Result};

/// Longest topic name Kafka accepts.
const MAX_TOPIC_LEN: usize = 249;

// ─── Timer ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct TimerConfig {
    /// Name stamped on every message, e.g. `"foo"`.
    pub name:          String,
    /// Spacing between ticks.  Always > 0.
    pub period:        Duration,
    /// Wait before the first tick.
    pub initial_delay: Duration,
    /// Stop after this many ticks.  `None` = run forever.
    pub repeat_count:  Option<u64>,
}

impl TimerConfig {
    pub fn period_ms(&self) -> u64 {
        self.period.as_millis() as u64
    }
}

// ─── Kafka endpoint ───────────────────────────────────────────────────────────

/// Producer acknowledgement level (`acks`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Acks {
    None,
    Leader,
    All,
}

impl Acks {
    pub fn as_str(&self) -> &'static str {
        match self {
            Acks::None   => "0",
            Acks::Leader => "1",
            Acks::All    => "all",
        }
    }
}

impl std::str::FromStr for Acks {
    type Err = BridgeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "0"          => Ok(Acks::None),
            "1"          => Ok(Acks::Leader),
            "all" | "-1" => Ok(Acks::All),
            other => Err(BridgeError::InvalidConfig(format!(
                "KAFKA_ACKS must be 0, 1 or all, got '{other}'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    /// `host:port` bootstrap servers.  Never empty.
    pub brokers:           Vec<String>,
    pub topic:             String,
    pub client_id:         String,
    pub acks:              Acks,
    /// How long librdkafka may try to deliver one attempt.
    pub message_timeout:   Duration,
    pub max_message_bytes: usize,
}

impl KafkaConfig {
    pub fn bootstrap_servers(&self) -> String {
        self.brokers.join(",")
    }
}

// ─── Config ───────────────────────────────────────────────────────────────────

/// Everything the bridge needs, validated.
#[derive(Debug, Clone)]
pub struct Config {
    pub timer:          TimerConfig,
    pub kafka:          KafkaConfig,
    pub retry:          RetryPolicy,
    /// Bound of the ticker → publisher hand-off queue.
    pub queue_capacity: usize,
    /// Time allowed for in-flight sends after a shutdown signal.
    pub shutdown_grace: Duration,
    /// Emit a stats line every N published ticks (0 = never).
    pub stats_every:    u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        // ── Timer ─────────────────────────────────────────────────────────────
        let period_ms = parse_i64(&var, "TIMER_PERIOD_MS", 1000)?;
        if period_ms <= 0 {
            return Err(BridgeError::InvalidConfig(format!(
                "TIMER_PERIOD_MS must be > 0, got {period_ms}"
            )));
        }
        let period = Duration::from_millis(period_ms as u64);

        let initial_delay = match var("TIMER_DELAY_MS") {
            Some(_) => {
                let delay_ms = parse_i64(&var, "TIMER_DELAY_MS", 0)?;
                if delay_ms < 0 {
                    return Err(BridgeError::InvalidConfig(format!(
                        "TIMER_DELAY_MS must be >= 0, got {delay_ms}"
                    )));
                }
                Duration::from_millis(delay_ms as u64)
            }
            None => period,
        };

        let repeat_count = match parse_u64(&var, "TIMER_REPEAT_COUNT", 0)? {
            0 => None,
            n => Some(n),
        };

        let timer = TimerConfig {
            name: var("TIMER_NAME").unwrap_or_else(|| "foo".to_string()),
            period,
            initial_delay,
            repeat_count,
        };

        // ── Kafka ─────────────────────────────────────────────────────────────
        let brokers = parse_brokers(&var("KAFKA_BROKERS").unwrap_or_else(|| "kafka-1:19092".to_string()))?;
        let topic = var("KAFKA_TOPIC").unwrap_or_else(|| "test".to_string());
        validate_topic(&topic)?;

        let acks = match var("KAFKA_ACKS") {
            Some(raw) => raw.parse()?,
            None => Acks::All,
        };

        let max_message_bytes = parse_u64(&var, "KAFKA_MAX_MESSAGE_BYTES", 1_000_000)? as usize;
        if max_message_bytes == 0 {
            return Err(BridgeError::InvalidConfig("KAFKA_MAX_MESSAGE_BYTES must be > 0".into()));
        }

        // librdkafka reads 0 as "wait forever", which would starve the retry loop
        let message_timeout_ms = parse_u64(&var, "KAFKA_MESSAGE_TIMEOUT_MS", 5000)?;
        if message_timeout_ms == 0 {
            return Err(BridgeError::InvalidConfig("KAFKA_MESSAGE_TIMEOUT_MS must be > 0".into()));
        }

        let kafka = KafkaConfig {
            brokers,
            topic,
            client_id: var("KAFKA_CLIENT_ID").unwrap_or_else(|| "ticker-bridge".to_string()),
            acks,
            message_timeout: Duration::from_millis(message_timeout_ms),
            max_message_bytes,
        };

        // ── Retry / queue / shutdown ──────────────────────────────────────────
        let max_retries = parse_u64(&var, "PUBLISH_MAX_RETRIES", 3)?;
        let max_retries = u32::try_from(max_retries).map_err(|_| {
            BridgeError::InvalidConfig(format!("PUBLISH_MAX_RETRIES must fit in u32, got {max_retries}"))
        })?;
        let retry = RetryPolicy::new(
            max_retries,
            Duration::from_millis(parse_u64(&var, "PUBLISH_BACKOFF_MS", 200)?),
            Duration::from_millis(parse_u64(&var, "PUBLISH_BACKOFF_MAX_MS", 5000)?),
        );

        let queue_capacity = parse_u64(&var, "QUEUE_CAPACITY", 16)? as usize;
        if queue_capacity == 0 {
            return Err(BridgeError::InvalidConfig("QUEUE_CAPACITY must be > 0".into()));
        }

        Ok(Self {
            timer,
            kafka,
            retry,
            queue_capacity,
            shutdown_grace: Duration::from_millis(parse_u64(&var, "SHUTDOWN_GRACE_MS", 2000)?),
            stats_every:    parse_u64(&var, "STATS_EVERY", 60)?,
        })
    }
}

// ─── Parsing helpers ──────────────────────────────────────────────────────────

fn parse_i64<F>(var: &F, key: &str, default: i64) -> Result<i64>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| BridgeError::InvalidConfig(format!("{key} must be an integer, got '{raw}'"))),
        None => Ok(default),
    }
}

fn parse_u64<F>(var: &F, key: &str, default: u64) -> Result<u64>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw.parse().map_err(|_| {
            BridgeError::InvalidConfig(format!("{key} must be a non-negative integer, got '{raw}'"))
        }),
        None => Ok(default),
    }
}

/// Split a comma-separated `host:port` list.
fn parse_brokers(raw: &str) -> Result<Vec<String>> {
    let brokers: Vec<String> = raw
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    if brokers.is_empty() {
        return Err(BridgeError::InvalidConfig("KAFKA_BROKERS must list at least one broker".into()));
    }

    for broker in &brokers {
        let (host, port) = broker.rsplit_once(':').ok_or_else(|| {
            BridgeError::InvalidConfig(format!("broker '{broker}' is not host:port"))
        })?;
        if host.is_empty() {
            return Err(BridgeError::InvalidConfig(format!("broker '{broker}' has an empty host")));
        }
        match port.parse::<u16>() {
            Ok(p) if p > 0 => {}
            _ => {
                return Err(BridgeError::InvalidConfig(format!(
                    "broker '{broker}' has an invalid port '{port}'"
                )))
            }
        }
    }

    Ok(brokers)
}

fn validate_topic(topic: &str) -> Result<()> {
    if topic.is_empty() {
        return Err(BridgeError::InvalidConfig("KAFKA_TOPIC must not be empty".into()));
    }
    if topic == "." || topic == ".." {
        return Err(BridgeError::InvalidConfig(format!("'{topic}' is not a legal topic name")));
    }
    if topic.len() > MAX_TOPIC_LEN {
        return Err(BridgeError::InvalidConfig(format!(
            "KAFKA_TOPIC is {} chars, max is {MAX_TOPIC_LEN}",
            topic.len()
        )));
    }
    if let Some(bad) = topic
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
    {
        return Err(BridgeError::InvalidConfig(format!(
            "KAFKA_TOPIC contains illegal character '{bad}'"
        )));
    }
    Ok(())
}

// ─── Tests ────────────────────────────────────────────────────────────────────
