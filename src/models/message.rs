//! # models::message
//!
//! The wire shape of a tick: [`TickMessage`] is the JSON body, and
//! [`OutboundRecord`] is what a [`Broker`](crate::broker::Broker) receives
//! (topic, key, encoded body, headers).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::TimerConfig;
use crate::error::{BridgeError, Result};
use crate::models::Tick;

pub const HEADER_TIMER_NAME: &str = "timer-name";
pub const HEADER_TIMER_COUNTER: &str = "timer-counter";
pub const HEADER_FIRED_AT: &str = "timer-fired-at";
pub const HEADER_MESSAGE_ID: &str = "message-id";

/// JSON body published for every tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickMessage {
    /// Unique per message, lets consumers spot duplicates.
    pub message_id: Uuid,
    pub timer:      String,
    pub sequence:   u64,
    pub fired_at:   DateTime<Utc>,
    pub period_ms:  u64,
}

impl TickMessage {
    pub fn from_tick(tick: &Tick, timer: &TimerConfig) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            timer:      timer.name.clone(),
            sequence:   tick.seq,
            fired_at:   tick.fired_at,
            period_ms:  timer.period_ms(),
        }
    }

    /// Encode to JSON, refusing payloads over `max_bytes`.
    pub fn encode(&self, max_bytes: usize) -> Result<Vec<u8>> {
        let payload = serde_json::to_vec(self)?;
        if payload.len() > max_bytes {
            return Err(BridgeError::Serialization(format!(
                "payload is {} bytes, limit is {max_bytes}",
                payload.len()
            )));
        }
        Ok(payload)
    }
}

/// A fully encoded record ready for the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRecord {
    pub topic:   String,
    /// Partitioning key.  The timer name, so one timer stays on one partition.
    pub key:     String,
    pub payload: Vec<u8>,
    pub headers: Vec<(String, String)>,
}

impl OutboundRecord {
    pub fn new(topic: &str, message: &TickMessage, payload: Vec<u8>) -> Self {
        let headers = vec![
            (HEADER_TIMER_NAME.to_string(),    message.timer.clone()),
            (HEADER_TIMER_COUNTER.to_string(), message.sequence.to_string()),
            (HEADER_FIRED_AT.to_string(),      message.fired_at.to_rfc3339()),
            (HEADER_MESSAGE_ID.to_string(),    message.message_id.to_string()),
        ];

        Self {
            topic: topic.to_string(),
            key: message.timer.clone(),
            payload,
            headers,
        }
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Decode the JSON body back.  Used by tests and the in-memory sink.
    pub fn decode(&self) -> Result<TickMessage> {
        Ok(serde_json::from_slice(&self.payload)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn timer() -> TimerConfig {
        TimerConfig {
            name:          "foo".to_string(),
            period:        Duration::from_millis(1000),
            initial_delay: Duration::from_millis(1000),
            repeat_count:  None,
        }
    }

    #[test]
    fn test_record_carries_tick_identity() {
        let tick = Tick::new(7, Utc::now());
        let message = TickMessage::from_tick(&tick, &timer());
        let payload = message.encode(1_000_000).unwrap();
        let record = OutboundRecord::new("test", &message, payload);

        assert_eq!(record.topic, "test");
        assert_eq!(record.key, "foo");
        assert_eq!(record.header(HEADER_TIMER_COUNTER), Some("7"));
        assert_eq!(record.header(HEADER_TIMER_NAME), Some("foo"));

        let decoded = record.decode().unwrap();
        assert_eq!(decoded, message);
        assert_eq!(decoded.period_ms, 1000);
    }

    #[test]
    fn test_oversized_payload_is_serialization_error() {
        let message = TickMessage::from_tick(&Tick::new(1, Utc::now()), &timer());
        match message.encode(8) {
            Err(BridgeError::Serialization(msg)) => assert!(msg.contains("limit is 8")),
            other => panic!("expected Serialization error, got {other:?}"),
        }
    }

    #[test]
    fn test_message_ids_are_unique() {
        let tick = Tick::new(1, Utc::now());
        let a = TickMessage::from_tick(&tick, &timer());
        let b = TickMessage::from_tick(&tick, &timer());
        assert_ne!(a.message_id, b.message_id);
    }
}
