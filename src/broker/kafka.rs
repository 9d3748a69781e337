//! # broker::kafka
//!
//! [`Broker`] backed by librdkafka's `FutureProducer`.
//!
//! Creating the producer does not open a connection; an unreachable cluster
//! shows up per record as a delivery timeout after `message.timeout.ms`,
//! which is mapped to [`BridgeError::Connection`] and retried by the
//! publisher.  The local send queue is never waited on: if it is full the
//! record is refused with [`BridgeError::QueueFull`] and the tick is dropped.

use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::error::{KafkaError, RDKafkaErrorCode};
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;
use tracing::{debug, info};

use super::{Ack, Broker};
use crate::config::KafkaConfig;
use crate::error::{BridgeError, Result};
use crate::models::OutboundRecord;

/// Records waiting in librdkafka's local queue before sends are refused.
const LOCAL_QUEUE_MAX_MESSAGES: &str = "1000";

pub struct KafkaBroker {
    producer: FutureProducer,
}

impl KafkaBroker {
    pub fn connect(config: &KafkaConfig) -> Result<Self> {
        let producer: FutureProducer = ClientConfig::new()
            .set("bootstrap.servers", config.bootstrap_servers())
            .set("client.id", &config.client_id)
            .set("acks", config.acks.as_str())
            .set("message.timeout.ms", config.message_timeout.as_millis().to_string())
            .set("message.max.bytes", config.max_message_bytes.max(1000).to_string())
            .set("queue.buffering.max.messages", LOCAL_QUEUE_MAX_MESSAGES)
            // retries are owned by the publisher's backoff policy
            .set("retries", "0")
            .create()
            .map_err(|e| BridgeError::InvalidConfig(format!("Kafka producer config rejected: {e}")))?;

        info!(
            brokers   = %config.bootstrap_servers(),
            client_id = %config.client_id,
            acks      = config.acks.as_str(),
            "🔌 Kafka producer created"
        );

        Ok(Self { producer })
    }
}

impl Broker for KafkaBroker {
    async fn publish(&self, record: &OutboundRecord) -> Result<Ack> {
        let headers = record.headers.iter().fold(OwnedHeaders::new(), |acc, (key, value)| {
            acc.insert(Header { key: key.as_str(), value: Some(value.as_str()) })
        });

        let future_record = FutureRecord::to(&record.topic)
            .key(record.key.as_str())
            .payload(record.payload.as_slice())
            .headers(headers);

        match self.producer.send(future_record, Timeout::After(Duration::ZERO)).await {
            Ok((partition, offset)) => {
                debug!(topic = %record.topic, partition, offset, "Kafka acknowledged record");
                Ok(Ack { partition, offset })
            }
            Err((err, _unsent)) => Err(classify(err)),
        }
    }

    async fn flush(&self, timeout: Duration) -> Result<()> {
        let producer = self.producer.clone();
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| BridgeError::Connection(format!("flush task failed: {e}")))?
            .map_err(|e| BridgeError::Connection(format!("flush did not complete: {e}")))
    }
}

/// Sort librdkafka failures into retryable transport trouble and permanent
/// refusals.
fn classify(err: KafkaError) -> BridgeError {
    match err.rdkafka_error_code() {
        Some(RDKafkaErrorCode::QueueFull) => BridgeError::QueueFull,
        Some(
            code @ (RDKafkaErrorCode::MessageSizeTooLarge
            | RDKafkaErrorCode::InvalidMessage
            | RDKafkaErrorCode::InvalidMessageSize
            | RDKafkaErrorCode::TopicAuthorizationFailed
            | RDKafkaErrorCode::InvalidTopic),
        ) => BridgeError::Rejected(code.to_string()),
        _ => BridgeError::Connection(err.to_string()),
    }
}
