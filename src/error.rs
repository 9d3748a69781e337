//! # error
//!
//! Centralised error type for the bridge.
//!
//! Config loading returns `InvalidConfig` and aborts startup.  Everything else
//! is raised per tick by the publish path; the worker decides from
//! [`BridgeError::is_retryable`] whether to back off and try again or to log
//! and drop the tick.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// A configuration value is missing, malformed, or out of range.
    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    /// The broker could not be reached or did not acknowledge in time.
    #[error("Broker connection error: {0}")]
    Connection(String),

    /// The broker refused the record permanently (size, auth, bad record).
    #[error("Broker rejected record: {0}")]
    Rejected(String),

    /// The producer's outbound queue is full.
    #[error("Producer queue full")]
    QueueFull,

    /// The tick payload could not be encoded for the wire.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl BridgeError {
    /// Only transport failures are worth another attempt.
    #[inline]
    pub fn is_retryable(&self) -> bool {
        matches!(self, BridgeError::Connection(_))
    }

    /// Short machine-friendly label used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::InvalidConfig(_) => "invalid_config",
            BridgeError::Connection(_) => "connection",
            BridgeError::Rejected(_) => "rejected",
            BridgeError::QueueFull => "queue_full",
            BridgeError::Serialization(_) => "serialization",
        }
    }
}

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::Serialization(err.to_string())
    }
}

pub type Result<T, E = BridgeError> = std::result::Result<T, E>;
