//! # Ticker Bridge
//!
//! Periodic timer → Kafka topic forwarder.
//!
//! ```text
//!  ┌──────────┐ Tick ┌──────────────┐ Tick ┌───────────┐ record ┌──────────────┐
//!  │  Ticker  │ ───▶ │ bounded mpsc │ ───▶ │ Publisher │ ─────▶ │ Kafka broker │
//!  └──────────┘      └──────────────┘      └───────────┘        └──────────────┘
//! ```
//!
//! [`engine::Bridge`] is the composition point; [`config::Config`] is the
//! only input.

pub mod broker;
pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod state;

pub use config::Config;
pub use engine::Bridge;
pub use error::BridgeError;
