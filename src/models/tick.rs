//! # models::tick
//!
//! Defines [`Tick`], the event the ticker produces once per period.
//!
//! `Copy` and field-only: a tick is created by the ticker, moved through the
//! hand-off queue, and consumed exactly once by the publisher.

use chrono::{DateTime, Utc};

/// A single timer firing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tick {
    /// 1-based, strictly increasing by one per tick.
    pub seq: u64,

    /// Wall-clock time the timer fired.
    pub fired_at: DateTime<Utc>,
}

impl Tick {
    #[inline]
    pub fn new(seq: u64, fired_at: DateTime<Utc>) -> Self {
        Self { seq, fired_at }
    }
}
