//! Wall-clock access for the draft engine.
//!
//! Timer records store an absolute start timestamp and every remaining-time
//! figure is derived from it. The [`Clock`] trait is the only way engine
//! code reads "now", so tests can substitute a clock that follows tokio's
//! virtual time.

use chrono::{DateTime, TimeDelta, Utc};
use tokio::time::Instant;

/// Source of the current UTC time.
pub trait Clock: Send + Sync + core::fmt::Debug {
    /// The current instant.
    fn now(&self) -> DateTime<Utc>;
}

/// The operating system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that advances with [`tokio::time::Instant`].
///
/// Anchored to a fixed UTC timestamp when created; `now()` returns the
/// anchor plus the monotonic time elapsed since. Under a paused tokio
/// runtime this tracks virtual time exactly, which keeps countdown
/// arithmetic and `tokio::time::sleep` in lockstep.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    anchor: DateTime<Utc>,
    origin: Instant,
}

impl MonotonicClock {
    /// A clock that reads `anchor` right now.
    pub fn anchored_at(anchor: DateTime<Utc>) -> Self {
        Self {
            anchor,
            origin: Instant::now(),
        }
    }

    /// A clock anchored to the current system time.
    pub fn starting_now() -> Self {
        Self::anchored_at(Utc::now())
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> DateTime<Utc> {
        let elapsed = TimeDelta::from_std(self.origin.elapsed()).unwrap_or(TimeDelta::MAX);
        self.anchor
            .checked_add_signed(elapsed)
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}
