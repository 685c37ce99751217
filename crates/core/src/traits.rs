//! Environment inputs consumed by the engine's drivers.
//!
//! The engine itself never reads the wall clock or an oracle; the actor and
//! the CLI pull `now` and the YBT rate from these sources and pass them in.

use crate::math::Rate;
use crate::types::Timestamp;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of the current epoch time in seconds.
pub trait Clock: Send + Sync {
    fn now(&self) -> Timestamp;
}

/// Source of the current YBT → base exchange rate.
pub trait RateSource: Send + Sync {
    fn ybt_rate(&self) -> Rate;
}

/// Clock driven by hand. Never moves backwards.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    #[must_use]
    pub const fn new(start: Timestamp) -> Self {
        Self {
            now: AtomicU64::new(start),
        }
    }

    /// Moves the clock forward to `to`; earlier values are ignored.
    pub fn set(&self, to: Timestamp) {
        self.now.fetch_max(to, Ordering::SeqCst);
    }

    /// Moves the clock forward by `seconds`.
    pub fn advance(&self, seconds: u64) {
        let _ = self
            .now
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |current| {
                Some(current.saturating_add(seconds))
            });
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now.load(Ordering::SeqCst)
    }
}

/// Rate that can be changed between operations.
#[derive(Debug)]
pub struct ManualRate {
    rate: RwLock<Rate>,
}

impl ManualRate {
    #[must_use]
    pub fn new(rate: Rate) -> Self {
        Self {
            rate: RwLock::new(rate),
        }
    }

    pub fn set(&self, rate: Rate) {
        *self.rate.write() = rate;
    }
}

impl Default for ManualRate {
    fn default() -> Self {
        Self::new(Rate::ONE)
    }
}

impl RateSource for ManualRate {
    fn ybt_rate(&self) -> Rate {
        *self.rate.read()
    }
}
