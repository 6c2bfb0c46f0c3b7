//! # Shared poll interval.
//!
//! [`Pace`] is the delay a [`Runner`](crate::Runner) sleeps between
//! iterations. It is shared: the runner reads it before every sleep, and the
//! work (or its owner) may change it at any time, e.g. a hub client widens it
//! once connected and narrows it again after a disconnect.
//!
//! Stored as whole milliseconds; negative inputs clamp to zero.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Cloneable handle on a runner delay. Clones observe the same value.
#[derive(Clone, Debug, Default)]
pub struct Pace {
    millis: Arc<AtomicU64>,
}

impl Pace {
    pub fn new(delay: Duration) -> Self {
        let pace = Self::default();
        pace.set(delay);
        pace
    }

    /// Creates a pace from a signed millisecond count, clamping negatives to 0.
    pub fn from_millis(millis: i64) -> Self {
        let pace = Self::default();
        pace.set_millis(millis);
        pace
    }

    pub fn get(&self) -> Duration {
        Duration::from_millis(self.millis.load(Ordering::Acquire))
    }

    pub fn set(&self, delay: Duration) {
        let ms = delay.as_millis().min(u128::from(u64::MAX)) as u64;
        self.millis.store(ms, Ordering::Release);
    }

    /// Sets the delay from a signed millisecond count, clamping negatives to 0.
    pub fn set_millis(&self, millis: i64) {
        self.millis.store(millis.max(0) as u64, Ordering::Release);
    }
}
