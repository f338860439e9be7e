//! The injected clock collaborator.
//!
//! No code in this crate reads ambient time; every operation takes one
//! clock reading at its start and threads it through the rules and state
//! transitions, which keeps the issuer and matcher deterministic under test.
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};

/// Supplies the current instant.
pub trait Clock {
    /// Returns "now".
    fn now(&self) -> DateTime<Utc>;
}

impl<T: Clock + ?Sized> Clock for std::sync::Arc<T> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// The production clock: reads the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A settable clock for tests and scripted demos.
#[derive(Debug)]
pub struct FixedClock {
    at: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    /// Creates a clock pinned to `at`.
    pub fn new(at: DateTime<Utc>) -> Self {
        Self { at: Mutex::new(at) }
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        let mut at = self.at.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *at += delta;
    }

    /// Pins the clock to a new instant.
    pub fn set(&self, to: DateTime<Utc>) {
        let mut at = self.at.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        *at = to;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.at.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}
