//! Time source abstraction.
//!
//! Every component reads "now" through a [`Clock`] so that staleness, expiry
//! and recency rules can be exercised deterministically.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> { Utc::now() }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
  now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self { Self { now: Mutex::new(start) } }

  pub fn advance(&self, by: Duration) { *self.now.lock() += by; }

  pub fn set(&self, to: DateTime<Utc>) { *self.now.lock() = to; }
}

impl Default for ManualClock {
  fn default() -> Self { Self::new(Utc::now()) }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> { *self.now.lock() }
}
