//! Clock abstraction so stuck-detection and cooldown logic can be tested
//! without sleeping in real time.

use chrono::{DateTime, Utc};
use std::time::Duration;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn since(&self, earlier: DateTime<Utc>) -> Duration {
        let delta = self.now() - earlier;
        delta.to_std().unwrap_or(Duration::ZERO)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A fixed clock for deterministic tests; advance it explicitly with [`FakeClock::advance`].
/// Not gated behind `#[cfg(test)]` so integration tests under `tests/` can use it too.
pub struct FakeClock(std::sync::Mutex<DateTime<Utc>>);

impl FakeClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self(std::sync::Mutex::new(start))
    }

    pub fn advance(&self, delta: Duration) {
        let mut guard = self.0.lock().unwrap();
        *guard += chrono::Duration::from_std(delta).unwrap();
    }
}

impl Clock for FakeClock {
    fn now(&self) -> DateTime<Utc> {
        *self.0.lock().unwrap()
    }
}
