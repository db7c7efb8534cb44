//! Injectable clock abstraction.
//!
//! Every expiry computation (credential sessions, cache TTLs) goes through
//! a [`Clock`] so tests can drive time explicitly instead of sleeping.

use std::sync::RwLock;

use time::OffsetDateTime;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current instant in UTC.
    fn now(&self) -> OffsetDateTime;
}

/// Wall-clock time. The default for production components.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// A clock whose current time is set by the caller.
///
/// Used in tests to step past TTLs and session expiries deterministically.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<OffsetDateTime>,
}

impl ManualClock {
    /// Creates a manual clock pinned at `now`.
    #[must_use]
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now: RwLock::new(now),
        }
    }

    /// Moves the clock to an absolute instant.
    pub fn set(&self, now: OffsetDateTime) {
        *self.now.write().expect("clock lock poisoned") = now;
    }

    /// Advances the clock by `delta`.
    pub fn advance(&self, delta: time::Duration) {
        let mut now = self.now.write().expect("clock lock poisoned");
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> OffsetDateTime {
        *self.now.read().expect("clock lock poisoned")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::new(datetime!(2025-06-01 12:00 UTC));
        assert_eq!(clock.now(), datetime!(2025-06-01 12:00 UTC));

        clock.advance(time::Duration::hours(3));
        assert_eq!(clock.now(), datetime!(2025-06-01 15:00 UTC));

        clock.set(datetime!(2025-07-01 0:00 UTC));
        assert_eq!(clock.now(), datetime!(2025-07-01 0:00 UTC));
    }
}
