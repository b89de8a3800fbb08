//! Clock abstraction so time-dependent code (alert cooldowns, stall
//! watchdogs) can run against virtual time in tests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall-clock implementation used in production.
pub struct RealClock;

impl Default for RealClock {
    fn default() -> Self {
        Self::new()
    }
}

impl RealClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Virtual clock for deterministic tests. Time only moves when the test
/// calls [`TestClock::advance`].
pub struct TestClock {
    current_time: Mutex<Instant>,
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TestClock {
    pub fn new() -> Self {
        Self {
            current_time: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, duration: Duration) {
        let mut time = self.current_time.lock();
        *time += duration;
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        *self.current_time.lock()
    }
}

/// Thread-safe clock handle shared across pipeline components.
pub type SharedClock = Arc<dyn Clock + Send + Sync>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_advances_only_on_demand() {
        let clock = TestClock::new();
        let t0 = clock.now();
        assert_eq!(clock.now(), t0);

        clock.advance(Duration::from_secs(10));
        assert_eq!(clock.now(), t0 + Duration::from_secs(10));
    }

    #[test]
    fn shared_clock_coerces_from_concrete_types() {
        let real: SharedClock = Arc::new(RealClock::new());
        let test: SharedClock = Arc::new(TestClock::new());
        let a = real.now();
        let b = test.now();
        assert!(a.elapsed() >= Duration::ZERO);
        assert!(b.elapsed() >= Duration::ZERO);
    }
}
