//! Wall-clock source used for due-set and hand-off computations.

use std::sync::Arc;

use jiff::Timestamp;

/// Source of the current time.
pub trait Clock: Send + Sync + 'static {
    fn now(&self) -> Timestamp;
}

/// Clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Shared handle to a clock.
pub type SharedClock = Arc<dyn Clock>;

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeClock;

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use std::sync::Arc;

    use jiff::{SignedDuration, Timestamp};
    use parking_lot::Mutex;

    use super::Clock;

    /// Manually driven clock for tests.
    #[derive(Debug, Clone)]
    pub struct FakeClock {
        now: Arc<Mutex<Timestamp>>,
    }

    impl FakeClock {
        pub fn new(now: Timestamp) -> Self {
            Self {
                now: Arc::new(Mutex::new(now)),
            }
        }

        pub fn set(&self, now: Timestamp) {
            *self.now.lock() = now;
        }

        pub fn advance(&self, by: SignedDuration) {
            let mut now = self.now.lock();
            *now = now.checked_add(by).unwrap_or(Timestamp::MAX);
        }
    }

    impl Clock for FakeClock {
        fn now(&self) -> Timestamp {
            *self.now.lock()
        }
    }
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;

    use super::*;

    #[test]
    fn test_fake_clock_advances() {
        let start = Timestamp::from_second(1_000).unwrap();
        let clock = FakeClock::new(start);
        clock.advance(SignedDuration::from_secs(30));
        assert_eq!(clock.now(), Timestamp::from_second(1_030).unwrap());

        let shared: SharedClock = Arc::new(clock.clone());
        clock.set(start);
        assert_eq!(shared.now(), start);
    }
}
