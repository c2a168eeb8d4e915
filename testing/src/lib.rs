//! # Classbook Testing
//!
//! Testing utilities for the Classbook reducer architecture.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - An in-memory journal ([`InMemoryEventStore`])
//! - A Given-When-Then harness for reducers ([`ReducerTest`])
//!
//! ## Example
//!
//! ```ignore
//! use classbook_testing::{ManualClock, InMemoryEventStore};
//!
//! #[tokio::test]
//! async fn registration_closes_on_time() {
//!     let clock = Arc::new(ManualClock::at("2025-03-03T09:00:00Z"));
//!     let engine = test_engine(clock.clone());
//!
//!     clock.advance(chrono::Duration::hours(1));
//!     let result = engine.claim(session_id, claimant).await;
//!     assert!(result.is_err());
//! }
//! ```

use chrono::{DateTime, Utc};
use classbook_core::environment::Clock;

mod event_store_mocks;

/// Mock implementations of environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::RwLock;

    pub use crate::event_store_mocks::InMemoryEventStore;

    /// Fixed clock for deterministic tests
    ///
    /// # Example
    ///
    /// ```
    /// use classbook_testing::mocks::FixedClock;
    /// use classbook_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// A clock tests can move.
    ///
    /// Deadline tests pin the clock to one second before and exactly at a
    /// boundary; [`ManualClock::set`] and [`ManualClock::advance`] make that
    /// explicit.
    #[derive(Debug)]
    pub struct ManualClock {
        time: RwLock<DateTime<Utc>>,
    }

    impl ManualClock {
        /// Start at `time`
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: RwLock::new(time),
            }
        }

        /// Start at an RFC 3339 timestamp
        ///
        /// # Panics
        ///
        /// Panics if `rfc3339` does not parse.
        #[must_use]
        #[allow(clippy::expect_used)]
        pub fn at(rfc3339: &str) -> Self {
            Self::new(
                DateTime::parse_from_rfc3339(rfc3339)
                    .expect("test timestamp should parse")
                    .with_timezone(&Utc),
            )
        }

        /// Jump to `time`
        #[allow(clippy::unwrap_used)]
        pub fn set(&self, time: DateTime<Utc>) {
            *self.time.write().unwrap() = time;
        }

        /// Move forward (or backward, with a negative duration)
        #[allow(clippy::unwrap_used)]
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.write().unwrap();
            *time += by;
        }
    }

    impl Clock for ManualClock {
        #[allow(clippy::unwrap_used)]
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap()
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Never in practice; the timestamp is hardcoded.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, InMemoryEventStore, ManualClock, test_clock};
pub use reducer_test::{ReducerTest, assertions};

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Duration};

    #[test]
    fn fixed_clock_is_new_year() {
        let clock = test_clock();
        let now = clock.now();
        assert_eq!((now.year(), now.month(), now.day()), (2025, 1, 1));
    }

    #[test]
    fn manual_clock_moves() {
        let clock = ManualClock::at("2025-03-03T09:00:00Z");
        let start = clock.now();

        clock.advance(Duration::minutes(90));
        assert_eq!(clock.now() - start, Duration::minutes(90));

        clock.set(start);
        assert_eq!(clock.now(), start);
    }
}
