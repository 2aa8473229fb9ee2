//! # Keyguard Testing
//!
//! Test support for the Keyguard services.
//!
//! This crate provides:
//! - In-memory implementations of every store trait
//! - A fixed clock for deterministic timestamps
//! - Store wrappers that inject latency or failures
//! - One-call tracing setup for tests
//!
//! ## Example
//!
//! ```
//! use keyguard_core::ledger::UserId;
//! use keyguard_core::store::BalanceStore;
//! use keyguard_testing::{InMemoryBalanceStore, test_clock};
//!
//! # async fn example() -> Result<(), keyguard_core::StoreError> {
//! let balances = InMemoryBalanceStore::with_clock(test_clock())
//!     .with_balance(UserId::new(1), 100);
//!
//! let account = balances.load(UserId::new(1)).await?;
//! assert_eq!(account.map(|a| a.balance), Some(100));
//! # Ok(())
//! # }
//! ```

use chrono::{DateTime, Utc};
use keyguard_core::environment::Clock;

pub mod faults;
pub mod stores;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use keyguard_testing::mocks::FixedClock;
    /// use keyguard_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone, Copy)]
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

/// Install a `tracing` subscriber honoring `RUST_LOG`, writing to the test
/// harness's captured output.
///
/// Safe to call from every test; only the first call installs anything.
pub fn init_test_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

pub use faults::{
    FailingBalanceStore, FailingHistoryStore, FailingReservationStore, SlowBalanceStore,
    SlowSlotStatusStore,
};
pub use mocks::{FixedClock, test_clock};
pub use stores::{
    InMemoryBalanceStore, InMemoryHistoryStore, InMemoryReservationStore, InMemorySlotStatusStore,
    InMemorySlotStore,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_clock_is_stable() {
        let clock = test_clock();
        let first = clock.now();
        assert_eq!(first, clock.now());
        assert_eq!(first.to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn tracing_init_is_idempotent() {
        init_test_tracing();
        init_test_tracing();
    }
}
