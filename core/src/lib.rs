//! # Keyguard Core
//!
//! Core types and traits for the Keyguard keyed-concurrency engine.
//!
//! The engine mutates two kinds of shared state under concurrent access:
//!
//! - **Balances**: a per-user point balance with an append-only audit trail
//! - **Slots**: capacity-bounded pools (course sessions) that admit at most
//!   `capacity` reservations
//!
//! Every mutation follows the same shape: acquire the key's lock, read the
//! current state from a store, validate, compute the new state, write it,
//! release the lock. This crate holds the pieces every other crate shares:
//!
//! - **Types**: [`ledger`] and [`slot`] domain types
//! - **Errors**: the error taxonomy in [`error`]
//! - **Stores**: collaborator traits in [`store`], injected as `Arc<dyn _>`
//! - **Environment**: the [`environment::Clock`] abstraction
//!
//! ## Example
//!
//! ```
//! use keyguard_core::slot::{Capacity, SlotId, SlotState, SlotStatus};
//! use chrono::Utc;
//!
//! let status = SlotStatus::open(SlotId::new(7), Utc::now());
//! let next = status.admit(Capacity::new(1).unwrap(), Utc::now()).unwrap();
//! assert_eq!(next.state, SlotState::Full);
//! assert_eq!(next.occupants, 1);
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, NaiveDate, Utc};
pub use serde::{Deserialize, Serialize};

pub mod error;
pub mod ledger;
pub mod slot;
pub mod store;

pub use error::{LedgerError, LockError, ReservationError, StoreError, Transient};

/// Environment module - Dependency injection traits
///
/// All external dependencies are abstracted behind traits and injected
/// into the services that need them.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Production - uses system clock
    /// struct SystemClock;
    /// impl Clock for SystemClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         Utc::now()
    ///     }
    /// }
    ///
    /// // Test - fixed time for deterministic tests
    /// struct FixedClock { time: DateTime<Utc> }
    /// impl Clock for FixedClock {
    ///     fn now(&self) -> DateTime<Utc> {
    ///         self.time
    ///     }
    /// }
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time from the operating system.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::environment::{Clock, SystemClock};

    #[test]
    fn system_clock_moves_forward() {
        let clock = SystemClock;
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
