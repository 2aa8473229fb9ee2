//! Error taxonomy for the engine.
//!
//! Every operation returns a tagged error rather than panicking, so callers
//! can branch on the kind. Each domain error exposes a stable
//! [`code`](LedgerError::code) for boundary layers (an HTTP adapter maps
//! codes to statuses) and reports whether it is [`Transient`].
//!
//! Validation and capacity errors are always raised before any write, so a
//! failed call leaves balances, occupancy and history untouched.

use crate::ledger::UserId;
use crate::slot::{Capacity, SlotId};
use std::time::Duration;
use thiserror::Error;

/// Errors that are safe to retry with backoff.
pub trait Transient {
    /// Whether retrying the same request may succeed without changing it
    fn is_transient(&self) -> bool;
}

/// Errors from the keyed lock registry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LockError {
    /// The lock for `key` was not acquired within `timeout`.
    ///
    /// Nothing ran, so nothing was mutated.
    #[error("Timed out after {timeout:?} waiting for lock on key {key}")]
    Timeout {
        /// Display form of the contended key
        key: String,
        /// How long the caller waited
        timeout: Duration,
    },

    /// The critical section was aborted by runtime shutdown.
    #[error("Critical section for key {key} was aborted")]
    Aborted {
        /// Display form of the key
        key: String,
    },
}

impl Transient for LockError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Errors reported by store collaborators.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backing store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The backing store returned data that violates a domain invariant.
    #[error("Store data corrupted: {0}")]
    Corrupted(String),
}

impl Transient for StoreError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Errors from Balance Ledger operations.
///
/// When several conditions are violated at once the first in declaration
/// order wins: amount, then account, then the balance limit.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// Amount was zero or negative.
    #[error("Invalid amount: {amount} (must be greater than zero)")]
    InvalidAmount {
        /// The rejected amount
        amount: i64,
    },

    /// The user id cannot refer to an account.
    #[error("Account not found: {0}")]
    AccountNotFound(UserId),

    /// A USE asked for more than the balance holds.
    #[error("Insufficient funds: balance {balance} < requested {requested}")]
    InsufficientFunds {
        /// Balance at the time of the request
        balance: i64,
        /// Amount requested
        requested: i64,
    },

    /// A CHARGE would push the balance over the configured maximum.
    #[error("Balance limit exceeded: {balance} + {amount} > {limit}")]
    LimitExceeded {
        /// Balance at the time of the request
        balance: i64,
        /// Amount requested
        amount: i64,
        /// Configured maximum balance
        limit: i64,
    },

    /// The account's lock could not be acquired.
    #[error(transparent)]
    LockTimeout(#[from] LockError),

    /// A store collaborator failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LedgerError {
    /// Stable machine-readable code for boundary layers
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidAmount { .. } => "INVALID_AMOUNT",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::LimitExceeded { .. } => "LIMIT_EXCEEDED",
            Self::LockTimeout(_) => "LOCK_TIMEOUT",
            Self::Store(_) => "STORE_ERROR",
        }
    }
}

impl Transient for LedgerError {
    fn is_transient(&self) -> bool {
        match self {
            Self::LockTimeout(e) => e.is_transient(),
            Self::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}

/// Errors from Capacity Reservation operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReservationError {
    /// No slot (or no status for the slot) exists.
    #[error("Slot not found: {0}")]
    SlotNotFound(SlotId),

    /// Registration for the slot has been closed.
    #[error("Registration closed for slot {0}")]
    RegistrationClosed(SlotId),

    /// The slot is full.
    #[error("Capacity exceeded for slot {slot_id} (capacity {capacity})")]
    CapacityExceeded {
        /// The full slot
        slot_id: SlotId,
        /// Its capacity
        capacity: Capacity,
    },

    /// The holder already has a reservation for the slot.
    #[error("User {holder} already holds a reservation for slot {slot_id}")]
    DuplicateReservation {
        /// The holder
        holder: UserId,
        /// The slot
        slot_id: SlotId,
    },

    /// The slot's lock could not be acquired.
    #[error(transparent)]
    LockTimeout(#[from] LockError),

    /// A store collaborator failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ReservationError {
    /// Stable machine-readable code for boundary layers
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::SlotNotFound(_) => "SLOT_NOT_FOUND",
            Self::RegistrationClosed(_) => "REGISTRATION_CLOSED",
            Self::CapacityExceeded { .. } => "CAPACITY_EXCEEDED",
            Self::DuplicateReservation { .. } => "DUPLICATE_RESERVATION",
            Self::LockTimeout(_) => "LOCK_TIMEOUT",
            Self::Store(_) => "STORE_ERROR",
        }
    }
}

impl Transient for ReservationError {
    fn is_transient(&self) -> bool {
        match self {
            Self::LockTimeout(e) => e.is_transient(),
            Self::Store(e) => e.is_transient(),
            _ => false,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn timeout() -> LockError {
        LockError::Timeout {
            key: "42".to_string(),
            timeout: Duration::from_millis(10),
        }
    }

    #[test]
    fn only_lock_timeouts_and_outages_are_transient() {
        assert!(LedgerError::from(timeout()).is_transient());
        assert!(LedgerError::from(StoreError::Unavailable("down".into())).is_transient());
        assert!(!LedgerError::from(StoreError::Corrupted("bad".into())).is_transient());
        assert!(!LedgerError::InvalidAmount { amount: 0 }.is_transient());
        assert!(!ReservationError::SlotNotFound(SlotId::new(1)).is_transient());
        assert!(ReservationError::from(timeout()).is_transient());
        assert!(!ReservationError::from(LockError::Aborted { key: "1".into() }).is_transient());
    }

    #[test]
    fn codes_are_stable() {
        assert_eq!(LedgerError::from(timeout()).code(), "LOCK_TIMEOUT");
        assert_eq!(
            LedgerError::InsufficientFunds {
                balance: 1,
                requested: 2
            }
            .code(),
            "INSUFFICIENT_FUNDS"
        );
        assert_eq!(
            ReservationError::CapacityExceeded {
                slot_id: SlotId::new(1),
                capacity: Capacity::new(30).unwrap(),
            }
            .code(),
            "CAPACITY_EXCEEDED"
        );
    }

    #[test]
    fn messages_carry_context() {
        let err = LedgerError::LimitExceeded {
            balance: 999_990,
            amount: 20,
            limit: 1_000_000,
        };
        assert_eq!(
            err.to_string(),
            "Balance limit exceeded: 999990 + 20 > 1000000"
        );
        assert!(timeout().to_string().contains("key 42"));
    }
}
