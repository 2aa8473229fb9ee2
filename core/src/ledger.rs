//! Domain types for the Balance Ledger.
//!
//! - [`Account`]: a user's current point balance
//! - [`LedgerEntry`]: immutable audit record of one successful mutation
//!
//! The ledger invariant ties the two together: an account's balance always
//! equals the sum of its CHARGE entries minus the sum of its USE entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a point-holding user.
///
/// Valid ids are positive. The wrapper accepts any `i64` so that callers can
/// pass raw request input straight through and receive
/// [`LedgerError::AccountNotFound`](crate::LedgerError::AccountNotFound)
/// for a non-positive id rather than a parse failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(i64);

impl UserId {
    /// Creates a `UserId` from a raw integer
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw integer
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }

    /// Whether this id can refer to an account (positive integer)
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.0 > 0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of balance mutation recorded in the ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    /// Points added to the balance
    Charge,
    /// Points spent from the balance
    Use,
}

impl TransactionKind {
    /// Stable lowercase label, used for metric labels and logs
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Charge => "charge",
            Self::Use => "use",
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Charge => write!(f, "CHARGE"),
            Self::Use => write!(f, "USE"),
        }
    }
}

/// A user's point balance.
///
/// Created on first reference with balance 0 and never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Account owner
    pub user_id: UserId,
    /// Current balance, always within `[0, max_balance]`
    pub balance: i64,
    /// When the balance was last written
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Creates an account snapshot
    #[must_use]
    pub const fn new(user_id: UserId, balance: i64, updated_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            balance,
            updated_at,
        }
    }

    /// The implicit account of a user the store has never seen
    #[must_use]
    pub const fn empty(user_id: UserId, at: DateTime<Utc>) -> Self {
        Self::new(user_id, 0, at)
    }
}

/// Immutable audit record of one balance mutation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Store-assigned id, increasing in insertion order
    pub id: u64,
    /// Account the mutation applied to
    pub user_id: UserId,
    /// Magnitude of the mutation (always positive)
    pub amount: i64,
    /// Whether points were added or spent
    pub kind: TransactionKind,
    /// When the mutation was applied
    pub recorded_at: DateTime<Utc>,
}

impl LedgerEntry {
    /// The entry's effect on the balance: `+amount` for CHARGE, `-amount` for USE
    #[must_use]
    pub const fn signed_amount(&self) -> i64 {
        match self.kind {
            TransactionKind::Charge => self.amount,
            TransactionKind::Use => -self.amount,
        }
    }
}

/// Sum of the signed amounts of `entries`.
///
/// For a complete history this reconstructs the account's balance.
#[must_use]
pub fn replay_balance(entries: &[LedgerEntry]) -> i64 {
    entries.iter().map(LedgerEntry::signed_amount).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u64, amount: i64, kind: TransactionKind) -> LedgerEntry {
        LedgerEntry {
            id,
            user_id: UserId::new(1),
            amount,
            kind,
            recorded_at: Utc::now(),
        }
    }

    #[test]
    fn user_id_validity() {
        assert!(UserId::new(1).is_valid());
        assert!(!UserId::new(0).is_valid());
        assert!(!UserId::new(-5).is_valid());
    }

    #[test]
    fn signed_amount_follows_kind() {
        assert_eq!(entry(1, 40, TransactionKind::Charge).signed_amount(), 40);
        assert_eq!(entry(2, 40, TransactionKind::Use).signed_amount(), -40);
    }

    #[test]
    fn replay_reconstructs_balance() {
        let history = vec![
            entry(1, 100, TransactionKind::Charge),
            entry(2, 30, TransactionKind::Use),
            entry(3, 5, TransactionKind::Charge),
        ];
        assert_eq!(replay_balance(&history), 75);
        assert_eq!(replay_balance(&[]), 0);
    }

    #[test]
    fn transaction_kind_serializes_uppercase() {
        assert_eq!(TransactionKind::Charge.to_string(), "CHARGE");
        assert_eq!(TransactionKind::Use.as_str(), "use");
    }
}
