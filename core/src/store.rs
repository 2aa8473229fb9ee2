//! Store collaborator traits.
//!
//! The engine owns no persistence. Services receive these traits as
//! `Arc<dyn _>` and only ever call the mutating methods from inside the lock
//! of the key being written, so implementations need internal
//! synchronization for their own data structures but no cross-call
//! transactional semantics.
//!
//! # Implementations
//!
//! - In-memory implementations for tests live in `keyguard-testing`
//! - Durable implementations belong to the host application
//!
//! # Thread Safety
//!
//! All traits are `Send + Sync` so they can be shared across tasks.

use crate::error::StoreError;
use crate::ledger::{Account, LedgerEntry, TransactionKind, UserId};
use crate::slot::{Reservation, Slot, SlotId, SlotStatus};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};

/// Result type for store operations
pub type Result<T> = std::result::Result<T, StoreError>;

/// Current balance of each account.
#[async_trait]
pub trait BalanceStore: Send + Sync {
    /// Load an account. `None` means the store has never seen the user.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be read.
    async fn load(&self, user_id: UserId) -> Result<Option<Account>>;

    /// Write a new balance, creating the account if needed.
    ///
    /// Returns the stored snapshot (including its update time).
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be written.
    async fn save(&self, user_id: UserId, balance: i64) -> Result<Account>;
}

/// Append-only history of balance mutations.
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Append one entry and return it with its assigned id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be written.
    async fn append(
        &self,
        user_id: UserId,
        amount: i64,
        kind: TransactionKind,
        recorded_at: DateTime<Utc>,
    ) -> Result<LedgerEntry>;

    /// All entries for a user in insertion order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be read.
    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<LedgerEntry>>;
}

/// Immutable slot definitions.
#[async_trait]
pub trait SlotStore: Send + Sync {
    /// Load a slot by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be read.
    async fn load(&self, slot_id: SlotId) -> Result<Option<Slot>>;

    /// All slots taking place on `date`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be read.
    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Slot>>;
}

/// Mutable occupancy of each slot.
#[async_trait]
pub trait SlotStatusStore: Send + Sync {
    /// Load the status of a slot.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be read.
    async fn load(&self, slot_id: SlotId) -> Result<Option<SlotStatus>>;

    /// Replace the status of `status.slot_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be written.
    async fn save(&self, status: SlotStatus) -> Result<SlotStatus>;
}

/// Reservations made through enrollment.
///
/// Holds the (holder, slot) uniqueness data the duplicate check reads.
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Whether `holder` already has a reservation for `slot_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be read.
    async fn exists(&self, holder: UserId, slot_id: SlotId) -> Result<bool>;

    /// Persist a new reservation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be written.
    async fn insert(&self, reservation: Reservation) -> Result<Reservation>;

    /// All reservations of `holder`, in creation order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if the store cannot be read.
    async fn list_by_holder(&self, holder: UserId) -> Result<Vec<Reservation>>;
}
