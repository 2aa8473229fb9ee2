//! In-memory store implementations.
//!
//! Each store is a cheap-to-clone handle over shared state, so a test can
//! keep one clone for assertions while the service under test owns another.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)]

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use keyguard_core::StoreError;
use keyguard_core::environment::{Clock, SystemClock};
use keyguard_core::ledger::{Account, LedgerEntry, TransactionKind, UserId};
use keyguard_core::slot::{Reservation, Slot, SlotId, SlotStatus};
use keyguard_core::store::{
    BalanceStore, HistoryStore, ReservationStore, Result, SlotStatusStore, SlotStore,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

/// HashMap-backed [`BalanceStore`].
///
/// Stamps `updated_at` from its own clock on every save.
#[derive(Clone)]
pub struct InMemoryBalanceStore {
    accounts: Arc<RwLock<HashMap<UserId, Account>>>,
    clock: Arc<dyn Clock>,
}

impl InMemoryBalanceStore {
    /// Create an empty store stamped with wall-clock time.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(SystemClock)
    }

    /// Create an empty store stamped with `clock`.
    #[must_use]
    pub fn with_clock(clock: impl Clock + 'static) -> Self {
        Self {
            accounts: Arc::new(RwLock::new(HashMap::new())),
            clock: Arc::new(clock),
        }
    }

    /// Seed an account with a starting balance.
    #[must_use]
    pub fn with_balance(self, user_id: UserId, balance: i64) -> Self {
        let account = Account::new(user_id, balance, self.clock.now());
        self.accounts.write().unwrap().insert(user_id, account);
        self
    }

    /// Stored balance of `user_id`, if the account exists.
    #[must_use]
    pub fn balance_of(&self, user_id: UserId) -> Option<i64> {
        self.accounts
            .read()
            .unwrap()
            .get(&user_id)
            .map(|account| account.balance)
    }

    /// Number of stored accounts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.accounts.read().unwrap().len()
    }

    /// Whether no account has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.accounts.read().unwrap().is_empty()
    }
}

impl Default for InMemoryBalanceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for InMemoryBalanceStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBalanceStore")
            .field("accounts", &self.len())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl BalanceStore for InMemoryBalanceStore {
    async fn load(&self, user_id: UserId) -> Result<Option<Account>> {
        Ok(self.accounts.read().unwrap().get(&user_id).cloned())
    }

    async fn save(&self, user_id: UserId, balance: i64) -> Result<Account> {
        let account = Account::new(user_id, balance, self.clock.now());
        self.accounts
            .write()
            .unwrap()
            .insert(user_id, account.clone());
        Ok(account)
    }
}

/// Vec-backed append-only [`HistoryStore`].
///
/// Ids start at 1 and increase by one per append across all users.
#[derive(Clone, Debug, Default)]
pub struct InMemoryHistoryStore {
    entries: Arc<RwLock<Vec<LedgerEntry>>>,
}

impl InMemoryHistoryStore {
    /// Create an empty history.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry for every user, in append order.
    #[must_use]
    pub fn entries(&self) -> Vec<LedgerEntry> {
        self.entries.read().unwrap().clone()
    }

    /// Total number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    /// Whether nothing has been appended.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().unwrap().is_empty()
    }
}

#[async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(
        &self,
        user_id: UserId,
        amount: i64,
        kind: TransactionKind,
        recorded_at: DateTime<Utc>,
    ) -> Result<LedgerEntry> {
        let mut entries = self.entries.write().unwrap();
        let entry = LedgerEntry {
            id: entries.len() as u64 + 1,
            user_id,
            amount,
            kind,
            recorded_at,
        };
        entries.push(entry.clone());
        Ok(entry)
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<LedgerEntry>> {
        Ok(self
            .entries
            .read()
            .unwrap()
            .iter()
            .filter(|entry| entry.user_id == user_id)
            .cloned()
            .collect())
    }
}

/// BTreeMap-backed [`SlotStore`]; listings come out ordered by id.
#[derive(Clone, Debug, Default)]
pub struct InMemorySlotStore {
    slots: Arc<RwLock<BTreeMap<SlotId, Slot>>>,
}

impl InMemorySlotStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a slot definition.
    pub fn insert(&self, slot: Slot) {
        self.slots.write().unwrap().insert(slot.id, slot);
    }
}

#[async_trait]
impl SlotStore for InMemorySlotStore {
    async fn load(&self, slot_id: SlotId) -> Result<Option<Slot>> {
        Ok(self.slots.read().unwrap().get(&slot_id).cloned())
    }

    async fn list_by_date(&self, date: NaiveDate) -> Result<Vec<Slot>> {
        Ok(self
            .slots
            .read()
            .unwrap()
            .values()
            .filter(|slot| slot.date == date)
            .cloned()
            .collect())
    }
}

/// HashMap-backed [`SlotStatusStore`] that counts saves.
#[derive(Clone, Debug, Default)]
pub struct InMemorySlotStatusStore {
    statuses: Arc<RwLock<HashMap<SlotId, SlotStatus>>>,
    saves: Arc<AtomicUsize>,
}

impl InMemorySlotStatusStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Put a status in place without counting it as a save.
    pub fn seed(&self, status: SlotStatus) {
        self.statuses
            .write()
            .unwrap()
            .insert(status.slot_id, status);
    }

    /// Current status of `slot_id`.
    #[must_use]
    pub fn get(&self, slot_id: SlotId) -> Option<SlotStatus> {
        self.statuses.read().unwrap().get(&slot_id).cloned()
    }

    /// Number of `save` calls so far.
    #[must_use]
    pub fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SlotStatusStore for InMemorySlotStatusStore {
    async fn load(&self, slot_id: SlotId) -> Result<Option<SlotStatus>> {
        Ok(self.get(slot_id))
    }

    async fn save(&self, status: SlotStatus) -> Result<SlotStatus> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.statuses
            .write()
            .unwrap()
            .insert(status.slot_id, status.clone());
        Ok(status)
    }
}

/// Vec-backed [`ReservationStore`] enforcing (holder, slot) uniqueness.
#[derive(Clone, Debug, Default)]
pub struct InMemoryReservationStore {
    reservations: Arc<RwLock<Vec<Reservation>>>,
}

impl InMemoryReservationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every reservation in insertion order.
    #[must_use]
    pub fn all(&self) -> Vec<Reservation> {
        self.reservations.read().unwrap().clone()
    }

    /// Number of reservations for `slot_id`.
    #[must_use]
    pub fn count_for_slot(&self, slot_id: SlotId) -> usize {
        self.reservations
            .read()
            .unwrap()
            .iter()
            .filter(|r| r.slot_id == slot_id)
            .count()
    }
}

#[async_trait]
impl ReservationStore for InMemoryReservationStore {
    async fn exists(&self, holder: UserId, slot_id: SlotId) -> Result<bool> {
        Ok(self
            .reservations
            .read()
            .unwrap()
            .iter()
            .any(|r| r.holder == holder && r.slot_id == slot_id))
    }

    async fn insert(&self, reservation: Reservation) -> Result<Reservation> {
        let mut reservations = self.reservations.write().unwrap();
        if reservations
            .iter()
            .any(|r| r.holder == reservation.holder && r.slot_id == reservation.slot_id)
        {
            return Err(StoreError::Corrupted(format!(
                "duplicate reservation for user {} in slot {}",
                reservation.holder, reservation.slot_id
            )));
        }
        reservations.push(reservation.clone());
        Ok(reservation)
    }

    async fn list_by_holder(&self, holder: UserId) -> Result<Vec<Reservation>> {
        Ok(self
            .reservations
            .read()
            .unwrap()
            .iter()
            .filter(|r| r.holder == holder)
            .cloned()
            .collect())
    }
}
