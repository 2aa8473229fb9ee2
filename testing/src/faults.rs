//! Store wrappers that inject latency or failures.
//!
//! Latency wrappers stretch a critical section so tests can force lock
//! contention and timeouts deterministically. Failure wrappers make a store
//! report [`StoreError::Unavailable`] a set number of times.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use keyguard_core::StoreError;
use keyguard_core::ledger::{Account, LedgerEntry, TransactionKind, UserId};
use keyguard_core::slot::{Reservation, SlotId, SlotStatus};
use keyguard_core::store::{BalanceStore, HistoryStore, ReservationStore, Result, SlotStatusStore};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// [`BalanceStore`] that sleeps before every load.
#[derive(Clone, Debug)]
pub struct SlowBalanceStore<S> {
    inner: S,
    delay: Duration,
}

impl<S> SlowBalanceStore<S> {
    /// Wrap `inner`, delaying each load by `delay`.
    #[must_use]
    pub const fn new(inner: S, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl<S: BalanceStore> BalanceStore for SlowBalanceStore<S> {
    async fn load(&self, user_id: UserId) -> Result<Option<Account>> {
        tokio::time::sleep(self.delay).await;
        self.inner.load(user_id).await
    }

    async fn save(&self, user_id: UserId, balance: i64) -> Result<Account> {
        self.inner.save(user_id, balance).await
    }
}

/// [`SlotStatusStore`] that sleeps before every load.
#[derive(Clone, Debug)]
pub struct SlowSlotStatusStore<S> {
    inner: S,
    delay: Duration,
}

impl<S> SlowSlotStatusStore<S> {
    /// Wrap `inner`, delaying each load by `delay`.
    #[must_use]
    pub const fn new(inner: S, delay: Duration) -> Self {
        Self { inner, delay }
    }
}

#[async_trait]
impl<S: SlotStatusStore> SlotStatusStore for SlowSlotStatusStore<S> {
    async fn load(&self, slot_id: SlotId) -> Result<Option<SlotStatus>> {
        tokio::time::sleep(self.delay).await;
        self.inner.load(slot_id).await
    }

    async fn save(&self, status: SlotStatus) -> Result<SlotStatus> {
        self.inner.save(status).await
    }
}

/// Shared countdown of calls to let through, then calls to fail.
#[derive(Clone, Debug)]
struct FailureBudget {
    passes: Arc<AtomicUsize>,
    failures: Arc<AtomicUsize>,
}

impl FailureBudget {
    fn new(failures: usize) -> Self {
        Self {
            passes: Arc::new(AtomicUsize::new(0)),
            failures: Arc::new(AtomicUsize::new(failures)),
        }
    }

    fn after(self, passes: usize) -> Self {
        self.passes.store(passes, Ordering::SeqCst);
        self
    }

    fn remaining(&self) -> usize {
        self.failures.load(Ordering::SeqCst)
    }

    fn take_failure(&self) -> bool {
        if countdown(&self.passes) {
            return false;
        }
        countdown(&self.failures)
    }
}

fn countdown(counter: &AtomicUsize) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

/// [`BalanceStore`] whose next `n` saves fail as unavailable.
#[derive(Clone, Debug)]
pub struct FailingBalanceStore<S> {
    inner: S,
    budget: FailureBudget,
}

impl<S> FailingBalanceStore<S> {
    /// Wrap `inner`, failing the next `failures` saves.
    #[must_use]
    pub fn new(inner: S, failures: usize) -> Self {
        Self {
            inner,
            budget: FailureBudget::new(failures),
        }
    }

    /// Let the first `passes` saves through before the failures start.
    #[must_use]
    pub fn after(self, passes: usize) -> Self {
        Self {
            budget: self.budget.after(passes),
            ..self
        }
    }

    /// Saves that will still fail.
    #[must_use]
    pub fn remaining_failures(&self) -> usize {
        self.budget.remaining()
    }
}

#[async_trait]
impl<S: BalanceStore> BalanceStore for FailingBalanceStore<S> {
    async fn load(&self, user_id: UserId) -> Result<Option<Account>> {
        self.inner.load(user_id).await
    }

    async fn save(&self, user_id: UserId, balance: i64) -> Result<Account> {
        if self.budget.take_failure() {
            return Err(StoreError::Unavailable(format!(
                "injected failure saving account {user_id}"
            )));
        }
        self.inner.save(user_id, balance).await
    }
}

/// [`HistoryStore`] whose next `n` appends fail as unavailable.
#[derive(Clone, Debug)]
pub struct FailingHistoryStore<S> {
    inner: S,
    budget: FailureBudget,
}

impl<S> FailingHistoryStore<S> {
    /// Wrap `inner`, failing the next `failures` appends.
    #[must_use]
    pub fn new(inner: S, failures: usize) -> Self {
        Self {
            inner,
            budget: FailureBudget::new(failures),
        }
    }

    /// Appends that will still fail.
    #[must_use]
    pub fn remaining_failures(&self) -> usize {
        self.budget.remaining()
    }
}

#[async_trait]
impl<S: HistoryStore> HistoryStore for FailingHistoryStore<S> {
    async fn append(
        &self,
        user_id: UserId,
        amount: i64,
        kind: TransactionKind,
        recorded_at: DateTime<Utc>,
    ) -> Result<LedgerEntry> {
        if self.budget.take_failure() {
            return Err(StoreError::Unavailable(format!(
                "injected failure appending history of account {user_id}"
            )));
        }
        self.inner.append(user_id, amount, kind, recorded_at).await
    }

    async fn list_by_user(&self, user_id: UserId) -> Result<Vec<LedgerEntry>> {
        self.inner.list_by_user(user_id).await
    }
}

/// [`ReservationStore`] whose next `n` inserts fail as unavailable.
#[derive(Clone, Debug)]
pub struct FailingReservationStore<S> {
    inner: S,
    budget: FailureBudget,
}

impl<S> FailingReservationStore<S> {
    /// Wrap `inner`, failing the next `failures` inserts.
    #[must_use]
    pub fn new(inner: S, failures: usize) -> Self {
        Self {
            inner,
            budget: FailureBudget::new(failures),
        }
    }

    /// Inserts that will still fail.
    #[must_use]
    pub fn remaining_failures(&self) -> usize {
        self.budget.remaining()
    }
}

#[async_trait]
impl<S: ReservationStore> ReservationStore for FailingReservationStore<S> {
    async fn exists(&self, holder: UserId, slot_id: SlotId) -> Result<bool> {
        self.inner.exists(holder, slot_id).await
    }

    async fn insert(&self, reservation: Reservation) -> Result<Reservation> {
        if self.budget.take_failure() {
            return Err(StoreError::Unavailable(format!(
                "injected failure inserting reservation for slot {}",
                reservation.slot_id
            )));
        }
        self.inner.insert(reservation).await
    }

    async fn list_by_holder(&self, holder: UserId) -> Result<Vec<Reservation>> {
        self.inner.list_by_holder(holder).await
    }
}
