//! The balance ledger service.

use crate::environment::LedgerEnvironment;
use keyguard_core::ledger::{Account, LedgerEntry, TransactionKind, UserId};
use keyguard_core::{LedgerError, StoreError};
use keyguard_runtime::metrics::LedgerMetrics;
use keyguard_runtime::{EngineConfig, KeyedLockRegistry};

/// Serializes CHARGE and USE per account and keeps their history.
///
/// Cloning shares the lock registry, so clones serialize against each other.
#[derive(Clone, Debug)]
pub struct BalanceLedger {
    env: LedgerEnvironment,
    locks: KeyedLockRegistry<UserId>,
    max_balance: i64,
}

/// One validated mutation request.
#[derive(Clone, Copy, Debug)]
struct Mutation {
    user_id: UserId,
    amount: i64,
    kind: TransactionKind,
    max_balance: i64,
}

impl BalanceLedger {
    /// Create a ledger with its own lock registry.
    #[must_use]
    pub fn new(env: LedgerEnvironment, config: &EngineConfig) -> Self {
        Self::with_locks(env, KeyedLockRegistry::from_config(config), config.max_balance)
    }

    /// Create a ledger over an existing account lock registry.
    ///
    /// Every writer of the same balance store must share one registry.
    #[must_use]
    pub const fn with_locks(
        env: LedgerEnvironment,
        locks: KeyedLockRegistry<UserId>,
        max_balance: i64,
    ) -> Self {
        Self {
            env,
            locks,
            max_balance,
        }
    }

    /// The account lock registry.
    #[must_use]
    pub const fn locks(&self) -> &KeyedLockRegistry<UserId> {
        &self.locks
    }

    /// The highest balance a charge may produce.
    #[must_use]
    pub const fn max_balance(&self) -> i64 {
        self.max_balance
    }

    /// Add `amount` points to the account.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] if `amount <= 0`
    /// - [`LedgerError::AccountNotFound`] if the user id is not positive
    /// - [`LedgerError::LimitExceeded`] if the result would exceed the maximum balance
    /// - [`LedgerError::LockTimeout`] or [`LedgerError::Store`] on infrastructure failure
    #[tracing::instrument(skip(self))]
    pub async fn charge(&self, user_id: UserId, amount: i64) -> Result<Account, LedgerError> {
        self.mutate(user_id, amount, TransactionKind::Charge).await
    }

    /// Spend `amount` points from the account.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::InvalidAmount`] if `amount <= 0`
    /// - [`LedgerError::AccountNotFound`] if the user id is not positive
    /// - [`LedgerError::InsufficientFunds`] if the balance is below `amount`
    /// - [`LedgerError::LockTimeout`] or [`LedgerError::Store`] on infrastructure failure
    #[tracing::instrument(skip(self))]
    pub async fn use_points(&self, user_id: UserId, amount: i64) -> Result<Account, LedgerError> {
        self.mutate(user_id, amount, TransactionKind::Use).await
    }

    /// Current account snapshot. Takes no lock.
    ///
    /// A user the store has never seen reads as an empty account.
    ///
    /// # Errors
    ///
    /// [`LedgerError::AccountNotFound`] for a non-positive id, or
    /// [`LedgerError::Store`] if the store cannot be read.
    #[tracing::instrument(skip(self))]
    pub async fn balance(&self, user_id: UserId) -> Result<Account, LedgerError> {
        ensure_account(user_id)?;
        let account = self
            .env
            .balances
            .load(user_id)
            .await?
            .unwrap_or_else(|| Account::empty(user_id, self.env.clock.now()));
        Ok(account)
    }

    /// Every mutation of the account in the order applied. Takes no lock.
    ///
    /// # Errors
    ///
    /// [`LedgerError::AccountNotFound`] for a non-positive id, or
    /// [`LedgerError::Store`] if the store cannot be read.
    #[tracing::instrument(skip(self))]
    pub async fn history(&self, user_id: UserId) -> Result<Vec<LedgerEntry>, LedgerError> {
        ensure_account(user_id)?;
        Ok(self.env.history.list_by_user(user_id).await?)
    }

    async fn mutate(
        &self,
        user_id: UserId,
        amount: i64,
        kind: TransactionKind,
    ) -> Result<Account, LedgerError> {
        let result = self.locked_mutate(user_id, amount, kind).await;

        match &result {
            Ok(account) => {
                LedgerMetrics::record_operation(kind.as_str(), "ok");
                tracing::info!(
                    user_id = %user_id,
                    kind = %kind,
                    amount,
                    balance = account.balance,
                    "Applied ledger mutation"
                );
            }
            Err(err) => {
                LedgerMetrics::record_operation(kind.as_str(), err.code());
                tracing::warn!(
                    user_id = %user_id,
                    kind = %kind,
                    amount,
                    code = err.code(),
                    error = %err,
                    "Rejected ledger mutation"
                );
            }
        }

        result
    }

    async fn locked_mutate(
        &self,
        user_id: UserId,
        amount: i64,
        kind: TransactionKind,
    ) -> Result<Account, LedgerError> {
        // Pure checks need no lock; their precedence is fixed here.
        ensure_amount(amount)?;
        ensure_account(user_id)?;

        let mutation = Mutation {
            user_id,
            amount,
            kind,
            max_balance: self.max_balance,
        };
        let env = self.env.clone();
        self.locks
            .with_lock(user_id, move || apply(env, mutation))
            .await
    }
}

/// The critical section: read, check the balance rule, write, record.
///
/// A failed append puts the previous balance back before the lock is
/// released, so the balance never runs ahead of its history.
async fn apply(env: LedgerEnvironment, mutation: Mutation) -> Result<Account, LedgerError> {
    let Mutation {
        user_id,
        amount,
        kind,
        max_balance,
    } = mutation;

    let balance = env
        .balances
        .load(user_id)
        .await?
        .map_or(0, |account| account.balance);
    let new_balance = next_balance(balance, amount, kind, max_balance)?;

    let account = env.balances.save(user_id, new_balance).await?;
    match env
        .history
        .append(user_id, amount, kind, env.clock.now())
        .await
    {
        Ok(entry) => {
            tracing::debug!(user_id = %user_id, entry_id = entry.id, "Recorded ledger entry");
            Ok(account)
        }
        Err(cause) => Err(roll_back(&env, user_id, balance, new_balance, cause).await),
    }
}

/// Restore `balance` after its history entry could not be appended.
///
/// If the restore fails too, the stored balance has no matching entry and
/// the error is reported as corruption, which is not retried.
async fn roll_back(
    env: &LedgerEnvironment,
    user_id: UserId,
    balance: i64,
    written: i64,
    cause: StoreError,
) -> LedgerError {
    match env.balances.save(user_id, balance).await {
        Ok(_) => {
            tracing::warn!(
                user_id = %user_id,
                balance,
                error = %cause,
                "History append failed, restored previous balance"
            );
            LedgerError::Store(cause)
        }
        Err(restore) => {
            tracing::error!(
                user_id = %user_id,
                balance,
                written,
                error = %cause,
                restore_error = %restore,
                "History append and balance restore both failed"
            );
            LedgerError::Store(StoreError::Corrupted(format!(
                "account {user_id} holds {written} without a history entry \
                 (append: {cause}; restore: {restore})"
            )))
        }
    }
}

/// Balance after applying `amount` as `kind`, or the rule it breaks.
fn next_balance(
    balance: i64,
    amount: i64,
    kind: TransactionKind,
    max_balance: i64,
) -> Result<i64, LedgerError> {
    match kind {
        TransactionKind::Charge => balance
            .checked_add(amount)
            .filter(|next| *next <= max_balance)
            .ok_or(LedgerError::LimitExceeded {
                balance,
                amount,
                limit: max_balance,
            }),
        TransactionKind::Use => {
            if balance < amount {
                Err(LedgerError::InsufficientFunds {
                    balance,
                    requested: amount,
                })
            } else {
                Ok(balance - amount)
            }
        }
    }
}

const fn ensure_amount(amount: i64) -> Result<(), LedgerError> {
    if amount <= 0 {
        return Err(LedgerError::InvalidAmount { amount });
    }
    Ok(())
}

const fn ensure_account(user_id: UserId) -> Result<(), LedgerError> {
    if !user_id.is_valid() {
        return Err(LedgerError::AccountNotFound(user_id));
    }
    Ok(())
}
