//! Keyed mutual exclusion.
//!
//! [`KeyedLockRegistry`] serializes every operation sharing a key while
//! letting unrelated keys run in parallel. Locks are created lazily on first
//! use and dropped from the registry once nobody holds or waits on them, so
//! memory stays proportional to the number of keys in flight rather than the
//! number of keys ever seen.
//!
//! # Acquisition policy
//!
//! Acquisition is bounded: a caller that cannot obtain the lock within the
//! configured timeout gets [`LockError::Timeout`] without having run
//! anything. Fairness is whatever `tokio::sync::Mutex` provides (FIFO).
//!
//! # Critical sections
//!
//! Once acquired, the operation runs on its own task that owns the guard.
//! Dropping the caller's future after that point does not interrupt the
//! critical section; it runs to completion and releases the lock. A panic
//! inside the operation releases the lock and is resumed in the caller.
//!
//! # Cleanup
//!
//! Every registry entry is an `Arc<Mutex<()>>`. Acquirers clone the `Arc`
//! under the map's shard lock, and release removes the entry with a single
//! `remove_if` that checks the map holds the only reference. Lookup-or-create
//! and compare-and-remove therefore never interleave, and an acquirer can
//! never be handed a lock that is being discarded.

use crate::config::EngineConfig;
use crate::metrics::LockMetrics;
use dashmap::DashMap;
use keyguard_core::LockError;
use std::fmt::Display;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Registry of per-key locks.
///
/// Cloning is cheap and clones share the same locks. Create one registry per
/// resource family (accounts, slots) and inject it into the services that
/// mutate that family; tests create their own for isolation.
pub struct KeyedLockRegistry<K> {
    locks: Arc<DashMap<K, Arc<Mutex<()>>>>,
    timeout: Duration,
}

impl<K> Clone for KeyedLockRegistry<K> {
    fn clone(&self) -> Self {
        Self {
            locks: Arc::clone(&self.locks),
            timeout: self.timeout,
        }
    }
}

impl<K: Eq + Hash> std::fmt::Debug for KeyedLockRegistry<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyedLockRegistry")
            .field("entries", &self.locks.len())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl<K> KeyedLockRegistry<K>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
{
    /// Create an empty registry whose acquisitions give up after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            locks: Arc::new(DashMap::new()),
            timeout,
        }
    }

    /// Create an empty registry using the configured lock timeout.
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.lock_timeout)
    }

    /// The acquisition timeout.
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Number of keys that currently have a lock entry.
    #[must_use]
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    /// Whether no key currently has a lock entry.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    /// Whether `key` currently has a lock entry (held or awaited).
    #[must_use]
    pub fn contains(&self, key: &K) -> bool {
        self.locks.contains_key(key)
    }

    /// Run `operation` with exclusive access to `key`.
    ///
    /// Waits up to the registry timeout for the lock, runs the operation to
    /// completion while holding it, and releases it on every exit path.
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns the operation's own error, or [`LockError::Timeout`] (converted
    /// into `E`) if the lock was not acquired in time. A timed-out call has
    /// not run the operation.
    ///
    /// # Panics
    ///
    /// Resumes any panic raised by the operation, after the lock is released.
    pub async fn with_lock<F, Fut, T, E>(&self, key: K, operation: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send + 'static,
        E: From<LockError> + Send + 'static,
    {
        let held = self.acquire(&key).await?;
        let critical_section = operation();

        let handle = tokio::spawn(async move {
            let result = critical_section.await;
            drop(held);
            result
        });

        match handle.await {
            Ok(result) => result,
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            Err(_) => Err(E::from(LockError::Aborted {
                key: key.to_string(),
            })),
        }
    }

    async fn acquire(&self, key: &K) -> Result<HeldLock<K>, LockError> {
        let lock = Arc::clone(
            self.locks
                .entry(key.clone())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .value(),
        );
        LockMetrics::record_entries(self.locks.len());

        tracing::trace!(key = %key, "Attempting to acquire key lock");
        let started = Instant::now();
        let acquired = tokio::time::timeout(self.timeout, lock.lock_owned()).await;
        let waited = started.elapsed();

        match acquired {
            Ok(guard) => {
                LockMetrics::record_acquired(waited);
                tracing::trace!(
                    key = %key,
                    waited_ms = waited.as_millis(),
                    "Acquired key lock"
                );
                Ok(HeldLock {
                    guard: Some(guard),
                    registry: self.clone(),
                    key: key.clone(),
                })
            }
            Err(_) => {
                LockMetrics::record_timeout();
                tracing::warn!(
                    key = %key,
                    timeout_ms = self.timeout.as_millis(),
                    "Timed out waiting for key lock"
                );
                self.remove_if_unused(key);
                Err(LockError::Timeout {
                    key: key.to_string(),
                    timeout: self.timeout,
                })
            }
        }
    }

    /// Drop the entry for `key` if the map holds the only reference to it.
    fn remove_if_unused(&self, key: &K) {
        let removed = self
            .locks
            .remove_if(key, |_, lock| Arc::strong_count(lock) == 1);
        if removed.is_some() {
            tracing::trace!(key = %key, "Removed unused key lock");
        }
        LockMetrics::record_entries(self.locks.len());
    }
}

/// An acquired key lock. Releases and cleans up on drop.
struct HeldLock<K>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
{
    guard: Option<OwnedMutexGuard<()>>,
    registry: KeyedLockRegistry<K>,
    key: K,
}

impl<K> Drop for HeldLock<K>
where
    K: Eq + Hash + Clone + Display + Send + Sync + 'static,
{
    fn drop(&mut self) {
        // The guard owns a reference to the entry; it must go first or the
        // cleanup below always sees the lock as in use.
        drop(self.guard.take());
        tracing::trace!(key = %self.key, "Released key lock");
        self.registry.remove_if_unused(&self.key);
    }
}
