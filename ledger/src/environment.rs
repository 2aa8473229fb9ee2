//! Collaborators of the ledger.

use keyguard_core::environment::Clock;
use keyguard_core::store::{BalanceStore, HistoryStore};
use std::sync::Arc;

/// Environment dependencies for [`BalanceLedger`](crate::BalanceLedger)
#[derive(Clone)]
pub struct LedgerEnvironment {
    /// Clock for history timestamps
    pub clock: Arc<dyn Clock>,
    /// Current balances
    pub balances: Arc<dyn BalanceStore>,
    /// Append-only mutation history
    pub history: Arc<dyn HistoryStore>,
}

impl LedgerEnvironment {
    /// Creates a new `LedgerEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        balances: Arc<dyn BalanceStore>,
        history: Arc<dyn HistoryStore>,
    ) -> Self {
        Self {
            clock,
            balances,
            history,
        }
    }
}

impl std::fmt::Debug for LedgerEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerEnvironment").finish_non_exhaustive()
    }
}
