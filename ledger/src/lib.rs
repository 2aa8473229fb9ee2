//! # Keyguard Ledger
//!
//! Point balances with serialized CHARGE and USE mutations.
//!
//! Every mutation of one account runs under that account's key lock, so the
//! Nth call on an account always sees the (N-1)th call's result. Calls on
//! different accounts never wait on each other.
//!
//! Validation happens in a fixed order, which decides the error when several
//! rules are broken at once:
//!
//! 1. amount must be positive ([`LedgerError::InvalidAmount`])
//! 2. user id must be positive ([`LedgerError::AccountNotFound`])
//! 3. the balance rule for the operation ([`LedgerError::LimitExceeded`] or
//!    [`LedgerError::InsufficientFunds`])
//!
//! A rejected call writes nothing.
//!
//! ## Example
//!
//! ```
//! use std::sync::Arc;
//! use keyguard_core::ledger::UserId;
//! use keyguard_ledger::{BalanceLedger, LedgerEnvironment};
//! use keyguard_runtime::EngineConfig;
//! use keyguard_testing::{InMemoryBalanceStore, InMemoryHistoryStore, test_clock};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), keyguard_core::LedgerError> {
//! let env = LedgerEnvironment::new(
//!     Arc::new(test_clock()),
//!     Arc::new(InMemoryBalanceStore::new()),
//!     Arc::new(InMemoryHistoryStore::new()),
//! );
//! let ledger = BalanceLedger::new(env, &EngineConfig::default());
//!
//! ledger.charge(UserId::new(1), 500).await?;
//! let account = ledger.use_points(UserId::new(1), 200).await?;
//! assert_eq!(account.balance, 300);
//! # Ok(())
//! # }
//! ```

pub use keyguard_core::LedgerError;

pub mod environment;
pub mod service;

pub use environment::LedgerEnvironment;
pub use service::BalanceLedger;
