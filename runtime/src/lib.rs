//! # Keyguard Runtime
//!
//! Execution support shared by the ledger and reservation services:
//!
//! - [`lock::KeyedLockRegistry`]: "run this with exclusive access to key K"
//! - [`config::EngineConfig`]: the engine's tunable parameters
//! - [`retry`]: caller-side backoff for transient failures
//! - [`metrics`]: metric names and recorders
//!
//! # Example
//!
//! ```no_run
//! use keyguard_core::LockError;
//! use keyguard_runtime::{EngineConfig, KeyedLockRegistry};
//!
//! # async fn example() -> Result<(), LockError> {
//! let config = EngineConfig::default();
//! let registry: KeyedLockRegistry<u64> = KeyedLockRegistry::from_config(&config);
//!
//! let doubled = registry
//!     .with_lock(7, || async { Ok::<_, LockError>(21 * 2) })
//!     .await?;
//! assert_eq!(doubled, 42);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod lock;
pub mod metrics;
pub mod retry;

pub use config::{ConfigError, EngineConfig};
pub use lock::KeyedLockRegistry;
pub use retry::{RetryPolicy, retry_with_backoff};
