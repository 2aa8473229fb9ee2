//! Engine configuration.
//!
//! Two knobs: the ledger's balance ceiling and how long a caller waits for a
//! key lock before giving up.
//!
//! # Example
//!
//! ```rust
//! use keyguard_runtime::config::EngineConfig;
//! use std::time::Duration;
//!
//! let config = EngineConfig::builder()
//!     .max_balance(500_000)
//!     .lock_timeout(Duration::from_secs(2))
//!     .build();
//!
//! assert!(config.validate().is_ok());
//! ```

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Environment variable holding the balance ceiling.
pub const MAX_BALANCE_ENV: &str = "KEYGUARD_MAX_BALANCE";

/// Environment variable holding the lock timeout in milliseconds.
pub const LOCK_TIMEOUT_ENV: &str = "KEYGUARD_LOCK_TIMEOUT_MS";

const DEFAULT_MAX_BALANCE: i64 = 1_000_000;
const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from loading or validating configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set but could not be parsed.
    #[error("Invalid value for {name}: {value:?}")]
    Parse {
        /// Variable name
        name: &'static str,
        /// Raw value
        value: String,
    },

    /// The balance ceiling must be positive.
    #[error("max_balance must be greater than zero, got {0}")]
    NonPositiveMaxBalance(i64),

    /// A zero lock timeout would reject every contended call.
    #[error("lock_timeout must be greater than zero")]
    ZeroLockTimeout,
}

/// Tunable parameters shared by the ledger and reservation services.
///
/// # Default Values
///
/// - `max_balance`: 1,000,000
/// - `lock_timeout`: 10 seconds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Highest balance a CHARGE may produce
    pub max_balance: i64,
    /// Longest a caller waits for a key lock
    pub lock_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_balance: DEFAULT_MAX_BALANCE,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }
}

impl EngineConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub const fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder {
            max_balance: None,
            lock_timeout: None,
        }
    }

    /// Load configuration from the process environment.
    ///
    /// Unset variables fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a variable is set to something unparsable
    /// or the result fails [`validate`](Self::validate).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`from_env`](Self::from_env).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut builder = Self::builder();

        if let Some(raw) = lookup(MAX_BALANCE_ENV) {
            let value = raw.trim().parse::<i64>().map_err(|_| ConfigError::Parse {
                name: MAX_BALANCE_ENV,
                value: raw.clone(),
            })?;
            builder = builder.max_balance(value);
        }

        if let Some(raw) = lookup(LOCK_TIMEOUT_ENV) {
            let millis = raw.trim().parse::<u64>().map_err(|_| ConfigError::Parse {
                name: LOCK_TIMEOUT_ENV,
                value: raw.clone(),
            })?;
            builder = builder.lock_timeout(Duration::from_millis(millis));
        }

        let config = builder.build();
        config.validate()?;
        tracing::debug!(
            max_balance = config.max_balance,
            lock_timeout_ms = config.lock_timeout.as_millis(),
            "Loaded engine configuration"
        );
        Ok(config)
    }

    /// Check the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] for a non-positive ceiling or a zero timeout.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.max_balance <= 0 {
            return Err(ConfigError::NonPositiveMaxBalance(self.max_balance));
        }
        if self.lock_timeout.is_zero() {
            return Err(ConfigError::ZeroLockTimeout);
        }
        Ok(())
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone)]
pub struct EngineConfigBuilder {
    max_balance: Option<i64>,
    lock_timeout: Option<Duration>,
}

impl EngineConfigBuilder {
    /// Set the balance ceiling.
    #[must_use]
    pub const fn max_balance(mut self, max_balance: i64) -> Self {
        self.max_balance = Some(max_balance);
        self
    }

    /// Set the lock acquisition timeout.
    #[must_use]
    pub const fn lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = Some(timeout);
        self
    }

    /// Build the configuration.
    ///
    /// Does not validate; call [`EngineConfig::validate`] on the result.
    #[must_use]
    pub fn build(self) -> EngineConfig {
        EngineConfig {
            max_balance: self.max_balance.unwrap_or(DEFAULT_MAX_BALANCE),
            lock_timeout: self.lock_timeout.unwrap_or(DEFAULT_LOCK_TIMEOUT),
        }
    }
}
