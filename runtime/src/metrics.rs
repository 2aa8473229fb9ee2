//! Metric names and recorders.
//!
//! Everything is recorded through the `metrics` facade. With no recorder
//! installed the calls are no-ops; the host application installs whichever
//! exporter it uses and calls [`register_metrics`] once to attach
//! descriptions.
//!
//! # Metrics
//!
//! - `keyguard_lock_acquired_total`: successful key lock acquisitions
//! - `keyguard_lock_timeouts_total`: acquisitions that gave up
//! - `keyguard_lock_wait_duration_seconds`: time spent waiting for a lock
//! - `keyguard_lock_registry_entries`: live entries in the last-touched registry
//! - `keyguard_ledger_operations_total{kind, outcome}`: ledger mutations
//! - `keyguard_reservations_total{outcome}`: reserve and enroll attempts

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use std::time::Duration;

/// Successful lock acquisitions.
pub const LOCK_ACQUIRED_TOTAL: &str = "keyguard_lock_acquired_total";
/// Lock acquisitions that timed out.
pub const LOCK_TIMEOUTS_TOTAL: &str = "keyguard_lock_timeouts_total";
/// Lock wait time histogram.
pub const LOCK_WAIT_DURATION_SECONDS: &str = "keyguard_lock_wait_duration_seconds";
/// Live lock registry entries.
pub const LOCK_REGISTRY_ENTRIES: &str = "keyguard_lock_registry_entries";
/// Ledger mutations by kind and outcome.
pub const LEDGER_OPERATIONS_TOTAL: &str = "keyguard_ledger_operations_total";
/// Reservation attempts by outcome.
pub const RESERVATIONS_TOTAL: &str = "keyguard_reservations_total";

/// Register all metric descriptions with the installed recorder.
pub fn register_metrics() {
    describe_counter!(LOCK_ACQUIRED_TOTAL, "Total number of key locks acquired");
    describe_counter!(
        LOCK_TIMEOUTS_TOTAL,
        "Total number of key lock acquisitions that timed out"
    );
    describe_histogram!(
        LOCK_WAIT_DURATION_SECONDS,
        "Time spent waiting to acquire a key lock"
    );
    describe_gauge!(
        LOCK_REGISTRY_ENTRIES,
        "Number of keys with a live lock entry"
    );
    describe_counter!(
        LEDGER_OPERATIONS_TOTAL,
        "Total number of ledger mutations, labelled by kind and outcome"
    );
    describe_counter!(
        RESERVATIONS_TOTAL,
        "Total number of reservation attempts, labelled by outcome"
    );
}

/// Key lock metrics recorder.
pub struct LockMetrics;

impl LockMetrics {
    /// Record a successful acquisition after waiting `waited`.
    pub fn record_acquired(waited: Duration) {
        counter!(LOCK_ACQUIRED_TOTAL).increment(1);
        histogram!(LOCK_WAIT_DURATION_SECONDS).record(waited.as_secs_f64());
    }

    /// Record an acquisition timeout.
    pub fn record_timeout() {
        counter!(LOCK_TIMEOUTS_TOTAL).increment(1);
    }

    /// Record the current registry size.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_entries(entries: usize) {
        gauge!(LOCK_REGISTRY_ENTRIES).set(entries as f64);
    }
}

/// Ledger metrics recorder.
pub struct LedgerMetrics;

impl LedgerMetrics {
    /// Record one ledger mutation.
    ///
    /// `kind` is `"charge"` or `"use"`; `outcome` is `"ok"` or an error code.
    pub fn record_operation(kind: &'static str, outcome: &'static str) {
        counter!(LEDGER_OPERATIONS_TOTAL, "kind" => kind, "outcome" => outcome).increment(1);
    }
}

/// Reservation metrics recorder.
pub struct ReservationMetrics;

impl ReservationMetrics {
    /// Record one reserve or enroll attempt.
    pub fn record_attempt(outcome: &'static str) {
        counter!(RESERVATIONS_TOTAL, "outcome" => outcome).increment(1);
    }
}
