//! # Keyguard Reservation
//!
//! Bounded-capacity admission to course slots.
//!
//! Each slot admits at most `capacity` occupants. All writes to one slot run
//! under that slot's key lock, so when more callers race than there are
//! seats, exactly `capacity` of them win and the rest get
//! [`ReservationError::CapacityExceeded`].
//!
//! Slot status moves through a small state machine:
//!
//! ```text
//! OPEN --(occupants reach capacity)--> FULL
//! OPEN | FULL --(close)--> CLOSED
//! ```
//!
//! CLOSED is terminal and occupancy never decreases.
//!
//! [`SlotReservation::reserve`] is the bare capacity check.
//! [`SlotReservation::enroll`] adds the per-holder uniqueness check and
//! records a [`Reservation`](keyguard_core::slot::Reservation), all inside
//! the same lock.

pub use keyguard_core::ReservationError;

pub mod environment;
pub mod service;

pub use environment::ReservationEnvironment;
pub use service::SlotReservation;
