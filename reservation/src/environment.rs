//! Collaborators of the reservation service.

use keyguard_core::environment::Clock;
use keyguard_core::store::{ReservationStore, SlotStatusStore, SlotStore};
use std::sync::Arc;

/// Environment dependencies for [`SlotReservation`](crate::SlotReservation)
#[derive(Clone)]
pub struct ReservationEnvironment {
    /// Clock for status and reservation timestamps
    pub clock: Arc<dyn Clock>,
    /// Slot definitions
    pub slots: Arc<dyn SlotStore>,
    /// Occupancy per slot
    pub statuses: Arc<dyn SlotStatusStore>,
    /// Reservations made through enrollment
    pub reservations: Arc<dyn ReservationStore>,
}

impl ReservationEnvironment {
    /// Creates a new `ReservationEnvironment`
    #[must_use]
    pub fn new(
        clock: Arc<dyn Clock>,
        slots: Arc<dyn SlotStore>,
        statuses: Arc<dyn SlotStatusStore>,
        reservations: Arc<dyn ReservationStore>,
    ) -> Self {
        Self {
            clock,
            slots,
            statuses,
            reservations,
        }
    }
}

impl std::fmt::Debug for ReservationEnvironment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReservationEnvironment").finish_non_exhaustive()
    }
}
