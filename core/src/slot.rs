//! Domain types for Capacity Reservation.
//!
//! A [`Slot`] is one capacity-bounded session of a course on a given date.
//! Its mutable side lives in [`SlotStatus`], a small state machine:
//!
//! ```text
//!   OPEN ──(occupants reaches capacity)──► FULL
//!     │                                     │
//!     └──────(administrative close)──────┬──┘
//!                                        ▼
//!                                     CLOSED (terminal)
//! ```
//!
//! Occupancy only ever grows; nothing in this crate decrements it.

use crate::error::ReservationError;
use crate::ledger::UserId;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use uuid::Uuid;

/// Identifier of a slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SlotId(i64);

impl SlotId {
    /// Creates a `SlotId` from a raw integer
    #[must_use]
    pub const fn new(id: i64) -> Self {
        Self(id)
    }

    /// Returns the raw integer
    #[must_use]
    pub const fn value(&self) -> i64 {
        self.0
    }
}

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Maximum number of reservations a slot accepts. Always at least one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Capacity(NonZeroU32);

impl Capacity {
    /// Creates a new `Capacity`, or `None` for zero
    #[must_use]
    pub const fn new(value: u32) -> Option<Self> {
        match NonZeroU32::new(value) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Returns the capacity value
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0.get()
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One session of a course. Immutable after creation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    /// Slot identifier
    pub id: SlotId,
    /// Course title
    pub course: String,
    /// Date the session takes place (grouping key for listings)
    pub date: NaiveDate,
    /// Maximum number of occupants
    pub capacity: Capacity,
    /// When the slot was created
    pub created_at: DateTime<Utc>,
}

impl Slot {
    /// Creates a new slot
    #[must_use]
    pub const fn new(
        id: SlotId,
        course: String,
        date: NaiveDate,
        capacity: Capacity,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            course,
            date,
            capacity,
            created_at,
        }
    }
}

/// Admission state of a slot
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotState {
    /// Accepting reservations
    Open,
    /// Occupants equal capacity
    Full,
    /// Registration closed by an administrator (terminal)
    Closed,
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Full => write!(f, "FULL"),
            Self::Closed => write!(f, "CLOSED"),
        }
    }
}

/// Mutable occupancy of a slot (1:1 with [`Slot`]).
///
/// Transitions are pure: [`admit`](Self::admit) and [`close`](Self::close)
/// return the next status and leave `self` untouched, so a rejected request
/// never has anything to roll back.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotStatus {
    /// Slot this status belongs to
    pub slot_id: SlotId,
    /// Admission state
    pub state: SlotState,
    /// Current number of admitted reservations, within `[0, capacity]`
    pub occupants: u32,
    /// When the status last changed
    pub updated_at: DateTime<Utc>,
}

impl SlotStatus {
    /// An empty, open status for a newly created slot
    #[must_use]
    pub const fn open(slot_id: SlotId, at: DateTime<Utc>) -> Self {
        Self {
            slot_id,
            state: SlotState::Open,
            occupants: 0,
            updated_at: at,
        }
    }

    /// Seats still available under `capacity`
    #[must_use]
    pub const fn remaining(&self, capacity: Capacity) -> u32 {
        capacity.value().saturating_sub(self.occupants)
    }

    /// Admits one more occupant.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::RegistrationClosed`] if the slot is CLOSED
    /// - [`ReservationError::CapacityExceeded`] if the slot is FULL, or if
    ///   the stored occupancy already reached `capacity`
    pub fn admit(&self, capacity: Capacity, at: DateTime<Utc>) -> Result<Self, ReservationError> {
        match self.state {
            SlotState::Closed => {
                return Err(ReservationError::RegistrationClosed(self.slot_id));
            }
            SlotState::Full => {
                return Err(ReservationError::CapacityExceeded {
                    slot_id: self.slot_id,
                    capacity,
                });
            }
            SlotState::Open => {}
        }

        if self.occupants >= capacity.value() {
            return Err(ReservationError::CapacityExceeded {
                slot_id: self.slot_id,
                capacity,
            });
        }

        let occupants = self.occupants + 1;
        let state = if occupants >= capacity.value() {
            SlotState::Full
        } else {
            SlotState::Open
        };

        Ok(Self {
            slot_id: self.slot_id,
            state,
            occupants,
            updated_at: at,
        })
    }

    /// Closes registration. Closing an already closed slot is a no-op.
    #[must_use]
    pub fn close(&self, at: DateTime<Utc>) -> Self {
        if self.state == SlotState::Closed {
            return self.clone();
        }
        Self {
            state: SlotState::Closed,
            updated_at: at,
            ..self.clone()
        }
    }
}

/// Unique identifier for a reservation
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReservationId(Uuid);

impl ReservationId {
    /// Creates a new random `ReservationId`
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ReservationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ReservationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A holder's admitted seat in a slot. At most one per (holder, slot).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    /// Reservation identifier
    pub id: ReservationId,
    /// Who holds the seat
    pub holder: UserId,
    /// Slot the seat belongs to
    pub slot_id: SlotId,
    /// When the reservation was created
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    /// Creates a reservation with a fresh id
    #[must_use]
    pub fn new(holder: UserId, slot_id: SlotId, created_at: DateTime<Utc>) -> Self {
        Self {
            id: ReservationId::new(),
            holder,
            slot_id,
            created_at,
        }
    }
}
