//! The slot reservation service.

use crate::environment::ReservationEnvironment;
use keyguard_core::ledger::UserId;
use keyguard_core::slot::{Reservation, Slot, SlotId, SlotStatus};
use keyguard_core::{NaiveDate, ReservationError, StoreError};
use keyguard_runtime::metrics::ReservationMetrics;
use keyguard_runtime::{EngineConfig, KeyedLockRegistry};

/// Admits reservations against slot capacity, one slot lock at a time.
#[derive(Clone, Debug)]
pub struct SlotReservation {
    env: ReservationEnvironment,
    locks: KeyedLockRegistry<SlotId>,
}

impl SlotReservation {
    /// Create a service with its own slot lock registry.
    #[must_use]
    pub fn new(env: ReservationEnvironment, config: &EngineConfig) -> Self {
        Self::with_locks(env, KeyedLockRegistry::from_config(config))
    }

    /// Create a service over an existing slot lock registry.
    #[must_use]
    pub const fn with_locks(env: ReservationEnvironment, locks: KeyedLockRegistry<SlotId>) -> Self {
        Self { env, locks }
    }

    /// The slot lock registry.
    #[must_use]
    pub const fn locks(&self) -> &KeyedLockRegistry<SlotId> {
        &self.locks
    }

    /// Take one seat in the slot.
    ///
    /// # Errors
    ///
    /// - [`ReservationError::SlotNotFound`] if the slot or its status is missing
    /// - [`ReservationError::RegistrationClosed`] if the slot is CLOSED
    /// - [`ReservationError::CapacityExceeded`] if the slot is FULL
    /// - [`ReservationError::LockTimeout`] or [`ReservationError::Store`] on infrastructure failure
    #[tracing::instrument(skip(self))]
    pub async fn reserve(&self, slot_id: SlotId) -> Result<Slot, ReservationError> {
        let env = self.env.clone();
        let result = self
            .locks
            .with_lock(slot_id, move || async move {
                let (slot, status) = load(&env, slot_id).await?;
                let next = status.admit(slot.capacity, env.clock.now())?;
                let saved = env.statuses.save(next).await?;
                Ok::<_, ReservationError>((slot, saved))
            })
            .await;

        record(slot_id, None, &result);
        result.map(|(slot, _)| slot)
    }

    /// Take one seat in the slot on behalf of `holder` and record it.
    ///
    /// A holder can hold at most one reservation per slot. The check runs
    /// under the slot lock, so concurrent enrollments of the same holder
    /// cannot both pass it.
    ///
    /// # Errors
    ///
    /// In precedence order:
    /// - [`ReservationError::SlotNotFound`]
    /// - [`ReservationError::DuplicateReservation`]
    /// - [`ReservationError::RegistrationClosed`]
    /// - [`ReservationError::CapacityExceeded`]
    ///
    /// plus [`ReservationError::LockTimeout`] or [`ReservationError::Store`]
    /// on infrastructure failure.
    #[tracing::instrument(skip(self))]
    pub async fn enroll(
        &self,
        holder: UserId,
        slot_id: SlotId,
    ) -> Result<Reservation, ReservationError> {
        let env = self.env.clone();
        let result = self
            .locks
            .with_lock(slot_id, move || async move {
                let (slot, status) = load(&env, slot_id).await?;
                if env.reservations.exists(holder, slot_id).await? {
                    return Err(ReservationError::DuplicateReservation { holder, slot_id });
                }

                let now = env.clock.now();
                let next = status.admit(slot.capacity, now)?;
                let saved = env.statuses.save(next).await?;
                match env
                    .reservations
                    .insert(Reservation::new(holder, slot_id, now))
                    .await
                {
                    Ok(reservation) => Ok((reservation, saved)),
                    Err(cause) => Err(give_back_seat(&env, status, cause).await),
                }
            })
            .await;

        record(slot_id, Some(holder), &result);
        result.map(|(reservation, _)| reservation)
    }

    /// Close registration for the slot.
    ///
    /// Closing an already closed slot returns its status unchanged.
    ///
    /// # Errors
    ///
    /// [`ReservationError::SlotNotFound`] if the slot or its status is
    /// missing, plus lock and store failures.
    #[tracing::instrument(skip(self))]
    pub async fn close(&self, slot_id: SlotId) -> Result<SlotStatus, ReservationError> {
        let env = self.env.clone();
        let status = self
            .locks
            .with_lock(slot_id, move || async move {
                let (_, status) = load(&env, slot_id).await?;
                let closed = status.close(env.clock.now());
                if closed == status {
                    return Ok(status);
                }
                Ok::<_, ReservationError>(env.statuses.save(closed).await?)
            })
            .await?;

        tracing::info!(
            slot_id = %slot_id,
            occupants = status.occupants,
            "Closed slot registration"
        );
        Ok(status)
    }

    /// Current status of the slot. Takes no lock.
    ///
    /// # Errors
    ///
    /// [`ReservationError::SlotNotFound`] if no status exists, or
    /// [`ReservationError::Store`] if the store cannot be read.
    #[tracing::instrument(skip(self))]
    pub async fn status(&self, slot_id: SlotId) -> Result<SlotStatus, ReservationError> {
        self.env
            .statuses
            .load(slot_id)
            .await?
            .ok_or(ReservationError::SlotNotFound(slot_id))
    }

    /// Slots taking place on `date`, ordered by id. Takes no lock.
    ///
    /// # Errors
    ///
    /// [`ReservationError::Store`] if the store cannot be read.
    #[tracing::instrument(skip(self))]
    pub async fn slots_on(&self, date: NaiveDate) -> Result<Vec<Slot>, ReservationError> {
        let mut slots = self.env.slots.list_by_date(date).await?;
        slots.sort_by_key(|slot| slot.id);
        Ok(slots)
    }

    /// Reservations of `holder` in creation order. Takes no lock.
    ///
    /// # Errors
    ///
    /// [`ReservationError::Store`] if the store cannot be read.
    #[tracing::instrument(skip(self))]
    pub async fn reservations_of(
        &self,
        holder: UserId,
    ) -> Result<Vec<Reservation>, ReservationError> {
        Ok(self.env.reservations.list_by_holder(holder).await?)
    }
}

/// Slot definition and current status, both required.
async fn load(
    env: &ReservationEnvironment,
    slot_id: SlotId,
) -> Result<(Slot, SlotStatus), ReservationError> {
    let slot = env
        .slots
        .load(slot_id)
        .await?
        .ok_or(ReservationError::SlotNotFound(slot_id))?;
    let status = env
        .statuses
        .load(slot_id)
        .await?
        .ok_or(ReservationError::SlotNotFound(slot_id))?;
    Ok((slot, status))
}

/// Save `previous` again after the reservation behind a taken seat could
/// not be inserted.
///
/// If that save fails too, the slot counts an occupant nobody holds and the
/// error is reported as corruption, which is not retried.
async fn give_back_seat(
    env: &ReservationEnvironment,
    previous: SlotStatus,
    cause: StoreError,
) -> ReservationError {
    let slot_id = previous.slot_id;
    let occupants = previous.occupants;
    match env.statuses.save(previous).await {
        Ok(_) => {
            tracing::warn!(
                slot_id = %slot_id,
                occupants,
                error = %cause,
                "Reservation insert failed, released the seat"
            );
            ReservationError::Store(cause)
        }
        Err(restore) => {
            tracing::error!(
                slot_id = %slot_id,
                occupants,
                error = %cause,
                restore_error = %restore,
                "Reservation insert and seat release both failed"
            );
            ReservationError::Store(StoreError::Corrupted(format!(
                "slot {slot_id} counts a seat without a reservation \
                 (insert: {cause}; restore: {restore})"
            )))
        }
    }
}

fn record<T>(
    slot_id: SlotId,
    holder: Option<UserId>,
    result: &Result<(T, SlotStatus), ReservationError>,
) {
    match result {
        Ok((_, status)) => {
            ReservationMetrics::record_attempt("ok");
            tracing::info!(
                slot_id = %slot_id,
                holder = holder.as_ref().map(UserId::value),
                occupants = status.occupants,
                state = %status.state,
                "Admitted reservation"
            );
        }
        Err(err) => {
            ReservationMetrics::record_attempt(err.code());
            tracing::debug!(
                slot_id = %slot_id,
                holder = holder.as_ref().map(UserId::value),
                code = err.code(),
                error = %err,
                "Rejected reservation"
            );
        }
    }
}
