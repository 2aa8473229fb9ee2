//! Capacity correctness of `reserve` under contention.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)] // Test code can use unwrap/expect

use futures::future::join_all;
use keyguard_core::NaiveDate;
use keyguard_core::ReservationError;
use keyguard_core::environment::Clock;
use keyguard_core::slot::{Capacity, Slot, SlotId, SlotState, SlotStatus};
use keyguard_reservation::{ReservationEnvironment, SlotReservation};
use keyguard_runtime::{EngineConfig, KeyedLockRegistry};
use keyguard_testing::{
    InMemoryReservationStore, InMemorySlotStatusStore, InMemorySlotStore, SlowSlotStatusStore,
    init_test_tracing, test_clock,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Fixture {
    service: SlotReservation,
    slots: InMemorySlotStore,
    statuses: InMemorySlotStatusStore,
}

fn fixture() -> Fixture {
    init_test_tracing();
    let slots = InMemorySlotStore::new();
    let statuses = InMemorySlotStatusStore::new();
    let env = ReservationEnvironment::new(
        Arc::new(test_clock()),
        Arc::new(slots.clone()),
        Arc::new(statuses.clone()),
        Arc::new(InMemoryReservationStore::new()),
    );
    Fixture {
        service: SlotReservation::new(env, &EngineConfig::default()),
        slots,
        statuses,
    }
}

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 1).unwrap()
}

fn open_slot(
    slots: &InMemorySlotStore,
    statuses: &InMemorySlotStatusStore,
    id: i64,
    capacity: u32,
) {
    let at = test_clock().now();
    slots.insert(Slot::new(
        SlotId::new(id),
        format!("Course {id}"),
        day(),
        Capacity::new(capacity).unwrap(),
        at,
    ));
    statuses.seed(SlotStatus::open(SlotId::new(id), at));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn forty_callers_race_for_thirty_seats() {
    let f = fixture();
    let slot_id = SlotId::new(1);
    open_slot(&f.slots, &f.statuses, 1, 30);

    let tasks = (0..40).map(|_| {
        let service = f.service.clone();
        tokio::spawn(async move { service.reserve(slot_id).await })
    });

    let mut admitted = 0;
    let mut rejected = 0;
    for result in join_all(tasks).await {
        match result.unwrap() {
            Ok(slot) => {
                assert_eq!(slot.id, slot_id);
                admitted += 1;
            }
            Err(ReservationError::CapacityExceeded { slot_id: id, capacity }) => {
                assert_eq!(id, slot_id);
                assert_eq!(capacity, Capacity::new(30).unwrap());
                rejected += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }

    assert_eq!(admitted, 30);
    assert_eq!(rejected, 10);

    let status = f.service.status(slot_id).await.unwrap();
    assert_eq!(status.occupants, 30);
    assert_eq!(status.state, SlotState::Full);
    assert!(f.service.locks().is_empty());
}

#[tokio::test]
async fn last_seat_flips_the_slot_to_full() {
    let f = fixture();
    let slot_id = SlotId::new(2);
    open_slot(&f.slots, &f.statuses, 2, 2);

    f.service.reserve(slot_id).await.unwrap();
    assert_eq!(f.service.status(slot_id).await.unwrap().state, SlotState::Open);

    f.service.reserve(slot_id).await.unwrap();
    let status = f.service.status(slot_id).await.unwrap();
    assert_eq!((status.state, status.occupants), (SlotState::Full, 2));
}

#[tokio::test]
async fn rejections_do_not_touch_the_status() {
    let f = fixture();
    let slot_id = SlotId::new(3);
    open_slot(&f.slots, &f.statuses, 3, 1);

    f.service.reserve(slot_id).await.unwrap();
    let saves = f.statuses.saves();
    let before = f.statuses.get(slot_id).unwrap();

    let err = f.service.reserve(slot_id).await.unwrap_err();
    assert_eq!(err.code(), "CAPACITY_EXCEEDED");
    assert_eq!(f.statuses.saves(), saves);
    assert_eq!(f.statuses.get(slot_id).unwrap(), before);
}

#[tokio::test]
async fn closed_slots_reject_new_reservations() {
    let f = fixture();
    let slot_id = SlotId::new(4);
    open_slot(&f.slots, &f.statuses, 4, 10);
    f.service.reserve(slot_id).await.unwrap();

    let closed = f.service.close(slot_id).await.unwrap();
    assert_eq!(closed.state, SlotState::Closed);
    assert_eq!(closed.occupants, 1);

    assert_eq!(
        f.service.reserve(slot_id).await,
        Err(ReservationError::RegistrationClosed(slot_id))
    );
    assert_eq!(f.service.status(slot_id).await.unwrap().occupants, 1);
}

#[tokio::test]
async fn closing_twice_is_a_no_op() {
    let f = fixture();
    let slot_id = SlotId::new(5);
    open_slot(&f.slots, &f.statuses, 5, 1);
    f.service.reserve(slot_id).await.unwrap();

    // FULL slots can be closed too.
    let first = f.service.close(slot_id).await.unwrap();
    let saves = f.statuses.saves();
    let second = f.service.close(slot_id).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(f.statuses.saves(), saves);
}

#[tokio::test]
async fn unknown_slots_are_not_found() {
    let f = fixture();

    // A definition without a status is as missing as no definition.
    let at = test_clock().now();
    f.slots.insert(Slot::new(
        SlotId::new(6),
        "Orphan".to_string(),
        day(),
        Capacity::new(5).unwrap(),
        at,
    ));

    for id in [6, 99] {
        let slot_id = SlotId::new(id);
        assert_eq!(
            f.service.reserve(slot_id).await,
            Err(ReservationError::SlotNotFound(slot_id))
        );
        assert_eq!(
            f.service.close(slot_id).await,
            Err(ReservationError::SlotNotFound(slot_id))
        );
    }
    assert!(matches!(
        f.service.status(SlotId::new(99)).await,
        Err(ReservationError::SlotNotFound(_))
    ));
}

#[tokio::test]
async fn listings_group_by_date_in_id_order() {
    let f = fixture();
    open_slot(&f.slots, &f.statuses, 12, 5);
    open_slot(&f.slots, &f.statuses, 10, 5);
    f.slots.insert(Slot::new(
        SlotId::new(11),
        "Elsewhere".to_string(),
        day().succ_opt().unwrap(),
        Capacity::new(5).unwrap(),
        test_clock().now(),
    ));

    let ids: Vec<_> = f
        .service
        .slots_on(day())
        .await
        .unwrap()
        .iter()
        .map(|slot| slot.id.value())
        .collect();
    assert_eq!(ids, vec![10, 12]);
    assert!(
        f.service
            .slots_on(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap())
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn slots_are_locked_independently() {
    init_test_tracing();
    let slots = InMemorySlotStore::new();
    let statuses = InMemorySlotStatusStore::new();
    open_slot(&slots, &statuses, 1, 10);
    open_slot(&slots, &statuses, 2, 10);

    let env = ReservationEnvironment::new(
        Arc::new(test_clock()),
        Arc::new(slots),
        Arc::new(SlowSlotStatusStore::new(statuses, Duration::from_millis(200))),
        Arc::new(InMemoryReservationStore::new()),
    );
    let service = SlotReservation::new(env, &EngineConfig::default());

    let started = Instant::now();
    let busy: Vec<_> = (0..3)
        .map(|_| {
            let service = service.clone();
            tokio::spawn(async move { service.reserve(SlotId::new(1)).await })
        })
        .collect();
    tokio::time::sleep(Duration::from_millis(20)).await;

    service.reserve(SlotId::new(2)).await.unwrap();
    let other_done = started.elapsed();

    for call in join_all(busy).await {
        call.unwrap().unwrap();
    }
    assert!(other_done < Duration::from_millis(400), "{other_done:?}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn lock_timeout_leaves_occupancy_untouched() {
    init_test_tracing();
    let slots = InMemorySlotStore::new();
    let statuses = InMemorySlotStatusStore::new();
    open_slot(&slots, &statuses, 1, 10);

    let env = ReservationEnvironment::new(
        Arc::new(test_clock()),
        Arc::new(slots),
        Arc::new(SlowSlotStatusStore::new(statuses.clone(), Duration::from_millis(300))),
        Arc::new(InMemoryReservationStore::new()),
    );
    let service =
        SlotReservation::with_locks(env, KeyedLockRegistry::new(Duration::from_millis(40)));

    let holder = {
        let service = service.clone();
        tokio::spawn(async move { service.reserve(SlotId::new(1)).await })
    };
    tokio::time::sleep(Duration::from_millis(20)).await;

    let err = service.reserve(SlotId::new(1)).await.unwrap_err();
    assert_eq!(err.code(), "LOCK_TIMEOUT");

    holder.await.unwrap().unwrap();
    assert_eq!(statuses.get(SlotId::new(1)).unwrap().occupants, 1);
}
