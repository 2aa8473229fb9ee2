//! Random operation sequences against one slot never break its invariants.

#![allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect

use keyguard_core::NaiveDate;
use keyguard_core::ReservationError;
use keyguard_core::environment::Clock;
use keyguard_core::ledger::UserId;
use keyguard_core::slot::{Capacity, Slot, SlotId, SlotState, SlotStatus};
use keyguard_reservation::{ReservationEnvironment, SlotReservation};
use keyguard_runtime::EngineConfig;
use keyguard_testing::{
    InMemoryReservationStore, InMemorySlotStatusStore, InMemorySlotStore, test_clock,
};
use proptest::prelude::*;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Clone, Debug)]
enum Op {
    Reserve,
    Enroll(i64),
    Close,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => Just(Op::Reserve),
        4 => (1_i64..8).prop_map(Op::Enroll),
        1 => Just(Op::Close),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn occupancy_follows_the_state_machine(
        capacity in 1_u32..6,
        ops in prop::collection::vec(op(), 1..25),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let slot_id = SlotId::new(1);
            let at = test_clock().now();
            let slots = InMemorySlotStore::new();
            let statuses = InMemorySlotStatusStore::new();
            slots.insert(Slot::new(
                slot_id,
                "Property".to_string(),
                NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
                Capacity::new(capacity).unwrap(),
                at,
            ));
            statuses.seed(SlotStatus::open(slot_id, at));

            let service = SlotReservation::new(
                ReservationEnvironment::new(
                    Arc::new(test_clock()),
                    Arc::new(slots),
                    Arc::new(statuses),
                    Arc::new(InMemoryReservationStore::new()),
                ),
                &EngineConfig::default(),
            );

            let mut occupants = 0_u32;
            let mut closed = false;
            let mut holders = HashSet::new();

            for op in ops {
                match op {
                    Op::Reserve => {
                        let result = service.reserve(slot_id).await;
                        if closed {
                            prop_assert_eq!(result, Err(ReservationError::RegistrationClosed(slot_id)));
                        } else if occupants == capacity {
                            prop_assert!(matches!(result, Err(ReservationError::CapacityExceeded { .. })), "expected CapacityExceeded, got {:?}", result);
                        } else {
                            prop_assert!(result.is_ok());
                            occupants += 1;
                        }
                    }
                    Op::Enroll(id) => {
                        let holder = UserId::new(id);
                        let result = service.enroll(holder, slot_id).await;
                        if holders.contains(&id) {
                            let is_duplicate = matches!(result, Err(ReservationError::DuplicateReservation { .. }));
                            prop_assert!(is_duplicate);
                        } else if closed {
                            prop_assert_eq!(result, Err(ReservationError::RegistrationClosed(slot_id)));
                        } else if occupants == capacity {
                            prop_assert!(matches!(result, Err(ReservationError::CapacityExceeded { .. })), "expected CapacityExceeded, got {:?}", result);
                        } else {
                            prop_assert!(result.is_ok());
                            holders.insert(id);
                            occupants += 1;
                        }
                    }
                    Op::Close => {
                        let status = service.close(slot_id).await.unwrap();
                        prop_assert_eq!(status.state, SlotState::Closed);
                        closed = true;
                    }
                }

                let status = service.status(slot_id).await.unwrap();
                prop_assert_eq!(status.occupants, occupants);
                prop_assert!(status.occupants <= capacity);
                let expected = if closed {
                    SlotState::Closed
                } else if occupants == capacity {
                    SlotState::Full
                } else {
                    SlotState::Open
                };
                prop_assert_eq!(status.state, expected);
            }
            Ok(())
        })?;
    }
}
