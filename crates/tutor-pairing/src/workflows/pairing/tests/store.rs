use chrono::Duration;

use super::common::*;
use crate::workflows::pairing::domain::{Pairing, PairingTier, TutorId};
use crate::workflows::pairing::memory::InMemoryPairingStore;
use crate::workflows::pairing::repository::{
    PairingStore, RepositoryError, StoreWrite, WriteBatch,
};

fn offer(tutor_id: &str) -> Pairing {
    Pairing::offer(
        student("stu-1"),
        TutorId::from(tutor_id),
        course(),
        at(3, 9),
        Duration::hours(48),
        1,
    )
    .expect("window fits")
}

#[test]
fn stale_version_is_rejected() {
    let store = InMemoryPairingStore::new();
    let pairing = offer("tut-x");
    store
        .commit(WriteBatch::new().with(StoreWrite::PutPairing(pairing.clone())))
        .expect("insert");

    let err = store
        .commit(WriteBatch::new().with(StoreWrite::PutPairing(pairing.clone())))
        .unwrap_err();

    assert_eq!(err, RepositoryError::Conflict);
    assert_eq!(stored_pairing(&store, &pairing.id).version, 1);
}

#[test]
fn failed_batch_leaves_no_partial_writes() {
    let store = InMemoryPairingStore::new();
    store
        .seed_tutor(tutor("tut-x", 1, PairingTier::One, 1))
        .expect("seed");
    let pairing = offer("tut-x");

    let err = store
        .commit(
            WriteBatch::new()
                .with(StoreWrite::PutPairing(pairing.clone()))
                .with(StoreWrite::IncrementStudents {
                    tutor_id: TutorId::from("tut-x"),
                }),
        )
        .unwrap_err();

    assert!(matches!(err, RepositoryError::CapacityExhausted { .. }));
    assert!(store.pairing(&pairing.id).expect("reachable").is_none());
    assert_eq!(stored_tutor(&store, "tut-x").current_student_count, 1);
}

#[test]
fn counters_bump_tutor_version() {
    let store = InMemoryPairingStore::new();
    store
        .seed_tutor(tutor("tut-x", 1, PairingTier::Two, 0))
        .expect("seed");
    let tutor_id = TutorId::from("tut-x");

    store
        .commit(WriteBatch::new().with(StoreWrite::IncrementStudents {
            tutor_id: tutor_id.clone(),
        }))
        .expect("increment");
    let stale = stored_tutor(&store, "tut-x");
    store
        .commit(WriteBatch::new().with(StoreWrite::IncrementStudents {
            tutor_id: tutor_id.clone(),
        }))
        .expect("increment");

    let err = store
        .commit(WriteBatch::new().with(StoreWrite::PutTutor(stale)))
        .unwrap_err();
    assert_eq!(err, RepositoryError::Conflict);
    assert_eq!(stored_tutor(&store, "tut-x").current_student_count, 2);
}

#[test]
fn release_refuses_to_go_below_zero() {
    let store = InMemoryPairingStore::new();
    store
        .seed_tutor(tutor("tut-x", 1, PairingTier::One, 0))
        .expect("seed");

    let err = store
        .commit(WriteBatch::new().with(StoreWrite::ReleaseStudent {
            tutor_id: TutorId::from("tut-x"),
        }))
        .unwrap_err();

    assert!(matches!(err, RepositoryError::CounterUnderflow { .. }));
}

#[test]
fn tutor_document_over_capacity_is_refused() {
    let store = InMemoryPairingStore::new();
    store
        .seed_tutor(tutor("tut-x", 1, PairingTier::Three, 4))
        .expect("seed");
    let mut downgraded = stored_tutor(&store, "tut-x");
    downgraded.apply_tier(PairingTier::One);

    let err = store
        .commit(WriteBatch::new().with(StoreWrite::PutTutor(downgraded)))
        .unwrap_err();

    assert_eq!(
        err,
        RepositoryError::CapacityExhausted {
            tutor_id: TutorId::from("tut-x"),
            students: 4,
            limit: 1,
        }
    );
    assert_eq!(
        stored_tutor(&store, "tut-x").pairing_tier,
        PairingTier::Three
    );
}
