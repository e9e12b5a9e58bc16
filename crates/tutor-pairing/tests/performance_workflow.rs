//! Scoring, tiering, and onboarding scenarios exercised through the public API.

use std::io::Cursor;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};

use tutor_pairing::workflows::pairing::{
    AuditAction, CourseId, Enrollment, EnrollmentStatus, InMemoryPairingStore, InterviewStatus,
    Notification, Notifier, NotifyError, PairingConfig, PairingError, PairingService,
    PairingStore, PairingTier, PaymentStatus, PerformanceMetrics, StudentId, Tutor, TutorCourse,
    TutorId, TutorStatus, UserRole,
};
use tutor_pairing::workflows::performance::{
    PerformanceRefresh, ScoringConfig, ScoringEngine, SessionCsvImporter, SessionOutcome,
    TierBasis, TierOverrideRequest, TierPolicy, TutorPerformanceService,
};

struct Silent;

impl Notifier for Silent {
    fn notify(&self, _notification: Notification) -> Result<(), NotifyError> {
        Ok(())
    }
}

fn at(day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 6, day, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

fn tutor(tier: PairingTier, current: u32) -> Tutor {
    Tutor {
        id: TutorId::from("tut-grace"),
        email: "grace@tutors.test".to_string(),
        name: "Grace Hopper".to_string(),
        role: UserRole::Tutor,
        tutor_status: TutorStatus::Active,
        onboarding_completed: true,
        pairing_tier: tier,
        max_concurrent_students: tier.max_concurrent_students(),
        current_student_count: current,
        total_students_paired: current,
        performance_score: 0.0,
        performance_metrics: PerformanceMetrics::default(),
        tier_override: None,
        created_at: at(1),
        version: 0,
    }
}

fn performance_service(
    store: Arc<InMemoryPairingStore>,
) -> TutorPerformanceService<InMemoryPairingStore, Silent> {
    TutorPerformanceService::new(store, Arc::new(Silent), ScoringConfig::default(), 3)
}

const HISTORY: &str = "\
session_id,pairing_id,tutor_id,student_id,course_id,status,scheduled_at,attended,rating,assignment_score,exam_score
s-1,pair-1,tut-grace,stu-1,physics-1,completed,2025-05-01T15:00:00Z,yes,4,85,
s-2,pair-1,tut-grace,stu-1,physics-1,completed,2025-05-08T15:00:00Z,yes,5,,75
s-3,pair-1,tut-grace,stu-1,physics-1,cancelled,2025-05-15T15:00:00Z,,,,
s-4,pair-2,tut-grace,stu-2,physics-1,completed,2025-05-16T15:00:00Z,no,3,65,
s-5,pair-2,tut-grace,stu-2,physics-1,scheduled,2025-05-23T15:00:00Z,,,,
";

#[test]
fn imported_history_scores_and_tiers() {
    let sessions = SessionCsvImporter::from_reader(Cursor::new(HISTORY)).expect("csv parses");
    assert_eq!(sessions.len(), 5);

    let score = ScoringEngine::new(ScoringConfig::default())
        .score(&TutorId::from("tut-grace"), &sessions);

    // attendance 2/3, assignments 75, exams 75, reviews 4/5
    assert_eq!(score.metrics.completed_sessions, 3);
    assert_eq!(score.metrics.graded_assignments, 2);
    assert!(score.has_minimum_data);
    assert!((score.score - 74.17).abs() < 1e-9);

    let decision = TierPolicy::default().tier_for(score.raw_score, true, PairingTier::One, None);
    assert_eq!(decision.tier, PairingTier::Two);
    assert_eq!(decision.max_concurrent_students, 3);
}

#[test]
fn tier_three_tutor_with_four_students_cannot_drop_to_tier_one() {
    let store = Arc::new(InMemoryPairingStore::new());
    store.seed_tutor(tutor(PairingTier::Three, 4)).expect("seed");
    let service = performance_service(store.clone());

    let err = service
        .override_tier(
            &TutorId::from("tut-grace"),
            TierOverrideRequest {
                tier: PairingTier::One,
                admin_id: "adm-7".to_string(),
                reason: "complaint under review".to_string(),
            },
            at(10),
        )
        .unwrap_err();

    assert!(matches!(
        err,
        PairingError::CapacityViolation {
            students: 4,
            limit: 1,
            ..
        }
    ));
    let stored = store
        .tutor(&TutorId::from("tut-grace"))
        .expect("reachable")
        .expect("exists");
    assert_eq!(stored.pairing_tier, PairingTier::Three);
    assert!(stored.tier_override.is_none());
}

#[test]
fn two_sessions_without_grades_do_not_move_tier() {
    let store = Arc::new(InMemoryPairingStore::new());
    store.seed_tutor(tutor(PairingTier::One, 0)).expect("seed");
    for session in SessionCsvImporter::from_reader(Cursor::new(
        "session_id,pairing_id,tutor_id,student_id,course_id,status,scheduled_at,attended,rating,assignment_score,exam_score\n\
         s-1,pair-1,tut-grace,stu-1,physics-1,completed,2025-05-01,yes,5,,100\n\
         s-2,pair-1,tut-grace,stu-1,physics-1,completed,2025-05-02,yes,5,,100\n",
    ))
    .expect("csv parses")
    {
        store.seed_session(session).expect("seed session");
    }
    let service = performance_service(store);

    let update = service
        .recalculate(&TutorId::from("tut-grace"), at(10))
        .expect("recalculated");

    assert!(!update.score.has_minimum_data);
    assert!(update.score.score > 80.0);
    assert_eq!(update.decision.tier, PairingTier::One);
    assert_eq!(update.decision.basis, TierBasis::Retained);
}

#[test]
fn override_is_audited_and_survives_recalculation() {
    let store = Arc::new(InMemoryPairingStore::new());
    store.seed_tutor(tutor(PairingTier::One, 0)).expect("seed");
    let service = performance_service(store);
    let tutor_id = TutorId::from("tut-grace");

    service
        .override_tier(
            &tutor_id,
            TierOverrideRequest {
                tier: PairingTier::Three,
                admin_id: "adm-7".to_string(),
                reason: "veteran instructor".to_string(),
            },
            at(10),
        )
        .expect("override set");
    let update = service.recalculate(&tutor_id, at(11)).expect("recalculated");
    assert_eq!(update.decision.tier, PairingTier::Three);

    let cleared = service
        .clear_tier_override(&tutor_id, "adm-8", at(12))
        .expect("cleared");
    // No scored history: the pinned tier is retained.
    assert_eq!(cleared.pairing_tier, PairingTier::Three);

    let audit = service.audit_log(&tutor_id).expect("audit");
    assert_eq!(audit.len(), 2);
    assert_eq!(audit[0].action, AuditAction::TierOverrideSet);
    assert_eq!(audit[0].actor, "adm-7");
    assert_eq!(audit[0].detail, "veteran instructor");
    assert_eq!(audit[1].action, AuditAction::TierOverrideCleared);
    assert_eq!(audit[1].actor, "adm-8");
}

#[test]
fn onboarded_tutor_becomes_matchable() {
    let store = Arc::new(InMemoryPairingStore::new());
    let mut candidate = tutor(PairingTier::One, 0);
    candidate.tutor_status = TutorStatus::Passed;
    candidate.onboarding_completed = false;
    store.seed_tutor(candidate).expect("seed tutor");
    store
        .seed_tutor_course(TutorCourse {
            tutor_id: TutorId::from("tut-grace"),
            course_id: CourseId::from("physics-1"),
            interview_status: InterviewStatus::Passed,
            payment_status: PaymentStatus::Paid,
        })
        .expect("seed course");
    store
        .seed_enrollment(Enrollment {
            student_id: StudentId::from("stu-1"),
            course_id: CourseId::from("physics-1"),
            status: EnrollmentStatus::PendingPairing,
            tutor_id: None,
            current_pairing_id: None,
            progress: 0,
            version: 0,
        })
        .expect("seed enrollment");

    let pairing = PairingService::new(store.clone(), Arc::new(Silent), PairingConfig::default());
    let err = pairing
        .request_pairing(&StudentId::from("stu-1"), &CourseId::from("physics-1"), at(10))
        .unwrap_err();
    assert!(matches!(err, PairingError::NoEligibleTutor(_)));

    performance_service(store.clone())
        .complete_onboarding(&TutorId::from("tut-grace"), at(10))
        .expect("onboarded");

    let offer = pairing
        .request_pairing(&StudentId::from("stu-1"), &CourseId::from("physics-1"), at(11))
        .expect("offer created");
    assert_eq!(offer.tutor_id, TutorId::from("tut-grace"));
}

#[test]
fn session_outcome_feeds_recalculation() {
    let store = Arc::new(InMemoryPairingStore::new());
    store.seed_tutor(tutor(PairingTier::One, 0)).expect("seed");
    for session in SessionCsvImporter::from_reader(Cursor::new(HISTORY)).expect("csv parses") {
        store.seed_session(session).expect("seed session");
    }
    let service = performance_service(store);

    let recorded = service
        .record_session_outcome(
            &"s-5".into(),
            SessionOutcome {
                student_attended: Some(true),
                student_rating: Some(5),
                assignment_score: Some(95.0),
                exam_score: Some(95.0),
            },
            at(10),
        )
        .expect("recorded");

    let PerformanceRefresh::Updated(update) = recorded.refresh else {
        panic!("refresh should apply");
    };
    assert_eq!(update.score.metrics.completed_sessions, 4);
    assert!(update.score.score > 80.0);
    assert_eq!(update.decision.tier, PairingTier::Three);
}
