use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::pairing::domain::{
    CourseId, InterviewStatus, PairingId, PairingTier, PaymentStatus, PerformanceMetrics,
    Session, SessionId, SessionStatus, StudentId, Tutor, TutorCourse, TutorId, TutorStatus,
    UserRole,
};
use crate::workflows::pairing::memory::InMemoryPairingStore;
use crate::workflows::pairing::repository::{
    Notification, NotificationTemplate, Notifier, NotifyError, PairingStore,
};
use crate::workflows::performance::scoring::ScoringConfig;
use crate::workflows::performance::service::TutorPerformanceService;

pub(super) const TUTOR: &str = "tut-ada";

pub(super) fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 4, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn tutor_id() -> TutorId {
    TutorId::from(TUTOR)
}

pub(super) fn tutor(tier: PairingTier, current: u32) -> Tutor {
    Tutor {
        id: tutor_id(),
        email: "ada@tutors.test".to_string(),
        name: "Ada Lovelace".to_string(),
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
        created_at: at(1, 8),
        version: 0,
    }
}

/// Grade sheet for one session: attended, rating, assignment, exam.
pub(super) type Grades = (Option<bool>, Option<u8>, Option<f64>, Option<f64>);

pub(super) const STRONG: Grades = (Some(true), Some(5), Some(90.0), Some(90.0));
pub(super) const WEAK: Grades = (Some(false), Some(1), Some(10.0), Some(10.0));

pub(super) fn session(index: i64, status: SessionStatus, grades: Grades) -> Session {
    let (attended, rating, assignment, exam) = grades;
    Session {
        id: SessionId(format!("ses-{index}")),
        pairing_id: PairingId::from("pair-1"),
        tutor_id: tutor_id(),
        student_id: StudentId::from("stu-1"),
        course_id: CourseId::from("algebra-1"),
        status,
        scheduled_at: at(2, 15) + Duration::days(index),
        student_attended: attended,
        student_rating: rating,
        assignment_score: assignment,
        exam_score: exam,
        version: 0,
    }
}

pub(super) fn completed(count: i64, grades: Grades) -> Vec<Session> {
    (1..=count)
        .map(|index| session(index, SessionStatus::Completed, grades))
        .collect()
}

pub(super) fn store_with(tutor: Tutor, sessions: Vec<Session>) -> Arc<InMemoryPairingStore> {
    let store = Arc::new(InMemoryPairingStore::new());
    store.seed_tutor(tutor).expect("seed tutor");
    for session in sessions {
        store.seed_session(session).expect("seed session");
    }
    store
}

pub(super) fn passed_course(store: &InMemoryPairingStore) {
    store
        .seed_tutor_course(TutorCourse {
            tutor_id: tutor_id(),
            course_id: CourseId::from("algebra-1"),
            interview_status: InterviewStatus::Passed,
            payment_status: PaymentStatus::Waived,
        })
        .expect("seed course");
}

pub(super) fn build_service(
    store: Arc<InMemoryPairingStore>,
) -> (
    TutorPerformanceService<InMemoryPairingStore, RecordingNotifier>,
    Arc<RecordingNotifier>,
) {
    let notifier = Arc::new(RecordingNotifier::default());
    let service = TutorPerformanceService::new(store, notifier.clone(), ScoringConfig::default(), 3);
    (service, notifier)
}

pub(super) fn stored_tutor(store: &InMemoryPairingStore) -> Tutor {
    store
        .tutor(&tutor_id())
        .expect("store reachable")
        .expect("tutor exists")
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub(super) fn templates(&self) -> Vec<NotificationTemplate> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .iter()
            .map(|notification| notification.template)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError> {
        self.sent
            .lock()
            .expect("notifier mutex poisoned")
            .push(notification);
        Ok(())
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
