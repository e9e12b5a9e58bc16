use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, TimeZone, Utc};
use serde_json::Value;

use crate::workflows::pairing::domain::{
    AuditLogEntry, CourseId, Enrollment, EnrollmentStatus, InterviewStatus, Pairing, PairingId,
    PairingTier, PaymentStatus, PerformanceMetrics, Session, SessionId, StudentId, Tutor,
    TutorCourse, TutorId, TutorStatus, UserRole,
};
use crate::workflows::pairing::memory::InMemoryPairingStore;
use crate::workflows::pairing::repository::{
    Notification, NotificationTemplate, Notifier, NotifyError, PairingStore, RepositoryError,
    WriteBatch,
};
use crate::workflows::pairing::service::{PairingConfig, PairingService};

pub(super) const COURSE: &str = "algebra-1";

pub(super) fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(super) fn tutor(id: &str, registered_day: u32, tier: PairingTier, current: u32) -> Tutor {
    Tutor {
        id: TutorId::from(id),
        email: format!("{id}@tutors.test"),
        name: format!("Tutor {id}"),
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
        created_at: at(registered_day, 8),
        version: 0,
    }
}

pub(super) fn passed(tutor_id: &str, course_id: &str) -> TutorCourse {
    TutorCourse {
        tutor_id: TutorId::from(tutor_id),
        course_id: CourseId::from(course_id),
        interview_status: InterviewStatus::Passed,
        payment_status: PaymentStatus::Paid,
    }
}

pub(super) fn enrollment(student_id: &str) -> Enrollment {
    Enrollment {
        student_id: StudentId::from(student_id),
        course_id: CourseId::from(COURSE),
        status: EnrollmentStatus::PendingPairing,
        tutor_id: None,
        current_pairing_id: None,
        progress: 0,
        version: 0,
    }
}

pub(super) fn student(id: &str) -> StudentId {
    StudentId::from(id)
}

pub(super) fn course() -> CourseId {
    CourseId::from(COURSE)
}

/// Store seeded with the given tutors, each qualified for [`COURSE`], and one
/// pending enrollment per student.
pub(super) fn seeded_store(tutors: Vec<Tutor>, students: &[&str]) -> Arc<InMemoryPairingStore> {
    let store = Arc::new(InMemoryPairingStore::new());
    for tutor in tutors {
        store
            .seed_tutor_course(passed(tutor.id.as_str(), COURSE))
            .expect("seed course");
        store.seed_tutor(tutor).expect("seed tutor");
    }
    for id in students {
        store.seed_enrollment(enrollment(id)).expect("seed enrollment");
    }
    store
}

pub(super) fn build_service(
    store: Arc<InMemoryPairingStore>,
) -> (
    PairingService<InMemoryPairingStore, RecordingNotifier>,
    Arc<RecordingNotifier>,
) {
    let notifier = Arc::new(RecordingNotifier::default());
    let service = PairingService::new(store, notifier.clone(), PairingConfig::default());
    (service, notifier)
}

pub(super) fn stored_tutor(store: &InMemoryPairingStore, id: &str) -> Tutor {
    store
        .tutor(&TutorId::from(id))
        .expect("store reachable")
        .expect("tutor exists")
}

pub(super) fn stored_pairing(store: &InMemoryPairingStore, id: &PairingId) -> Pairing {
    store
        .pairing(id)
        .expect("store reachable")
        .expect("pairing exists")
}

pub(super) fn stored_enrollment(store: &InMemoryPairingStore, student_id: &str) -> Enrollment {
    store
        .enrollment(&student(student_id), &course())
        .expect("store reachable")
        .expect("enrollment exists")
}

#[derive(Default)]
pub(super) struct RecordingNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl RecordingNotifier {
    pub(super) fn sent(&self) -> Vec<Notification> {
        self.sent.lock().expect("notifier mutex poisoned").clone()
    }

    pub(super) fn templates(&self) -> Vec<NotificationTemplate> {
        self.sent().into_iter().map(|n| n.template).collect()
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

pub(super) struct FailingNotifier;

impl Notifier for FailingNotifier {
    fn notify(&self, _notification: Notification) -> Result<(), NotifyError> {
        Err(NotifyError::Transport("smtp relay offline".to_string()))
    }
}

pub(super) struct UnavailableStore;

impl UnavailableStore {
    fn offline<T>() -> Result<T, RepositoryError> {
        Err(RepositoryError::Unavailable("database offline".to_string()))
    }
}

impl PairingStore for UnavailableStore {
    fn tutor(&self, _id: &TutorId) -> Result<Option<Tutor>, RepositoryError> {
        Self::offline()
    }

    fn tutors_with_status(&self, _status: TutorStatus) -> Result<Vec<Tutor>, RepositoryError> {
        Self::offline()
    }

    fn tutor_courses_for_course(
        &self,
        _course_id: &CourseId,
    ) -> Result<Vec<TutorCourse>, RepositoryError> {
        Self::offline()
    }

    fn tutor_courses_for_tutor(
        &self,
        _tutor_id: &TutorId,
    ) -> Result<Vec<TutorCourse>, RepositoryError> {
        Self::offline()
    }

    fn pairing(&self, _id: &PairingId) -> Result<Option<Pairing>, RepositoryError> {
        Self::offline()
    }

    fn pairings_for_enrollment(
        &self,
        _student_id: &StudentId,
        _course_id: &CourseId,
    ) -> Result<Vec<Pairing>, RepositoryError> {
        Self::offline()
    }

    fn pending_pairings(&self) -> Result<Vec<Pairing>, RepositoryError> {
        Self::offline()
    }

    fn enrollment(
        &self,
        _student_id: &StudentId,
        _course_id: &CourseId,
    ) -> Result<Option<Enrollment>, RepositoryError> {
        Self::offline()
    }

    fn session(&self, _id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        Self::offline()
    }

    fn sessions_for_tutor(&self, _tutor_id: &TutorId) -> Result<Vec<Session>, RepositoryError> {
        Self::offline()
    }

    fn audit_log(&self, _tutor_id: &TutorId) -> Result<Vec<AuditLogEntry>, RepositoryError> {
        Self::offline()
    }

    fn commit(&self, _batch: WriteBatch) -> Result<(), RepositoryError> {
        Self::offline()
    }
}

/// Delegates to an in-memory store but reports a version conflict for the
/// first `conflicts` commits, as if another writer got there first.
pub(super) struct ConflictingStore {
    pub(super) inner: Arc<InMemoryPairingStore>,
    conflicts: Mutex<u32>,
    pub(super) commits: Mutex<u32>,
    unavailable_after: Option<u32>,
}

impl ConflictingStore {
    pub(super) fn new(inner: Arc<InMemoryPairingStore>, conflicts: u32) -> Self {
        Self {
            inner,
            conflicts: Mutex::new(conflicts),
            commits: Mutex::new(0),
            unavailable_after: None,
        }
    }

    /// Accepts `successes` commits, then reports the backend as unavailable.
    pub(super) fn failing_after(inner: Arc<InMemoryPairingStore>, successes: u32) -> Self {
        Self {
            unavailable_after: Some(successes),
            ..Self::new(inner, 0)
        }
    }

    pub(super) fn commit_attempts(&self) -> u32 {
        *self.commits.lock().expect("counter mutex poisoned")
    }
}

impl PairingStore for ConflictingStore {
    fn tutor(&self, id: &TutorId) -> Result<Option<Tutor>, RepositoryError> {
        self.inner.tutor(id)
    }

    fn tutors_with_status(&self, status: TutorStatus) -> Result<Vec<Tutor>, RepositoryError> {
        self.inner.tutors_with_status(status)
    }

    fn tutor_courses_for_course(
        &self,
        course_id: &CourseId,
    ) -> Result<Vec<TutorCourse>, RepositoryError> {
        self.inner.tutor_courses_for_course(course_id)
    }

    fn tutor_courses_for_tutor(
        &self,
        tutor_id: &TutorId,
    ) -> Result<Vec<TutorCourse>, RepositoryError> {
        self.inner.tutor_courses_for_tutor(tutor_id)
    }

    fn pairing(&self, id: &PairingId) -> Result<Option<Pairing>, RepositoryError> {
        self.inner.pairing(id)
    }

    fn pairings_for_enrollment(
        &self,
        student_id: &StudentId,
        course_id: &CourseId,
    ) -> Result<Vec<Pairing>, RepositoryError> {
        self.inner.pairings_for_enrollment(student_id, course_id)
    }

    fn pending_pairings(&self) -> Result<Vec<Pairing>, RepositoryError> {
        self.inner.pending_pairings()
    }

    fn enrollment(
        &self,
        student_id: &StudentId,
        course_id: &CourseId,
    ) -> Result<Option<Enrollment>, RepositoryError> {
        self.inner.enrollment(student_id, course_id)
    }

    fn session(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        self.inner.session(id)
    }

    fn sessions_for_tutor(&self, tutor_id: &TutorId) -> Result<Vec<Session>, RepositoryError> {
        self.inner.sessions_for_tutor(tutor_id)
    }

    fn audit_log(&self, tutor_id: &TutorId) -> Result<Vec<AuditLogEntry>, RepositoryError> {
        self.inner.audit_log(tutor_id)
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), RepositoryError> {
        let mut commits = self.commits.lock().expect("counter mutex poisoned");
        *commits += 1;
        if self.unavailable_after.is_some_and(|successes| *commits > successes) {
            return Err(RepositoryError::Unavailable("backend went away".to_string()));
        }
        drop(commits);
        let mut remaining = self.conflicts.lock().expect("conflict mutex poisoned");
        if *remaining > 0 {
            *remaining -= 1;
            return Err(RepositoryError::Conflict);
        }
        drop(remaining);
        self.inner.commit(batch)
    }
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
