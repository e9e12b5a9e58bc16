use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::domain::{
    AuditLogEntry, CourseId, Enrollment, Pairing, PairingId, Session, SessionId, StudentId,
    Tutor, TutorCourse, TutorId, TutorStatus,
};
use super::error::PairingError;

/// Document-store seam covering the `users`, `tutorCourses`, `pairings`, `sessions`,
/// `enrollments`, and `auditLogs` collections.
pub trait PairingStore: Send + Sync {
    fn tutor(&self, id: &TutorId) -> Result<Option<Tutor>, RepositoryError>;
    fn tutors_with_status(&self, status: TutorStatus) -> Result<Vec<Tutor>, RepositoryError>;
    fn tutor_courses_for_course(
        &self,
        course_id: &CourseId,
    ) -> Result<Vec<TutorCourse>, RepositoryError>;
    fn tutor_courses_for_tutor(
        &self,
        tutor_id: &TutorId,
    ) -> Result<Vec<TutorCourse>, RepositoryError>;
    fn pairing(&self, id: &PairingId) -> Result<Option<Pairing>, RepositoryError>;
    fn pairings_for_enrollment(
        &self,
        student_id: &StudentId,
        course_id: &CourseId,
    ) -> Result<Vec<Pairing>, RepositoryError>;
    fn pending_pairings(&self) -> Result<Vec<Pairing>, RepositoryError>;
    fn enrollment(
        &self,
        student_id: &StudentId,
        course_id: &CourseId,
    ) -> Result<Option<Enrollment>, RepositoryError>;
    fn session(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError>;
    fn sessions_for_tutor(&self, tutor_id: &TutorId) -> Result<Vec<Session>, RepositoryError>;
    fn audit_log(&self, tutor_id: &TutorId) -> Result<Vec<AuditLogEntry>, RepositoryError>;

    /// Apply every write in the batch or none of them.
    fn commit(&self, batch: WriteBatch) -> Result<(), RepositoryError>;
}

/// A single document mutation inside a [`WriteBatch`].
///
/// `Put*` writes are versioned: the document's `version` must match the stored
/// version (0 for a new document) and the store bumps it on success. Counter
/// writes are applied atomically against the stored tutor and never read the
/// caller's copy.
#[derive(Debug, Clone)]
pub enum StoreWrite {
    PutTutor(Tutor),
    PutPairing(Pairing),
    PutEnrollment(Enrollment),
    PutSession(Session),
    /// `current_student_count += 1` and `total_students_paired += 1`, refused at capacity.
    IncrementStudents { tutor_id: TutorId },
    /// `current_student_count -= 1`, refused at zero.
    ReleaseStudent { tutor_id: TutorId },
    AppendAudit(AuditLogEntry),
}

/// Ordered set of writes committed as one transaction.
#[derive(Debug, Clone, Default)]
pub struct WriteBatch {
    writes: Vec<StoreWrite>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, write: StoreWrite) -> &mut Self {
        self.writes.push(write);
        self
    }

    pub fn with(mut self, write: StoreWrite) -> Self {
        self.writes.push(write);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.writes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.writes.len()
    }

    pub fn writes(&self) -> &[StoreWrite] {
        &self.writes
    }

    pub fn into_writes(self) -> Vec<StoreWrite> {
        self.writes
    }
}

/// Error enumeration for repository failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RepositoryError {
    #[error("document was modified concurrently")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("tutor '{tutor_id}' would hold {students} student(s) against a limit of {limit}")]
    CapacityExhausted {
        tutor_id: TutorId,
        students: u32,
        limit: u32,
    },
    #[error("tutor '{tutor_id}' has no active students to release")]
    CounterUnderflow { tutor_id: TutorId },
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Run a read-decide-write cycle, re-reading after optimistic version conflicts.
///
/// `stage` must re-read everything it depends on; it returns the batch to commit
/// and the value handed back to the caller once the batch lands.
pub fn commit_with_retry<S, T, F>(
    store: &S,
    max_attempts: u32,
    operation: &'static str,
    mut stage: F,
) -> Result<T, PairingError>
where
    S: PairingStore + ?Sized,
    F: FnMut() -> Result<(WriteBatch, T), PairingError>,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;
        let (batch, value) = stage()?;
        if batch.is_empty() {
            return Ok(value);
        }

        match store.commit(batch) {
            Ok(()) => {
                if attempt > 1 {
                    debug!(operation, attempt, "commit succeeded after retry");
                }
                return Ok(value);
            }
            Err(RepositoryError::Conflict) if attempt < max_attempts => {
                debug!(operation, attempt, "version conflict, re-reading");
            }
            Err(RepositoryError::Conflict) => {
                warn!(operation, attempt, "giving up after repeated version conflicts");
                return Err(PairingError::Storage(RepositoryError::Conflict));
            }
            Err(err) => return Err(err.into()),
        }
    }
}

/// Trait describing outbound notification hooks (e.g., templated e-mail adapters).
pub trait Notifier: Send + Sync {
    fn notify(&self, notification: Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationTemplate {
    PairingRequested,
    PairingAccepted,
    PairingDeclined,
    PairingUnassigned,
    TierChanged,
    OnboardingReady,
}

impl NotificationTemplate {
    pub const fn label(self) -> &'static str {
        match self {
            NotificationTemplate::PairingRequested => "pairing_requested",
            NotificationTemplate::PairingAccepted => "pairing_accepted",
            NotificationTemplate::PairingDeclined => "pairing_declined",
            NotificationTemplate::PairingUnassigned => "pairing_unassigned",
            NotificationTemplate::TierChanged => "tier_changed",
            NotificationTemplate::OnboardingReady => "onboarding_ready",
        }
    }
}

/// Templated message payload; `recipient` is a user id or the `admins` group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub template: NotificationTemplate,
    pub recipient: String,
    pub details: BTreeMap<String, String>,
}

impl Notification {
    pub const ADMINS: &'static str = "admins";

    pub fn new(template: NotificationTemplate, recipient: impl Into<String>) -> Self {
        Self {
            template,
            recipient: recipient.into(),
            details: BTreeMap::new(),
        }
    }

    pub fn detail(mut self, key: &str, value: impl ToString) -> Self {
        self.details.insert(key.to_string(), value.to_string());
        self
    }
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Fire-and-forget delivery: failures are logged and never undo committed state.
pub(crate) fn notify_best_effort<N: Notifier + ?Sized>(notifier: &N, notification: Notification) {
    let template = notification.template.label();
    let recipient = notification.recipient.clone();
    if let Err(err) = notifier.notify(notification) {
        warn!(template, %recipient, error = %err, "notification dropped");
    }
}
