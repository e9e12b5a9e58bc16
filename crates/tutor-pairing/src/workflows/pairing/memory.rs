use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::domain::{
    AuditLogEntry, CourseId, Enrollment, Pairing, PairingId, PairingStatus, Session, SessionId,
    StudentId, Tutor, TutorCourse, TutorId, TutorStatus,
};
use super::repository::{PairingStore, RepositoryError, StoreWrite, WriteBatch};

#[derive(Debug, Clone, Default)]
struct Collections {
    tutors: HashMap<TutorId, Tutor>,
    tutor_courses: Vec<TutorCourse>,
    pairings: HashMap<PairingId, Pairing>,
    enrollments: HashMap<(StudentId, CourseId), Enrollment>,
    sessions: HashMap<SessionId, Session>,
    audit_logs: Vec<AuditLogEntry>,
}

/// Process-local document store. A single mutex over every collection makes each
/// batch atomic; the batch is staged on a copy and swapped in only when every
/// write succeeds.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPairingStore {
    collections: Arc<Mutex<Collections>>,
}

impl InMemoryPairingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Collections>, RepositoryError> {
        self.collections
            .lock()
            .map_err(|_| RepositoryError::Unavailable("store mutex poisoned".to_string()))
    }

    /// Insert or replace a tutor without version checks, for fixtures and imports.
    pub fn seed_tutor(&self, tutor: Tutor) -> Result<(), RepositoryError> {
        self.lock()?.tutors.insert(tutor.id.clone(), tutor);
        Ok(())
    }

    pub fn seed_tutor_course(&self, record: TutorCourse) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        guard
            .tutor_courses
            .retain(|existing| {
                !(existing.tutor_id == record.tutor_id && existing.course_id == record.course_id)
            });
        guard.tutor_courses.push(record);
        Ok(())
    }

    pub fn seed_enrollment(&self, enrollment: Enrollment) -> Result<(), RepositoryError> {
        let key = (enrollment.student_id.clone(), enrollment.course_id.clone());
        self.lock()?.enrollments.insert(key, enrollment);
        Ok(())
    }

    pub fn seed_pairing(&self, pairing: Pairing) -> Result<(), RepositoryError> {
        self.lock()?.pairings.insert(pairing.id.clone(), pairing);
        Ok(())
    }

    pub fn seed_session(&self, session: Session) -> Result<(), RepositoryError> {
        self.lock()?.sessions.insert(session.id.clone(), session);
        Ok(())
    }

    pub fn tutors(&self) -> Result<Vec<Tutor>, RepositoryError> {
        let mut tutors: Vec<Tutor> = self.lock()?.tutors.values().cloned().collect();
        tutors.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tutors)
    }
}

fn check_version(stored: Option<u64>, expected: u64) -> Result<u64, RepositoryError> {
    match stored {
        Some(version) if version == expected => Ok(version + 1),
        None if expected == 0 => Ok(1),
        _ => Err(RepositoryError::Conflict),
    }
}

fn apply(staged: &mut Collections, write: StoreWrite) -> Result<(), RepositoryError> {
    match write {
        StoreWrite::PutTutor(mut tutor) => {
            let stored = staged.tutors.get(&tutor.id).map(|existing| existing.version);
            tutor.version = check_version(stored, tutor.version)?;
            if tutor.current_student_count > tutor.max_concurrent_students {
                return Err(RepositoryError::CapacityExhausted {
                    tutor_id: tutor.id,
                    students: tutor.current_student_count,
                    limit: tutor.max_concurrent_students,
                });
            }
            staged.tutors.insert(tutor.id.clone(), tutor);
        }
        StoreWrite::PutPairing(mut pairing) => {
            let stored = staged.pairings.get(&pairing.id).map(|existing| existing.version);
            pairing.version = check_version(stored, pairing.version)?;
            staged.pairings.insert(pairing.id.clone(), pairing);
        }
        StoreWrite::PutEnrollment(mut enrollment) => {
            let key = (enrollment.student_id.clone(), enrollment.course_id.clone());
            let stored = staged.enrollments.get(&key).map(|existing| existing.version);
            enrollment.version = check_version(stored, enrollment.version)?;
            staged.enrollments.insert(key, enrollment);
        }
        StoreWrite::PutSession(mut session) => {
            let stored = staged.sessions.get(&session.id).map(|existing| existing.version);
            session.version = check_version(stored, session.version)?;
            staged.sessions.insert(session.id.clone(), session);
        }
        StoreWrite::IncrementStudents { tutor_id } => {
            let tutor = staged
                .tutors
                .get_mut(&tutor_id)
                .ok_or(RepositoryError::NotFound)?;
            if !tutor.has_capacity() {
                return Err(RepositoryError::CapacityExhausted {
                    students: tutor.current_student_count + 1,
                    limit: tutor.max_concurrent_students,
                    tutor_id,
                });
            }
            tutor.current_student_count += 1;
            tutor.total_students_paired += 1;
            tutor.version += 1;
        }
        StoreWrite::ReleaseStudent { tutor_id } => {
            let tutor = staged
                .tutors
                .get_mut(&tutor_id)
                .ok_or(RepositoryError::NotFound)?;
            if tutor.current_student_count == 0 {
                return Err(RepositoryError::CounterUnderflow { tutor_id });
            }
            tutor.current_student_count -= 1;
            tutor.version += 1;
        }
        StoreWrite::AppendAudit(entry) => staged.audit_logs.push(entry),
    }
    Ok(())
}

impl PairingStore for InMemoryPairingStore {
    fn tutor(&self, id: &TutorId) -> Result<Option<Tutor>, RepositoryError> {
        Ok(self.lock()?.tutors.get(id).cloned())
    }

    fn tutors_with_status(&self, status: TutorStatus) -> Result<Vec<Tutor>, RepositoryError> {
        Ok(self
            .lock()?
            .tutors
            .values()
            .filter(|tutor| tutor.tutor_status == status)
            .cloned()
            .collect())
    }

    fn tutor_courses_for_course(
        &self,
        course_id: &CourseId,
    ) -> Result<Vec<TutorCourse>, RepositoryError> {
        Ok(self
            .lock()?
            .tutor_courses
            .iter()
            .filter(|record| &record.course_id == course_id)
            .cloned()
            .collect())
    }

    fn tutor_courses_for_tutor(
        &self,
        tutor_id: &TutorId,
    ) -> Result<Vec<TutorCourse>, RepositoryError> {
        Ok(self
            .lock()?
            .tutor_courses
            .iter()
            .filter(|record| &record.tutor_id == tutor_id)
            .cloned()
            .collect())
    }

    fn pairing(&self, id: &PairingId) -> Result<Option<Pairing>, RepositoryError> {
        Ok(self.lock()?.pairings.get(id).cloned())
    }

    fn pairings_for_enrollment(
        &self,
        student_id: &StudentId,
        course_id: &CourseId,
    ) -> Result<Vec<Pairing>, RepositoryError> {
        let mut pairings: Vec<Pairing> = self
            .lock()?
            .pairings
            .values()
            .filter(|pairing| &pairing.student_id == student_id && &pairing.course_id == course_id)
            .cloned()
            .collect();
        pairings.sort_by(|a, b| {
            a.assignment_attempt
                .cmp(&b.assignment_attempt)
                .then_with(|| a.requested_at.cmp(&b.requested_at))
        });
        Ok(pairings)
    }

    fn pending_pairings(&self) -> Result<Vec<Pairing>, RepositoryError> {
        let mut pairings: Vec<Pairing> = self
            .lock()?
            .pairings
            .values()
            .filter(|pairing| pairing.status == PairingStatus::Pending)
            .cloned()
            .collect();
        pairings.sort_by(|a, b| {
            a.requested_at
                .cmp(&b.requested_at)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(pairings)
    }

    fn enrollment(
        &self,
        student_id: &StudentId,
        course_id: &CourseId,
    ) -> Result<Option<Enrollment>, RepositoryError> {
        Ok(self
            .lock()?
            .enrollments
            .get(&(student_id.clone(), course_id.clone()))
            .cloned())
    }

    fn session(&self, id: &SessionId) -> Result<Option<Session>, RepositoryError> {
        Ok(self.lock()?.sessions.get(id).cloned())
    }

    fn sessions_for_tutor(&self, tutor_id: &TutorId) -> Result<Vec<Session>, RepositoryError> {
        let mut sessions: Vec<Session> = self
            .lock()?
            .sessions
            .values()
            .filter(|session| &session.tutor_id == tutor_id)
            .cloned()
            .collect();
        sessions.sort_by(|a, b| a.scheduled_at.cmp(&b.scheduled_at));
        Ok(sessions)
    }

    fn audit_log(&self, tutor_id: &TutorId) -> Result<Vec<AuditLogEntry>, RepositoryError> {
        Ok(self
            .lock()?
            .audit_logs
            .iter()
            .filter(|entry| &entry.tutor_id == tutor_id)
            .cloned()
            .collect())
    }

    fn commit(&self, batch: WriteBatch) -> Result<(), RepositoryError> {
        let mut guard = self.lock()?;
        let mut staged = guard.clone();
        for write in batch.into_writes() {
            apply(&mut staged, write)?;
        }
        *guard = staged;
        Ok(())
    }
}
