//! Startup roster loading for the in-memory store.
//!
//! A seed directory holds up to four CSV exports. Missing files are skipped:
//!
//! | file                | columns                                                                              |
//! |---------------------|--------------------------------------------------------------------------------------|
//! | `tutors.csv`        | tutor_id, email, name, status, onboarded, tier, current_students, registered_at      |
//! | `tutor_courses.csv` | tutor_id, course_id, interview_status, payment_status                                |
//! | `enrollments.csv`   | student_id, course_id, status, progress                                              |
//! | `sessions.csv`      | same layout as [`SessionCsvImporter`]                                                |

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::info;

use super::pairing::domain::{
    CourseId, Enrollment, EnrollmentStatus, InterviewStatus, PairingTier, PaymentStatus,
    PerformanceMetrics, Session, StudentId, Tutor, TutorCourse, TutorId, TutorStatus, UserRole,
};
use super::pairing::memory::InMemoryPairingStore;
use super::pairing::repository::RepositoryError;
use super::performance::import::{SessionCsvImporter, SessionImportError};

pub const TUTORS_FILE: &str = "tutors.csv";
pub const TUTOR_COURSES_FILE: &str = "tutor_courses.csv";
pub const ENROLLMENTS_FILE: &str = "enrollments.csv";
pub const SESSIONS_FILE: &str = "sessions.csv";

#[derive(Debug)]
pub enum RosterImportError {
    Io { path: PathBuf, source: std::io::Error },
    Csv { file: &'static str, source: csv::Error },
    Invalid { file: &'static str, line: usize, message: String },
    Sessions(SessionImportError),
    Store(RepositoryError),
}

impl std::fmt::Display for RosterImportError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RosterImportError::Io { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            RosterImportError::Csv { file, source } => {
                write!(f, "invalid CSV data in {}: {}", file, source)
            }
            RosterImportError::Invalid {
                file,
                line,
                message,
            } => write!(f, "{} line {}: {}", file, line, message),
            RosterImportError::Sessions(err) => write!(f, "{}: {}", SESSIONS_FILE, err),
            RosterImportError::Store(err) => write!(f, "could not seed store: {}", err),
        }
    }
}

impl std::error::Error for RosterImportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RosterImportError::Io { source, .. } => Some(source),
            RosterImportError::Csv { source, .. } => Some(source),
            RosterImportError::Invalid { .. } => None,
            RosterImportError::Sessions(err) => Some(err),
            RosterImportError::Store(err) => Some(err),
        }
    }
}

impl From<SessionImportError> for RosterImportError {
    fn from(err: SessionImportError) -> Self {
        Self::Sessions(err)
    }
}

impl From<RepositoryError> for RosterImportError {
    fn from(err: RepositoryError) -> Self {
        Self::Store(err)
    }
}

/// Records parsed from a seed directory, ready to load into a store.
#[derive(Debug, Clone, Default)]
pub struct RosterSeed {
    pub tutors: Vec<Tutor>,
    pub tutor_courses: Vec<TutorCourse>,
    pub enrollments: Vec<Enrollment>,
    pub sessions: Vec<Session>,
}

impl RosterSeed {
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self, RosterImportError> {
        let dir = dir.as_ref();
        let mut seed = RosterSeed::default();

        if let Some(file) = open_optional(&dir.join(TUTORS_FILE))? {
            seed.tutors = read_tutors(file)?;
        }
        if let Some(file) = open_optional(&dir.join(TUTOR_COURSES_FILE))? {
            seed.tutor_courses = read_tutor_courses(file)?;
        }
        if let Some(file) = open_optional(&dir.join(ENROLLMENTS_FILE))? {
            seed.enrollments = read_enrollments(file)?;
        }
        if let Some(file) = open_optional(&dir.join(SESSIONS_FILE))? {
            seed.sessions = SessionCsvImporter::from_reader(file)?;
        }

        Ok(seed)
    }

    pub fn is_empty(&self) -> bool {
        self.tutors.is_empty()
            && self.tutor_courses.is_empty()
            && self.enrollments.is_empty()
            && self.sessions.is_empty()
    }

    /// Insert every record, replacing documents with the same key.
    pub fn load_into(self, store: &InMemoryPairingStore) -> Result<(), RosterImportError> {
        let counts = (
            self.tutors.len(),
            self.tutor_courses.len(),
            self.enrollments.len(),
            self.sessions.len(),
        );
        for tutor in self.tutors {
            store.seed_tutor(tutor)?;
        }
        for record in self.tutor_courses {
            store.seed_tutor_course(record)?;
        }
        for enrollment in self.enrollments {
            store.seed_enrollment(enrollment)?;
        }
        for session in self.sessions {
            store.seed_session(session)?;
        }

        info!(
            tutors = counts.0,
            tutor_courses = counts.1,
            enrollments = counts.2,
            sessions = counts.3,
            "roster seeded"
        );
        Ok(())
    }
}

fn open_optional(path: &Path) -> Result<Option<std::fs::File>, RosterImportError> {
    match std::fs::File::open(path) {
        Ok(file) => Ok(Some(file)),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(source) => Err(RosterImportError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

fn read_rows<R, T, U, F>(
    reader: R,
    file: &'static str,
    mut convert: F,
) -> Result<Vec<U>, RosterImportError>
where
    R: Read,
    T: DeserializeOwned,
    F: FnMut(T) -> Result<U, String>,
{
    let mut csv_reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);
    let mut records = Vec::new();

    for (index, row) in csv_reader.deserialize::<T>().enumerate() {
        let row = row.map_err(|source| RosterImportError::Csv { file, source })?;
        let line = index + 2;
        let record =
            convert(row).map_err(|message| RosterImportError::Invalid { file, line, message })?;
        records.push(record);
    }

    Ok(records)
}

#[derive(Debug, Deserialize)]
struct TutorRow {
    tutor_id: String,
    email: String,
    name: String,
    status: TutorStatus,
    onboarded: bool,
    tier: u8,
    current_students: Option<u32>,
    registered_at: String,
}

pub fn read_tutors<R: Read>(reader: R) -> Result<Vec<Tutor>, RosterImportError> {
    read_rows(reader, TUTORS_FILE, |row: TutorRow| {
        let tier = PairingTier::try_from(row.tier)?;
        let current_students = row.current_students.unwrap_or(0);
        if current_students > tier.max_concurrent_students() {
            return Err(format!(
                "{} students exceed the {} limit of {}",
                current_students,
                tier,
                tier.max_concurrent_students()
            ));
        }
        let created_at = parse_datetime(&row.registered_at)
            .ok_or_else(|| format!("unrecognised registered_at '{}'", row.registered_at))?;

        Ok(Tutor {
            id: TutorId(row.tutor_id),
            email: row.email,
            name: row.name,
            role: UserRole::Tutor,
            tutor_status: row.status,
            onboarding_completed: row.onboarded,
            pairing_tier: tier,
            max_concurrent_students: tier.max_concurrent_students(),
            current_student_count: current_students,
            total_students_paired: current_students,
            performance_score: 0.0,
            performance_metrics: PerformanceMetrics::default(),
            tier_override: None,
            created_at,
            version: 0,
        })
    })
}

#[derive(Debug, Deserialize)]
struct TutorCourseRow {
    tutor_id: String,
    course_id: String,
    interview_status: InterviewStatus,
    payment_status: PaymentStatus,
}

pub fn read_tutor_courses<R: Read>(reader: R) -> Result<Vec<TutorCourse>, RosterImportError> {
    read_rows(reader, TUTOR_COURSES_FILE, |row: TutorCourseRow| {
        Ok(TutorCourse {
            tutor_id: TutorId(row.tutor_id),
            course_id: CourseId(row.course_id),
            interview_status: row.interview_status,
            payment_status: row.payment_status,
        })
    })
}

#[derive(Debug, Deserialize)]
struct EnrollmentRow {
    student_id: String,
    course_id: String,
    status: Option<EnrollmentStatus>,
    progress: Option<u8>,
}

pub fn read_enrollments<R: Read>(reader: R) -> Result<Vec<Enrollment>, RosterImportError> {
    read_rows(reader, ENROLLMENTS_FILE, |row: EnrollmentRow| {
        let progress = row.progress.unwrap_or(0);
        if progress > 100 {
            return Err(format!("progress must be 0-100 (found {progress})"));
        }
        Ok(Enrollment {
            student_id: StudentId(row.student_id),
            course_id: CourseId(row.course_id),
            status: row.status.unwrap_or(EnrollmentStatus::PendingPairing),
            tutor_id: None,
            current_pairing_id: None,
            progress,
            version: 0,
        })
    })
}

fn parse_datetime(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| DateTime::<Utc>::from_naive_utc_and_offset(naive, Utc))
}
