use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::PairingError;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_id!(
    /// Identifier of a user document with the tutor role.
    TutorId
);
string_id!(StudentId);
string_id!(CourseId);
string_id!(
    /// Identifier wrapper for pairing requests.
    PairingId
);
string_id!(SessionId);

impl PairingId {
    pub fn generate() -> Self {
        Self(format!("pair-{}", Uuid::new_v4().simple()))
    }
}

/// Role stored on every user document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Student,
    Tutor,
    Admin,
}

/// Interview and onboarding progression of a tutor account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TutorStatus {
    PendingInterview,
    InterviewScheduled,
    Passed,
    Failed,
    Active,
}

impl TutorStatus {
    pub const fn label(self) -> &'static str {
        match self {
            TutorStatus::PendingInterview => "pending_interview",
            TutorStatus::InterviewScheduled => "interview_scheduled",
            TutorStatus::Passed => "passed",
            TutorStatus::Failed => "failed",
            TutorStatus::Active => "active",
        }
    }
}

/// Performance-derived capacity class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum PairingTier {
    One,
    Two,
    Three,
}

impl PairingTier {
    /// Student-slot limit per tier: {1: 1, 2: 3, 3: 6}.
    pub const fn max_concurrent_students(self) -> u32 {
        match self {
            PairingTier::One => 1,
            PairingTier::Two => 3,
            PairingTier::Three => 6,
        }
    }

    pub const fn number(self) -> u8 {
        match self {
            PairingTier::One => 1,
            PairingTier::Two => 2,
            PairingTier::Three => 3,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            PairingTier::One => "Developing",
            PairingTier::Two => "Good",
            PairingTier::Three => "Excellent",
        }
    }
}

impl TryFrom<u8> for PairingTier {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(PairingTier::One),
            2 => Ok(PairingTier::Two),
            3 => Ok(PairingTier::Three),
            other => Err(format!("pairing tier must be 1, 2, or 3 (found {other})")),
        }
    }
}

impl From<PairingTier> for u8 {
    fn from(value: PairingTier) -> Self {
        value.number()
    }
}

impl fmt::Display for PairingTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tier {}", self.number())
    }
}

/// Aggregated percentages feeding the performance score. `None` means no samples.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub attendance_pct: Option<f64>,
    pub assignments_pct: Option<f64>,
    pub exams_pct: Option<f64>,
    pub reviews_pct: Option<f64>,
    pub completed_sessions: u32,
    pub graded_assignments: u32,
    pub has_minimum_data: bool,
}

/// Admin-imposed tier that suspends automatic recalculation until cleared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TierOverride {
    pub tier: PairingTier,
    pub set_by: String,
    pub reason: String,
    pub set_at: DateTime<Utc>,
}

/// Tutor view of a user document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tutor {
    pub id: TutorId,
    pub email: String,
    pub name: String,
    pub role: UserRole,
    pub tutor_status: TutorStatus,
    pub onboarding_completed: bool,
    pub pairing_tier: PairingTier,
    pub max_concurrent_students: u32,
    pub current_student_count: u32,
    pub total_students_paired: u32,
    pub performance_score: f64,
    pub performance_metrics: PerformanceMetrics,
    pub tier_override: Option<TierOverride>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub version: u64,
}

impl Tutor {
    pub fn available_slots(&self) -> u32 {
        self.max_concurrent_students
            .saturating_sub(self.current_student_count)
    }

    pub fn has_capacity(&self) -> bool {
        self.current_student_count < self.max_concurrent_students
    }

    /// Role, status, and onboarding gate shared by every match attempt.
    pub fn is_active_tutor(&self) -> bool {
        self.role == UserRole::Tutor
            && self.tutor_status == TutorStatus::Active
            && self.onboarding_completed
    }

    pub fn apply_tier(&mut self, tier: PairingTier) {
        self.pairing_tier = tier;
        self.max_concurrent_students = tier.max_concurrent_students();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterviewStatus {
    Pending,
    Passed,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Waived,
}

/// Tutor x course qualification record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TutorCourse {
    pub tutor_id: TutorId,
    pub course_id: CourseId,
    pub interview_status: InterviewStatus,
    pub payment_status: PaymentStatus,
}

impl TutorCourse {
    pub fn qualifies(&self, course_id: &CourseId) -> bool {
        &self.course_id == course_id && self.interview_status == InterviewStatus::Passed
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairingStatus {
    Pending,
    Accepted,
    Declined,
    Active,
    Completed,
}

impl PairingStatus {
    pub const fn label(self) -> &'static str {
        match self {
            PairingStatus::Pending => "pending",
            PairingStatus::Accepted => "accepted",
            PairingStatus::Declined => "declined",
            PairingStatus::Active => "active",
            PairingStatus::Completed => "completed",
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, PairingStatus::Declined | PairingStatus::Completed)
    }
}

impl fmt::Display for PairingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TutorResponse {
    Accepted,
    Declined,
}

/// Why a pairing ended up declined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeclineReason {
    Tutor,
    Expired,
}

/// Proposed or accepted tutor-student assignment for a course.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pairing {
    pub id: PairingId,
    pub student_id: StudentId,
    pub tutor_id: TutorId,
    pub course_id: CourseId,
    pub status: PairingStatus,
    pub tutor_response: Option<TutorResponse>,
    pub decline_reason: Option<DeclineReason>,
    pub requested_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub responded_at: Option<DateTime<Utc>>,
    pub assignment_attempt: u32,
    #[serde(default)]
    pub version: u64,
}

impl Pairing {
    pub fn offer(
        student_id: StudentId,
        tutor_id: TutorId,
        course_id: CourseId,
        requested_at: DateTime<Utc>,
        response_window: Duration,
        assignment_attempt: u32,
    ) -> Result<Self, PairingError> {
        let expires_at = requested_at
            .checked_add_signed(response_window)
            .ok_or_else(|| {
                PairingError::Validation(format!(
                    "response window of {}h from {requested_at} overflows the calendar",
                    response_window.num_hours()
                ))
            })?;
        Ok(Self {
            id: PairingId::generate(),
            student_id,
            tutor_id,
            course_id,
            status: PairingStatus::Pending,
            tutor_response: None,
            decline_reason: None,
            requested_at,
            expires_at,
            responded_at: None,
            assignment_attempt,
            version: 0,
        })
    }

    pub fn is_open(&self) -> bool {
        !self.status.is_terminal()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == PairingStatus::Pending && now >= self.expires_at
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Scheduled,
    Completed,
    Cancelled,
}

/// A tutoring meeting; completed sessions feed the scoring engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub pairing_id: PairingId,
    pub tutor_id: TutorId,
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub status: SessionStatus,
    pub scheduled_at: DateTime<Utc>,
    pub student_attended: Option<bool>,
    pub student_rating: Option<u8>,
    pub assignment_score: Option<f64>,
    pub exam_score: Option<f64>,
    #[serde(default)]
    pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrollmentStatus {
    PendingPairing,
    Active,
    Completed,
    Dropped,
}

impl EnrollmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            EnrollmentStatus::PendingPairing => "pending_pairing",
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Completed => "completed",
            EnrollmentStatus::Dropped => "dropped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub student_id: StudentId,
    pub course_id: CourseId,
    pub status: EnrollmentStatus,
    pub tutor_id: Option<TutorId>,
    pub current_pairing_id: Option<PairingId>,
    pub progress: u8,
    #[serde(default)]
    pub version: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    TierOverrideSet,
    TierOverrideCleared,
    TierRecalculated,
}

/// Append-only record of tier changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditLogEntry {
    pub id: String,
    pub actor: String,
    pub tutor_id: TutorId,
    pub action: AuditAction,
    pub previous_tier: PairingTier,
    pub new_tier: PairingTier,
    pub detail: String,
    pub recorded_at: DateTime<Utc>,
}

impl AuditLogEntry {
    pub fn tier_change(
        actor: impl Into<String>,
        tutor_id: TutorId,
        action: AuditAction,
        previous_tier: PairingTier,
        new_tier: PairingTier,
        detail: impl Into<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: format!("audit-{}", Uuid::new_v4().simple()),
            actor: actor.into(),
            tutor_id,
            action,
            previous_tier,
            new_tier,
            detail: detail.into(),
            recorded_at,
        }
    }
}
