//! Tutor matching and the pairing lifecycle.
//!
//! The matcher is a pure first-come-first-served selection over a tutor snapshot.
//! The service wraps every multi-document effect (accept, decline plus
//! reassignment, completion) in a single store batch so tutor capacity counters
//! never drift from pairing and enrollment state.

pub mod domain;
pub mod error;
pub mod lifecycle;
pub mod matcher;
pub mod memory;
pub mod reassignment;
pub mod repository;
pub mod router;
pub mod service;

#[cfg(test)]
mod tests;

pub use domain::{
    AuditAction, AuditLogEntry, CourseId, DeclineReason, Enrollment, EnrollmentStatus,
    InterviewStatus, Pairing, PairingId, PairingStatus, PairingTier, PaymentStatus,
    PerformanceMetrics, Session, SessionId, SessionStatus, StudentId, TierOverride, Tutor,
    TutorCourse, TutorId, TutorResponse, TutorStatus, UserRole,
};
pub use error::{EntityKind, NoEligibleTutor, PairingError};
pub use lifecycle::{PairingAction, TutorDecision};
pub use matcher::{MatchCandidate, MatchRequest, MatchSnapshot, Matcher};
pub use memory::InMemoryPairingStore;
pub use reassignment::{Reassignment, ReassignmentCoordinator};
pub use repository::{
    Notification, NotificationTemplate, Notifier, NotifyError, PairingStore, RepositoryError,
    StoreWrite, WriteBatch,
};
pub use router::pairing_router;
pub use service::{
    AcceptedPairing, DeclineOutcome, ExpirySweep, PairingConfig, PairingService, ResponseOutcome,
};
