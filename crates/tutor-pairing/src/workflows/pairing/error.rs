use std::fmt;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::json;

use super::domain::{PairingId, PairingStatus, TutorId};
use super::lifecycle::{InvalidTransition, PairingAction};
use super::repository::RepositoryError;

/// Entity collections addressed by lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Tutor,
    Pairing,
    Enrollment,
    Session,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            EntityKind::Tutor => "tutor",
            EntityKind::Pairing => "pairing",
            EntityKind::Enrollment => "enrollment",
            EntityKind::Session => "session",
        };
        f.write_str(label)
    }
}

/// Stage at which the matcher ran out of candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[serde(rename_all = "snake_case")]
pub enum NoEligibleTutor {
    #[error("no active, onboarded tutors")]
    NoActiveTutors,
    #[error("no active tutor has passed the interview for this course")]
    NoCourseMatch,
    #[error("every qualified tutor is at capacity or excluded")]
    NoCapacity,
}

/// Error raised by the pairing and performance services.
#[derive(Debug, thiserror::Error)]
pub enum PairingError {
    #[error("{entity} '{id}' not found")]
    NotFound { entity: EntityKind, id: String },
    #[error("tutor '{responder}' is not assigned to pairing '{pairing_id}'")]
    Unauthorized {
        pairing_id: PairingId,
        responder: TutorId,
    },
    #[error("cannot {action} a pairing that is {from}")]
    InvalidTransition {
        from: PairingStatus,
        action: PairingAction,
    },
    #[error("no eligible tutor: {0}")]
    NoEligibleTutor(NoEligibleTutor),
    #[error("tutor '{tutor_id}' would hold {students} student(s) against a limit of {limit}")]
    CapacityViolation {
        tutor_id: TutorId,
        students: u32,
        limit: u32,
    },
    #[error("invalid request: {0}")]
    Validation(String),
    #[error(transparent)]
    Storage(RepositoryError),
}

impl PairingError {
    pub fn not_found(entity: EntityKind, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub const fn kind(&self) -> &'static str {
        match self {
            PairingError::NotFound { .. } => "not_found",
            PairingError::Unauthorized { .. } => "unauthorized",
            PairingError::InvalidTransition { .. } => "invalid_transition",
            PairingError::NoEligibleTutor(_) => "no_eligible_tutor",
            PairingError::CapacityViolation { .. } => "capacity_violation",
            PairingError::Validation(_) => "validation_error",
            PairingError::Storage(_) => "storage_error",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            PairingError::NotFound { .. } => StatusCode::NOT_FOUND,
            PairingError::Unauthorized { .. } => StatusCode::FORBIDDEN,
            PairingError::InvalidTransition { .. } | PairingError::CapacityViolation { .. } => {
                StatusCode::CONFLICT
            }
            PairingError::NoEligibleTutor(_) | PairingError::Validation(_) => {
                StatusCode::UNPROCESSABLE_ENTITY
            }
            PairingError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl From<InvalidTransition> for PairingError {
    fn from(value: InvalidTransition) -> Self {
        Self::InvalidTransition {
            from: value.from,
            action: value.action,
        }
    }
}

impl From<NoEligibleTutor> for PairingError {
    fn from(value: NoEligibleTutor) -> Self {
        Self::NoEligibleTutor(value)
    }
}

impl From<RepositoryError> for PairingError {
    fn from(value: RepositoryError) -> Self {
        match value {
            RepositoryError::CapacityExhausted {
                tutor_id,
                students,
                limit,
            } => Self::CapacityViolation {
                tutor_id,
                students,
                limit,
            },
            other => Self::Storage(other),
        }
    }
}

impl IntoResponse for PairingError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let mut body = json!({
            "error": self.to_string(),
            "kind": self.kind(),
        });
        if let PairingError::NoEligibleTutor(reason) = &self {
            body["reason"] = json!(reason);
        }
        (status, Json(body)).into_response()
    }
}
