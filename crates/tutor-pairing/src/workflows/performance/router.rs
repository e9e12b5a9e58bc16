use std::sync::Arc;

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use super::super::pairing::domain::{AuditLogEntry, SessionId, Tutor, TutorId};
use super::super::pairing::error::PairingError;
use super::super::pairing::repository::{Notifier, PairingStore};
use super::service::{
    PerformanceReview, PerformanceUpdate, SessionOutcome, SessionRecorded, TierOverrideRequest,
    TutorPerformanceService,
};

#[derive(Debug, Deserialize)]
pub(crate) struct ClearOverrideBody {
    pub(crate) admin_id: String,
}

/// Router builder for scoring, tier administration, and session outcomes.
pub fn performance_router<S, N>(service: Arc<TutorPerformanceService<S, N>>) -> Router
where
    S: PairingStore + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route(
            "/api/v1/tutors/:tutor_id/performance",
            get(review_handler::<S, N>),
        )
        .route(
            "/api/v1/tutors/:tutor_id/performance/recalculate",
            post(recalculate_handler::<S, N>),
        )
        .route(
            "/api/v1/tutors/:tutor_id/tier",
            axum::routing::put(override_handler::<S, N>).delete(clear_override_handler::<S, N>),
        )
        .route(
            "/api/v1/tutors/:tutor_id/audit",
            get(audit_handler::<S, N>),
        )
        .route(
            "/api/v1/tutors/:tutor_id/onboarding",
            post(onboarding_handler::<S, N>),
        )
        .route(
            "/api/v1/sessions/:session_id/outcome",
            post(session_outcome_handler::<S, N>),
        )
        .with_state(service)
}

pub(crate) async fn review_handler<S, N>(
    State(service): State<Arc<TutorPerformanceService<S, N>>>,
    Path(tutor_id): Path<String>,
) -> Result<Json<PerformanceReview>, PairingError>
where
    S: PairingStore + 'static,
    N: Notifier + 'static,
{
    service.review(&TutorId(tutor_id)).map(Json)
}

pub(crate) async fn recalculate_handler<S, N>(
    State(service): State<Arc<TutorPerformanceService<S, N>>>,
    Path(tutor_id): Path<String>,
) -> Result<Json<PerformanceUpdate>, PairingError>
where
    S: PairingStore + 'static,
    N: Notifier + 'static,
{
    service.recalculate(&TutorId(tutor_id), Utc::now()).map(Json)
}

pub(crate) async fn override_handler<S, N>(
    State(service): State<Arc<TutorPerformanceService<S, N>>>,
    Path(tutor_id): Path<String>,
    Json(request): Json<TierOverrideRequest>,
) -> Result<Json<Tutor>, PairingError>
where
    S: PairingStore + 'static,
    N: Notifier + 'static,
{
    service
        .override_tier(&TutorId(tutor_id), request, Utc::now())
        .map(Json)
}

pub(crate) async fn clear_override_handler<S, N>(
    State(service): State<Arc<TutorPerformanceService<S, N>>>,
    Path(tutor_id): Path<String>,
    Json(body): Json<ClearOverrideBody>,
) -> Result<Json<Tutor>, PairingError>
where
    S: PairingStore + 'static,
    N: Notifier + 'static,
{
    service
        .clear_tier_override(&TutorId(tutor_id), &body.admin_id, Utc::now())
        .map(Json)
}

pub(crate) async fn audit_handler<S, N>(
    State(service): State<Arc<TutorPerformanceService<S, N>>>,
    Path(tutor_id): Path<String>,
) -> Result<Json<Vec<AuditLogEntry>>, PairingError>
where
    S: PairingStore + 'static,
    N: Notifier + 'static,
{
    service.audit_log(&TutorId(tutor_id)).map(Json)
}

pub(crate) async fn onboarding_handler<S, N>(
    State(service): State<Arc<TutorPerformanceService<S, N>>>,
    Path(tutor_id): Path<String>,
) -> Result<Json<Tutor>, PairingError>
where
    S: PairingStore + 'static,
    N: Notifier + 'static,
{
    service
        .complete_onboarding(&TutorId(tutor_id), Utc::now())
        .map(Json)
}

pub(crate) async fn session_outcome_handler<S, N>(
    State(service): State<Arc<TutorPerformanceService<S, N>>>,
    Path(session_id): Path<String>,
    Json(outcome): Json<SessionOutcome>,
) -> Result<Json<SessionRecorded>, PairingError>
where
    S: PairingStore + 'static,
    N: Notifier + 'static,
{
    service
        .record_session_outcome(&SessionId(session_id), outcome, Utc::now())
        .map(Json)
}
