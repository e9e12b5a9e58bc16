use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;

use super::domain::{CourseId, Pairing, PairingId, StudentId, TutorId};
use super::error::PairingError;
use super::lifecycle::TutorDecision;
use super::matcher::{MatchCandidate, MatchRequest};
use super::repository::{Notifier, PairingStore};
use super::service::{ExpirySweep, PairingService, ResponseOutcome};

#[derive(Debug, Deserialize)]
pub(crate) struct PairingRequestBody {
    pub(crate) student_id: StudentId,
    pub(crate) course_id: CourseId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ResponseBody {
    pub(crate) tutor_id: TutorId,
    pub(crate) decision: TutorDecision,
}

/// Router builder exposing the admin-triggered pairing endpoints.
pub fn pairing_router<S, N>(service: Arc<PairingService<S, N>>) -> Router
where
    S: PairingStore + 'static,
    N: Notifier + 'static,
{
    Router::new()
        .route("/api/v1/pairings", post(request_handler::<S, N>))
        .route("/api/v1/pairings/match", post(match_handler::<S, N>))
        .route("/api/v1/pairings/expire", post(expire_handler::<S, N>))
        .route("/api/v1/pairings/:pairing_id", get(get_handler::<S, N>))
        .route(
            "/api/v1/pairings/:pairing_id/response",
            post(respond_handler::<S, N>),
        )
        .route(
            "/api/v1/pairings/:pairing_id/activate",
            post(activate_handler::<S, N>),
        )
        .route(
            "/api/v1/pairings/:pairing_id/complete",
            post(complete_handler::<S, N>),
        )
        .with_state(service)
}

pub(crate) async fn match_handler<S, N>(
    State(service): State<Arc<PairingService<S, N>>>,
    Json(request): Json<MatchRequest>,
) -> Result<Json<MatchCandidate>, PairingError>
where
    S: PairingStore + 'static,
    N: Notifier + 'static,
{
    service.find_tutor(&request).map(Json)
}

pub(crate) async fn request_handler<S, N>(
    State(service): State<Arc<PairingService<S, N>>>,
    Json(body): Json<PairingRequestBody>,
) -> Result<(StatusCode, Json<Pairing>), PairingError>
where
    S: PairingStore + 'static,
    N: Notifier + 'static,
{
    let pairing = service.request_pairing(&body.student_id, &body.course_id, Utc::now())?;
    Ok((StatusCode::CREATED, Json(pairing)))
}

pub(crate) async fn get_handler<S, N>(
    State(service): State<Arc<PairingService<S, N>>>,
    Path(pairing_id): Path<String>,
) -> Result<Json<Pairing>, PairingError>
where
    S: PairingStore + 'static,
    N: Notifier + 'static,
{
    service.get(&PairingId(pairing_id)).map(Json)
}

pub(crate) async fn respond_handler<S, N>(
    State(service): State<Arc<PairingService<S, N>>>,
    Path(pairing_id): Path<String>,
    Json(body): Json<ResponseBody>,
) -> Result<Json<ResponseOutcome>, PairingError>
where
    S: PairingStore + 'static,
    N: Notifier + 'static,
{
    service
        .respond(
            &PairingId(pairing_id),
            &body.tutor_id,
            body.decision,
            Utc::now(),
        )
        .map(Json)
}

pub(crate) async fn activate_handler<S, N>(
    State(service): State<Arc<PairingService<S, N>>>,
    Path(pairing_id): Path<String>,
) -> Result<Json<Pairing>, PairingError>
where
    S: PairingStore + 'static,
    N: Notifier + 'static,
{
    service.activate(&PairingId(pairing_id)).map(Json)
}

pub(crate) async fn complete_handler<S, N>(
    State(service): State<Arc<PairingService<S, N>>>,
    Path(pairing_id): Path<String>,
) -> Result<Json<Pairing>, PairingError>
where
    S: PairingStore + 'static,
    N: Notifier + 'static,
{
    service.complete(&PairingId(pairing_id)).map(Json)
}

pub(crate) async fn expire_handler<S, N>(
    State(service): State<Arc<PairingService<S, N>>>,
) -> Result<Json<ExpirySweep>, PairingError>
where
    S: PairingStore + 'static,
    N: Notifier + 'static,
{
    service.expire_stale_pairings(Utc::now()).map(Json)
}
