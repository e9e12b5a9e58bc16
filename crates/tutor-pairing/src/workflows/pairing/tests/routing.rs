use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Request, StatusCode};
use axum::response::IntoResponse;
use serde_json::{json, Value};
use tower::ServiceExt;

use super::common::*;
use crate::workflows::pairing::domain::PairingTier;
use crate::workflows::pairing::router::{get_handler, pairing_router};
use crate::workflows::pairing::service::{PairingConfig, PairingService};

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(&body).expect("serializes")))
        .expect("request builds")
}

fn router_with_tutors(students: &[&str]) -> axum::Router {
    let store = seeded_store(
        vec![
            tutor("tut-x", 1, PairingTier::One, 0),
            tutor("tut-y", 2, PairingTier::One, 0),
        ],
        students,
    );
    let (service, _) = build_service(store);
    pairing_router(Arc::new(service))
}

#[tokio::test]
async fn request_route_creates_pairing() {
    let router = router_with_tutors(&["stu-1"]);

    let response = router
        .oneshot(post_json(
            "/api/v1/pairings",
            json!({ "student_id": "stu-1", "course_id": COURSE }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CREATED);
    let payload = read_json_body(response).await;
    assert_eq!(payload["tutor_id"], "tut-x");
    assert_eq!(payload["status"], "pending");
}

#[tokio::test]
async fn match_route_reports_stage_reason() {
    let router = router_with_tutors(&[]);

    let response = router
        .oneshot(post_json(
            "/api/v1/pairings/match",
            json!({ "student_id": "stu-1", "course_id": "chemistry-3" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let payload = read_json_body(response).await;
    assert_eq!(payload["kind"], "no_eligible_tutor");
    assert_eq!(payload["reason"], "no_course_match");
}

#[tokio::test]
async fn response_route_rejects_other_tutor() {
    let store = seeded_store(
        vec![
            tutor("tut-x", 1, PairingTier::One, 0),
            tutor("tut-y", 2, PairingTier::One, 0),
        ],
        &["stu-1"],
    );
    let (service, _) = build_service(store);
    let pairing = service
        .request_pairing(&student("stu-1"), &course(), at(3, 9))
        .expect("requested");
    let router = pairing_router(Arc::new(service));

    let response = router
        .oneshot(post_json(
            &format!("/api/v1/pairings/{}/response", pairing.id),
            json!({ "tutor_id": "tut-y", "decision": "accept" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let payload = read_json_body(response).await;
    assert_eq!(payload["kind"], "unauthorized");
}

#[tokio::test]
async fn response_route_reports_decline_outcome() {
    let store = seeded_store(
        vec![
            tutor("tut-x", 1, PairingTier::One, 0),
            tutor("tut-y", 2, PairingTier::One, 0),
        ],
        &["stu-1"],
    );
    let (service, _) = build_service(store);
    let pairing = service
        .request_pairing(&student("stu-1"), &course(), at(3, 9))
        .expect("requested");
    let router = pairing_router(Arc::new(service));

    let response = router
        .oneshot(post_json(
            &format!("/api/v1/pairings/{}/response", pairing.id),
            json!({ "tutor_id": "tut-x", "decision": "decline" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["decision"], "declined");
    assert_eq!(payload["declined"]["status"], "declined");
    assert_eq!(payload["reassignment"]["outcome"], "reassigned");
    assert_eq!(payload["reassignment"]["pairing"]["tutor_id"], "tut-y");
}

#[tokio::test]
async fn activate_route_conflicts_on_pending_pairing() {
    let store = seeded_store(vec![tutor("tut-x", 1, PairingTier::One, 0)], &["stu-1"]);
    let (service, _) = build_service(store);
    let pairing = service
        .request_pairing(&student("stu-1"), &course(), at(3, 9))
        .expect("requested");
    let router = pairing_router(Arc::new(service));

    let response = router
        .oneshot(
            Request::post(format!("/api/v1/pairings/{}/activate", pairing.id))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert_eq!(payload["kind"], "invalid_transition");
}

#[tokio::test]
async fn get_handler_returns_not_found() {
    let (service, _) = build_service(seeded_store(Vec::new(), &[]));

    let response = get_handler(State(Arc::new(service)), Path("pair-missing".to_string()))
        .await
        .into_response();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_handler_maps_unavailable_store() {
    let service = Arc::new(PairingService::new(
        Arc::new(UnavailableStore),
        Arc::new(RecordingNotifier::default()),
        PairingConfig::default(),
    ));

    let response = get_handler(State(service), Path("pair-1".to_string()))
        .await
        .into_response();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}
