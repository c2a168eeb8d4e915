//! HTTP surface: routing, identity headers and error mapping.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use booking::api::{AppState, build_router};
use common::{Harness, session};
use serde_json::{Value, json};
use tower::ServiceExt;
use uuid::Uuid;

fn app(h: &Harness) -> Router {
    build_router(AppState::new(h.engine.clone()))
}

async fn call(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn guest_claim(email: &str) -> Value {
    json!({ "kind": "guest", "name": "Guest", "email": email })
}

#[tokio::test]
async fn test_health() {
    let h = Harness::at("2025-03-03T08:00:00Z");
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, body) = call(&app(&h), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_scheduling_requires_staff() {
    let h = Harness::at("2025-03-03T08:00:00Z");
    let app = app(&h);
    let definition = json!({
        "title": "Yoga",
        "trainer": "Mia",
        "date": "2025-03-03",
        "start_time": "18:00:00",
        "end_time": "19:00:00",
        "max_participants": 12,
        "registration_deadline_minutes": 60,
        "cancellation_deadline_minutes": 120
    });
    let staff = Uuid::new_v4().to_string();

    let (anonymous, _) = call(&app, json_request(Method::POST, "/api/sessions", &definition)).await;
    assert_eq!(anonymous, StatusCode::UNAUTHORIZED);

    let mut member_only = json_request(Method::POST, "/api/sessions", &definition);
    member_only.headers_mut().insert("x-member-id", staff.parse().unwrap());
    let (forbidden, body) = call(&app, member_only).await;
    assert_eq!(forbidden, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "FORBIDDEN");

    let mut as_staff = json_request(Method::POST, "/api/sessions", &definition);
    as_staff.headers_mut().insert("x-member-id", staff.parse().unwrap());
    as_staff.headers_mut().insert("x-admin", "true".parse().unwrap());
    let (created, body) = call(&app, as_staff).await;
    assert_eq!(created, StatusCode::CREATED);
    assert_eq!(body["duration_minutes"], 60);
    assert_eq!(body["max_participants"], 12);
}

#[tokio::test]
async fn test_claim_waitlist_and_cancel_round_trip() {
    let h = Harness::at("2025-03-03T08:00:00Z");
    let session_id = h.schedule(session("2025-03-03", "18:00", 1)).await;
    let app = app(&h);
    let claims_uri = format!("/api/sessions/{session_id}/claims");

    let (seated, first) = call(&app, json_request(Method::POST, &claims_uri, &guest_claim("ana@example.com"))).await;
    assert_eq!(seated, StatusCode::CREATED);
    assert_eq!(first["status"], "registered");

    let (queued, second) = call(&app, json_request(Method::POST, &claims_uri, &guest_claim("bo@example.com"))).await;
    assert_eq!(queued, StatusCode::CREATED);
    assert_eq!(second["status"], "waitlisted");
    assert_eq!(second["waitlist_position"], 1);

    let (duplicate, body) = call(&app, json_request(Method::POST, &claims_uri, &guest_claim("ANA@example.com"))).await;
    assert_eq!(duplicate, StatusCode::CONFLICT);
    assert_eq!(body["code"], "DUPLICATE_CLAIM");

    let summary = Request::builder()
        .uri(format!("/api/sessions/{session_id}"))
        .body(Body::empty())
        .unwrap();
    let (_, body) = call(&app, summary).await;
    assert_eq!(body["occupancy_label"], "1/1 belegt, 1 Warteliste");

    let cancel = |email: &str| {
        Request::builder()
            .method(Method::DELETE)
            .uri(format!("/api/claims/{}", first["claim_id"].as_str().unwrap()))
            .header("x-guest-email", email)
            .body(Body::empty())
            .unwrap()
    };

    let (refused, body) = call(&app, cancel("bo@example.com")).await;
    assert_eq!(refused, StatusCode::CONFLICT);
    assert_eq!(body["code"], "NOT_CLAIMANT");

    let (ok, body) = call(&app, cancel("ana@example.com")).await;
    assert_eq!(ok, StatusCode::OK);
    assert_eq!(body["result"], "cancelled");
    assert_eq!(body["promoted"], json!([second["claim_id"]]));

    let (again, body) = call(&app, cancel("ana@example.com")).await;
    assert_eq!(again, StatusCode::OK);
    assert_eq!(body["result"], "already_cancelled");
}

#[tokio::test]
async fn test_member_claim_needs_a_member_id() {
    let h = Harness::at("2025-03-03T08:00:00Z");
    let session_id = h.schedule(session("2025-03-03", "18:00", 3)).await;
    let app = app(&h);
    let uri = format!("/api/sessions/{session_id}/claims");

    let (missing, _) = call(&app, json_request(Method::POST, &uri, &json!({ "kind": "member" }))).await;
    assert_eq!(missing, StatusCode::UNAUTHORIZED);

    let mut malformed = json_request(Method::POST, &uri, &json!({ "kind": "member" }));
    malformed.headers_mut().insert("x-member-id", "not-a-uuid".parse().unwrap());
    let (bad, _) = call(&app, malformed).await;
    assert_eq!(bad, StatusCode::BAD_REQUEST);

    let mut member = json_request(Method::POST, &uri, &json!({ "kind": "member" }));
    member
        .headers_mut()
        .insert("x-member-id", Uuid::new_v4().to_string().parse().unwrap());
    let (created, body) = call(&app, member).await;
    assert_eq!(created, StatusCode::CREATED);
    assert_eq!(body["occupancy"]["registered"], 1);
}

#[tokio::test]
async fn test_unknown_ids_are_404() {
    let h = Harness::at("2025-03-03T08:00:00Z");
    let app = app(&h);

    let session = Request::builder()
        .uri(format!("/api/sessions/{}/roster", Uuid::new_v4()))
        .body(Body::empty())
        .unwrap();
    let (status, body) = call(&app, session).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let claim = Request::builder()
        .uri(format!("/api/claims/{}", Uuid::new_v4()))
        .body(Body::empty())
        .unwrap();
    assert_eq!(call(&app, claim).await.0, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_sweep_endpoint_runs_without_identity() {
    let h = Harness::at("2025-03-03T17:30:00Z");
    let session_id = h.schedule(session("2025-03-03", "18:00", 10)).await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/sweeps/low-attendance")
        .body(Body::empty())
        .unwrap();

    let (status, body) = call(&app(&h), request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["checked"], 1);
    assert_eq!(body["cancelled"], json!([session_id]));
}

#[tokio::test]
async fn test_metrics_disabled_is_404() {
    let h = Harness::at("2025-03-03T08:00:00Z");
    let request = Request::builder().uri("/metrics").body(Body::empty()).unwrap();

    assert_eq!(call(&app(&h), request).await.0, StatusCode::NOT_FOUND);
}
