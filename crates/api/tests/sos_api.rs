//! HTTP-level integration tests for the SOS lifecycle endpoints.

mod common;

use axum::http::StatusCode;
use chrono::{Duration, Utc};
use common::{
    body_json, build_test_app, get, get_auth, lagos, post_auth, post_json, post_json_auth, ADMIN,
    OWNER, STRANGER, UNVERIFIED,
};
use serde_json::json;

/// Trigger as `OWNER` and return the new incident id.
async fn trigger(app: &common::TestApp) -> i64 {
    let token = app.token(OWNER);
    let response = post_json_auth(app.app(), "/api/v1/sos/trigger", lagos(), &token).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"]["incidentId"].as_i64().unwrap()
}

fn moved(seconds_ahead: i64) -> serde_json::Value {
    json!({
        "coordinates": {
            "lat": 6.6,
            "lng": 3.4,
            "capturedAt": Utc::now() + Duration::seconds(seconds_ahead),
        }
    })
}

// ---------------------------------------------------------------------------
// Trigger
// ---------------------------------------------------------------------------

#[tokio::test]
async fn trigger_creates_then_resumes() {
    let app = build_test_app();
    let token = app.token(OWNER);

    let response = post_json_auth(app.app(), "/api/v1/sos/trigger", lagos(), &token).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let first = body_json(response).await;
    assert_eq!(first["data"]["status"], "ACTIVE");
    assert_eq!(first["data"]["contactsNotified"], 1);
    assert_eq!(first["data"]["resumed"], false);
    assert!(first["data"]["trackingLink"]
        .as_str()
        .unwrap()
        .contains("6.5244"));

    let response = post_json_auth(app.app(), "/api/v1/sos/trigger", lagos(), &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let second = body_json(response).await;
    assert_eq!(second["data"]["incidentId"], first["data"]["incidentId"]);
    assert_eq!(second["data"]["resumed"], true);
}

#[tokio::test]
async fn trigger_without_token_is_unauthorized() {
    let app = build_test_app();
    let response = post_json(app.app(), "/api/v1/sos/trigger", lagos()).await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn garbage_token_is_unauthorized() {
    let app = build_test_app();
    let response = post_json_auth(app.app(), "/api/v1/sos/trigger", lagos(), "not-a-jwt").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn unverified_user_is_blocked_with_reason() {
    let app = build_test_app();
    let response = post_json_auth(
        app.app(),
        "/api/v1/sos/trigger",
        lagos(),
        &app.token(UNVERIFIED),
    )
    .await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    let json = body_json(response).await;
    assert_eq!(json["code"], "SIGNAL_BLOCKED");
    assert_eq!(json["reason"], "KYC_NOT_APPROVED");
}

#[tokio::test]
async fn out_of_range_coordinates_are_invalid_location() {
    let app = build_test_app();
    let body = json!({ "coordinates": { "lat": 91.0, "lng": 3.0 } });
    let response = post_json_auth(app.app(), "/api/v1/sos/trigger", body, &app.token(OWNER)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_LOCATION");
}

#[tokio::test]
async fn missing_coordinates_are_invalid_location() {
    let app = build_test_app();
    let body = json!({ "lat": 6.5 });
    let response = post_json_auth(app.app(), "/api/v1/sos/trigger", body, &app.token(OWNER)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_LOCATION");
}

// ---------------------------------------------------------------------------
// Location updates
// ---------------------------------------------------------------------------

#[tokio::test]
async fn location_update_moves_incident() {
    let app = build_test_app();
    let id = trigger(&app).await;

    let response = post_json_auth(
        app.app(),
        &format!("/api/v1/sos/{id}/location"),
        moved(5),
        &app.token(OWNER),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "MOVING");
    assert_eq!(json["data"]["historyLen"], 2);
    assert_eq!(json["data"]["currentLocation"]["lat"], 6.6);
}

#[tokio::test]
async fn older_sample_is_stale() {
    let app = build_test_app();
    let id = trigger(&app).await;
    let uri = format!("/api/v1/sos/{id}/location");

    let response = post_json_auth(app.app(), &uri, moved(10), &app.token(OWNER)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_json_auth(app.app(), &uri, moved(5), &app.token(OWNER)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "STALE_SAMPLE");
}

#[tokio::test]
async fn location_after_resolve_is_inactive() {
    let app = build_test_app();
    let id = trigger(&app).await;

    let response = post_auth(app.app(), &format!("/api/v1/sos/{id}/resolve"), &app.token(OWNER)).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = post_json_auth(
        app.app(),
        &format!("/api/v1/sos/{id}/location"),
        moved(5),
        &app.token(OWNER),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(body_json(response).await["code"], "INCIDENT_INACTIVE");
}

// ---------------------------------------------------------------------------
// Resolve
// ---------------------------------------------------------------------------

#[tokio::test]
async fn resolve_is_idempotent_for_owner() {
    let app = build_test_app();
    let id = trigger(&app).await;
    let uri = format!("/api/v1/sos/{id}/resolve");

    let first = body_json(post_auth(app.app(), &uri, &app.token(OWNER)).await).await;
    assert_eq!(first["data"]["status"], "RESOLVED");
    assert_eq!(first["data"]["alreadyResolved"], false);

    let response = post_auth(app.app(), &uri, &app.token(OWNER)).await;
    assert_eq!(response.status(), StatusCode::OK);
    let second = body_json(response).await;
    assert_eq!(second["data"]["alreadyResolved"], true);
    assert_eq!(second["data"]["endedAt"], first["data"]["endedAt"]);
}

#[tokio::test]
async fn stranger_cannot_resolve_but_admin_can() {
    let app = build_test_app();
    let id = trigger(&app).await;
    let uri = format!("/api/v1/sos/{id}/resolve");

    let response = post_auth(app.app(), &uri, &app.token(STRANGER)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(body_json(response).await["code"], "FORBIDDEN");

    let response = post_auth(app.app(), &uri, &app.token(ADMIN)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["status"], "RESOLVED");
}

#[tokio::test]
async fn resolve_unknown_incident_is_not_found() {
    let app = build_test_app();
    let response = post_auth(app.app(), "/api/v1/sos/4242/resolve", &app.token(OWNER)).await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["code"], "NOT_FOUND");
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[tokio::test]
async fn active_returns_open_incident_or_null() {
    let app = build_test_app();

    let json = body_json(get_auth(app.app(), "/api/v1/sos/active", &app.token(OWNER)).await).await;
    assert!(json["data"].is_null());

    let id = trigger(&app).await;
    let json = body_json(get_auth(app.app(), "/api/v1/sos/active", &app.token(OWNER)).await).await;
    assert_eq!(json["data"]["id"], id);
    assert_eq!(json["data"]["identifier"], "Ada");
}

#[tokio::test]
async fn lookup_is_public() {
    let app = build_test_app();
    let id = trigger(&app).await;

    let response = get(app.app(), &format!("/api/v1/incidents/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["status"], "ACTIVE");
    assert_eq!(json["data"]["currentLocation"]["lat"], 6.5244);
    assert!(json["data"]["lastUpdate"].is_string());
    assert!(json["data"].get("locationHistory").is_none());
}

#[tokio::test]
async fn history_is_owner_or_admin_only() {
    let app = build_test_app();
    let id = trigger(&app).await;
    let uri = format!("/api/v1/incidents/{id}/history");

    let response = get(app.app(), &uri).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = get_auth(app.app(), &uri, &app.token(STRANGER)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    for user in [OWNER, ADMIN] {
        let response = get_auth(app.app(), &uri, &app.token(user)).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["data"].as_array().unwrap().len(), 1);
    }
}

// ---------------------------------------------------------------------------
// Admin search
// ---------------------------------------------------------------------------

#[tokio::test]
async fn admin_search_by_email_and_identifier() {
    let app = build_test_app();
    let id = trigger(&app).await;
    let token = app.token(ADMIN);

    for q in ["ada@example.com", "ADA"] {
        let response = get_auth(app.app(), &format!("/api/v1/admin/incidents?q={q}"), &token).await;
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let results = json["data"].as_array().unwrap();
        assert_eq!(results.len(), 1, "query {q}");
        assert_eq!(results[0]["id"], id);
    }
}

#[tokio::test]
async fn admin_search_by_phone_digits() {
    let app = build_test_app();
    let id = trigger(&app).await;
    let token = app.token(ADMIN);

    let response = get_auth(app.app(), "/api/v1/admin/incidents?q=0803-000-0001", &token).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    let results = json["data"].as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["id"], id);

    let response = get_auth(app.app(), "/api/v1/admin/incidents?q=08039999999", &token).await;
    assert_eq!(body_json(response).await["data"], json!([]));
}

#[tokio::test]
async fn admin_search_requires_admin_role() {
    let app = build_test_app();
    let response = get_auth(app.app(), "/api/v1/admin/incidents?q=ada", &app.token(OWNER)).await;

    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn empty_search_is_invalid_query() {
    let app = build_test_app();
    let response = get_auth(app.app(), "/api/v1/admin/incidents?q=", &app.token(ADMIN)).await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "INVALID_QUERY");
}
