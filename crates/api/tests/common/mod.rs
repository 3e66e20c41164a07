#![allow(dead_code)]

use std::sync::Arc;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response};
use axum::Router;
use chrono::Utc;
use http_body_util::BodyExt;
use tower::ServiceExt;

use traceam_api::auth::jwt::{JwtConfig, JwtKeys};
use traceam_api::config::ServerConfig;
use traceam_api::router::build_app_router;
use traceam_api::state::AppState;
use traceam_core::contacts::{ContactEntry, EmergencyContacts};
use traceam_core::types::DbId;
use traceam_core::user::{UserProfile, VerificationStatus, ROLE_ADMIN, ROLE_USER};
use traceam_events::{DeliveryError, EventBus, NotificationDispatcher, OfflineChannel, SmsChannel};
use traceam_sos::{EngineConfig, IncidentEngine, MemoryIncidentStore, MemoryUserStore};

pub const OWNER: DbId = 1;
pub const STRANGER: DbId = 2;
pub const UNVERIFIED: DbId = 3;
pub const ADMIN: DbId = 99;

/// SMS channel that accepts everything.
struct AcceptingSms;

#[async_trait]
impl SmsChannel for AcceptingSms {
    async fn send(&self, _to: &[String], _message: &str) -> Result<(), DeliveryError> {
        Ok(())
    }
}

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:3001".to_string()],
        request_timeout_secs: 30,
        shutdown_timeout_secs: 5,
        database_url: "postgres://unused".to_string(),
        database_max_connections: 1,
        jwt: JwtConfig {
            secret: "integration-test-secret-long-enough".to_string(),
            access_token_expiry_mins: 15,
            leeway_secs: 0,
        },
    }
}

/// A running app over in-memory stores, plus handles to seed and break them.
pub struct TestApp {
    pub router: Router,
    pub incidents: Arc<MemoryIncidentStore>,
    pub users: Arc<MemoryUserStore>,
    pub jwt: Arc<JwtKeys>,
}

impl TestApp {
    /// A fresh clone of the router for one `oneshot` call.
    pub fn app(&self) -> Router {
        self.router.clone()
    }

    pub fn token(&self, user_id: DbId) -> String {
        let role = if user_id == ADMIN { ROLE_ADMIN } else { ROLE_USER };
        self.jwt.issue(user_id, role).unwrap()
    }
}

/// Build the full router, seeded with an approved owner, a second approved
/// user, an unverified user and an admin.
pub fn build_test_app() -> TestApp {
    let config = test_config();
    let incidents = Arc::new(MemoryIncidentStore::new());
    let users = Arc::new(MemoryUserStore::new(Arc::clone(&incidents)));

    users.upsert(user(OWNER, "Ada", VerificationStatus::Approved));
    users.upsert(user(STRANGER, "Bola", VerificationStatus::Approved));
    users.upsert(user(UNVERIFIED, "Chidi", VerificationStatus::Pending));
    let mut admin = user(ADMIN, "Admin", VerificationStatus::Approved);
    admin.role = ROLE_ADMIN.into();
    users.upsert(admin);

    let dispatcher = Arc::new(NotificationDispatcher::new(
        Arc::new(AcceptingSms),
        Arc::new(OfflineChannel::email()),
    ));
    let engine = IncidentEngine::new(
        incidents.clone(),
        users.clone(),
        dispatcher,
        Arc::new(EventBus::default()),
        EngineConfig::default(),
    );

    let jwt = Arc::new(JwtKeys::new(&config.jwt));
    let state = AppState {
        engine: Arc::new(engine),
        config: Arc::new(config.clone()),
        jwt: Arc::clone(&jwt),
    };

    TestApp {
        router: build_app_router(state, &config),
        incidents,
        users,
        jwt,
    }
}

fn user(id: DbId, name: &str, status: VerificationStatus) -> UserProfile {
    UserProfile {
        id,
        name: name.into(),
        email: format!("{}@example.com", name.to_lowercase()),
        phone: format!("0803 000 {id:04}"),
        role: ROLE_USER.into(),
        verification_status: status,
        emergency_contacts: EmergencyContacts {
            partner: Some(ContactEntry::with_phone("08011112222")),
            ..EmergencyContacts::default()
        },
        active_incident_id: None,
        created_at: Utc::now(),
    }
}

// ---------------------------------------------------------------------------
// Request helpers
// ---------------------------------------------------------------------------

pub async fn get(app: Router, uri: &str) -> Response<Body> {
    let request = Request::get(uri).body(Body::empty()).unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn get_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::get(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json(app: Router, uri: &str, body: serde_json::Value) -> Response<Body> {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_json_auth(
    app: Router,
    uri: &str,
    body: serde_json::Value,
    token: &str,
) -> Response<Body> {
    let request = Request::post(uri)
        .header("content-type", "application/json")
        .header("authorization", format!("Bearer {token}"))
        .body(Body::from(body.to_string()))
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn post_auth(app: Router, uri: &str, token: &str) -> Response<Body> {
    let request = Request::post(uri)
        .header("authorization", format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();
    app.oneshot(request).await.unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn lagos() -> serde_json::Value {
    serde_json::json!({ "coordinates": { "lat": 6.5244, "lng": 3.3792 } })
}
