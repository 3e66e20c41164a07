pub mod admin;
pub mod health;
pub mod incidents;
pub mod sos;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /sos/trigger                 start or resume an SOS (POST)
/// /sos/active                  caller's open incident (GET)
/// /sos/{id}/location           stream a location sample (POST)
/// /sos/{id}/resolve            stop an SOS (POST)
///
/// /incidents/{id}              public tracking view (GET)
/// /incidents/{id}/history      location trail, owner or admin (GET)
///
/// /admin/incidents?q=          incident search, admin only (GET)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/sos", sos::router())
        .nest("/incidents", incidents::router())
        .nest("/admin", admin::router())
}
