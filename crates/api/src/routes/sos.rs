use axum::routing::{get, post};
use axum::Router;

use crate::handlers::sos;
use crate::state::AppState;

/// Routes mounted at `/sos`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/trigger", post(sos::trigger))
        .route("/active", get(sos::active))
        .route("/{id}/location", post(sos::update_location))
        .route("/{id}/resolve", post(sos::resolve))
}
