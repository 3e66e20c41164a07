use axum::routing::get;
use axum::Router;

use crate::handlers::incidents;
use crate::state::AppState;

/// Routes mounted at `/incidents`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/{id}", get(incidents::lookup))
        .route("/{id}/history", get(incidents::history))
}
