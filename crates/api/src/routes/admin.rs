use axum::routing::get;
use axum::Router;

use crate::handlers::admin;
use crate::state::AppState;

/// Routes mounted at `/admin`. Handlers enforce the `admin` role.
pub fn router() -> Router<AppState> {
    Router::new().route("/incidents", get(admin::search_incidents))
}
