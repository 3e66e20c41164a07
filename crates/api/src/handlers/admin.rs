//! Administrator endpoints.

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::rbac::RequireAdmin;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

/// GET /admin/incidents?q= -- search by owner email or identifier.
pub async fn search_incidents(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> AppResult<impl IntoResponse> {
    let incidents = state.engine.search(&params.q).await?;
    tracing::info!(admin_id = admin.user_id, results = incidents.len(), "Admin incident search");
    Ok(Json(DataResponse { data: incidents }))
}
