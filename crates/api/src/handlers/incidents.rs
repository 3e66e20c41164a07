//! Incident read endpoints.

use axum::extract::{Path, State};
use axum::response::IntoResponse;
use axum::Json;
use traceam_core::types::DbId;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// GET /incidents/{id} -- public tracking view.
///
/// Unauthenticated: the link is shared with emergency contacts who have no
/// account.
pub async fn lookup(
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let view = state.engine.lookup(id).await?;
    Ok(Json(DataResponse { data: view }))
}

/// GET /incidents/{id}/history -- full location trail, owner or admin only.
pub async fn history(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let samples = state.engine.history(id, auth.requester()).await?;
    Ok(Json(DataResponse { data: samples }))
}
