//! Handlers for the caller's own SOS lifecycle.
//!
//! All endpoints require authentication.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use traceam_core::error::SosError;
use traceam_core::geo::Coordinates;
use traceam_core::types::DbId;

use crate::error::AppResult;
use crate::middleware::auth::AuthUser;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of trigger and location requests.
#[derive(Debug, Deserialize)]
pub struct LocationRequest {
    pub coordinates: Coordinates,
}

/// Unreadable coordinates are an invalid location, not a generic 4xx.
fn coordinates(payload: Result<Json<LocationRequest>, JsonRejection>) -> AppResult<Coordinates> {
    payload
        .map(|Json(body)| body.coordinates)
        .map_err(|rejection| SosError::InvalidLocation(rejection.body_text()).into())
}

// ---------------------------------------------------------------------------
// POST /sos/trigger
// ---------------------------------------------------------------------------

/// Start an SOS, or resume the caller's open one.
///
/// Returns 201 when a new incident was created and 200 when resumed.
pub async fn trigger(
    auth: AuthUser,
    State(state): State<AppState>,
    payload: Result<Json<LocationRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let coords = coordinates(payload)?;
    let triggered = state.engine.trigger(auth.user_id, &coords).await?;

    let status = if triggered.receipt.resumed {
        StatusCode::OK
    } else {
        StatusCode::CREATED
    };
    // The fan-out task runs detached.
    drop(triggered.notification);

    Ok((status, Json(DataResponse { data: triggered.receipt })))
}

// ---------------------------------------------------------------------------
// POST /sos/{id}/location
// ---------------------------------------------------------------------------

pub async fn update_location(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
    payload: Result<Json<LocationRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let coords = coordinates(payload)?;
    let ack = state.engine.update_location(id, &coords).await?;
    tracing::trace!(incident_id = id, user_id = auth.user_id, "Location accepted");
    Ok(Json(DataResponse { data: ack }))
}

// ---------------------------------------------------------------------------
// POST /sos/{id}/resolve
// ---------------------------------------------------------------------------

/// Stop an SOS. Admins may stop any incident.
pub async fn resolve(
    auth: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let receipt = state.engine.resolve(id, auth.requester()).await?;
    Ok(Json(DataResponse { data: receipt }))
}

// ---------------------------------------------------------------------------
// GET /sos/active
// ---------------------------------------------------------------------------

/// The caller's open incident, or `null`.
pub async fn active(auth: AuthUser, State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let view = state.engine.active_for_user(auth.user_id).await?;
    Ok(Json(DataResponse { data: view }))
}
