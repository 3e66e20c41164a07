//! JWT-based authentication extractor.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use traceam_core::error::SosError;
use traceam_core::types::DbId;
use traceam_core::user::ROLE_ADMIN;
use traceam_sos::Requester;

use crate::error::AppError;
use crate::state::AppState;

/// Authenticated user extracted from the `Authorization: Bearer` header.
///
/// Any missing, malformed or expired token is rejected with `UNAUTHORIZED`.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: DbId,
    pub role: String,
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }

    pub fn requester(&self) -> Requester {
        Requester {
            user_id: self.user_id,
            is_admin: self.is_admin(),
        }
    }
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .ok_or(AppError::Sos(SosError::Unauthorized))?;

        let claims = state.jwt.verify(token).map_err(|e| {
            tracing::debug!(error = %e, "Rejected bearer token");
            AppError::Sos(SosError::Unauthorized)
        })?;

        Ok(AuthUser {
            user_id: claims.sub,
            role: claims.role,
        })
    }
}
