//! Role gate layered on [`AuthUser`].

use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::auth::AuthUser;
use crate::error::AppError;
use crate::state::AppState;

/// An authenticated caller holding the `admin` role.
///
/// Missing credentials still surface as `UNAUTHORIZED`; a valid non-admin
/// token is `FORBIDDEN`.
pub struct RequireAdmin(pub AuthUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        if user.is_admin() {
            Ok(RequireAdmin(user))
        } else {
            tracing::warn!(user_id = user.user_id, role = %user.role, "Admin route refused");
            Err(AppError::Forbidden("Admin role required".into()))
        }
    }
}
