use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use traceam_core::error::SosError;

/// Application-level error type for HTTP handlers.
///
/// Produces `{ "error", "code" }` JSON; `SIGNAL_BLOCKED` also carries
/// `reason`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A failed incident lifecycle operation.
    #[error(transparent)]
    Sos(#[from] SosError),

    /// The caller is authenticated but lacks the required role.
    #[error("Forbidden: {0}")]
    Forbidden(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let mut reason = None;
        let (status, code, message) = match &self {
            AppError::Sos(err) => {
                if let SosError::SignalBlocked(deny) = err {
                    reason = Some(deny.as_str());
                }
                let message = match err {
                    SosError::Store(store) => {
                        tracing::error!(error = %store, "Incident store unavailable");
                        "Incident store temporarily unavailable, retry".to_string()
                    }
                    other => other.to_string(),
                };
                (sos_status(err), err.code(), message)
            }

            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg.clone()),
        };

        let mut body = json!({
            "error": message,
            "code": code,
        });
        if let Some(reason) = reason {
            body["reason"] = json!(reason);
        }

        (status, axum::Json(body)).into_response()
    }
}

/// HTTP status for each lifecycle error.
fn sos_status(err: &SosError) -> StatusCode {
    match err {
        SosError::InvalidLocation(_) | SosError::InvalidQuery(_) => StatusCode::BAD_REQUEST,
        SosError::Unauthorized => StatusCode::UNAUTHORIZED,
        SosError::SignalBlocked(_) | SosError::Forbidden => StatusCode::FORBIDDEN,
        SosError::NotFound(_) | SosError::UserNotFound(_) => StatusCode::NOT_FOUND,
        SosError::IncidentInactive { .. }
        | SosError::StaleSample { .. }
        | SosError::AlreadyResolved(_) => StatusCode::CONFLICT,
        SosError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}
