use crate::authorization::DenyReason;
use crate::incident::IncidentStatus;
use crate::store::StoreError;
use crate::types::DbId;

/// Typed outcome of a failed incident lifecycle operation.
///
/// Every variant maps to a stable machine code via [`SosError::code`] so
/// adapters can pick a transport status without inspecting message text.
#[derive(Debug, thiserror::Error)]
pub enum SosError {
    #[error("No authenticated session")]
    Unauthorized,

    #[error("User {0} not found")]
    UserNotFound(DbId),

    #[error("SOS signal blocked: {0}")]
    SignalBlocked(DenyReason),

    #[error("Invalid location: {0}")]
    InvalidLocation(String),

    #[error("Incident {0} not found")]
    NotFound(DbId),

    #[error("Incident {id} is not accepting updates (status {status:?})")]
    IncidentInactive {
        id: DbId,
        status: Option<IncidentStatus>,
    },

    #[error("Sample captured at {sample} is not newer than {current}")]
    StaleSample {
        sample: crate::types::Timestamp,
        current: crate::types::Timestamp,
    },

    #[error("Only the incident owner or an administrator may do this")]
    Forbidden,

    #[error("Incident {0} is already closed")]
    AlreadyResolved(DbId),

    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SosError {
    /// Stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            SosError::Unauthorized => "UNAUTHORIZED",
            SosError::UserNotFound(_) => "USER_NOT_FOUND",
            SosError::SignalBlocked(_) => "SIGNAL_BLOCKED",
            SosError::InvalidLocation(_) => "INVALID_LOCATION",
            SosError::NotFound(_) => "NOT_FOUND",
            SosError::IncidentInactive { .. } => "INCIDENT_INACTIVE",
            SosError::StaleSample { .. } => "STALE_SAMPLE",
            SosError::Forbidden => "FORBIDDEN",
            SosError::AlreadyResolved(_) => "ALREADY_RESOLVED",
            SosError::InvalidQuery(_) => "INVALID_QUERY",
            SosError::Store(_) => "STORE_UNAVAILABLE",
        }
    }

    /// Whether the caller may retry the whole operation unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(self, SosError::Store(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(SosError::Unauthorized.code(), "UNAUTHORIZED");
        assert_eq!(
            SosError::SignalBlocked(DenyReason::KycNotApproved).code(),
            "SIGNAL_BLOCKED"
        );
        assert_eq!(
            SosError::IncidentInactive {
                id: 1,
                status: None
            }
            .code(),
            "INCIDENT_INACTIVE"
        );
        assert_eq!(SosError::AlreadyResolved(1).code(), "ALREADY_RESOLVED");
        assert_eq!(
            SosError::Store(StoreError::Unavailable("down".into())).code(),
            "STORE_UNAVAILABLE"
        );
    }

    #[test]
    fn only_store_failures_are_transient() {
        assert!(SosError::Store(StoreError::Unavailable("down".into())).is_transient());
        assert!(!SosError::Forbidden.is_transient());
        assert!(!SosError::InvalidLocation("nan".into()).is_transient());
    }

    #[test]
    fn signal_blocked_message_names_reason() {
        let err = SosError::SignalBlocked(DenyReason::NoContactsRegistered);
        assert_eq!(err.to_string(), "SOS signal blocked: NO_CONTACTS_REGISTERED");
    }
}
