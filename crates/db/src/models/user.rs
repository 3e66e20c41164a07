//! User account row model.

use sqlx::types::Json;
use sqlx::FromRow;
use traceam_core::contacts::EmergencyContacts;
use traceam_core::store::StoreError;
use traceam_core::types::{DbId, Timestamp};
use traceam_core::user::{UserProfile, VerificationStatus};

/// A row from the `users` table joined with the owner's open incident.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: DbId,
    pub name: String,
    pub email: String,
    pub phone: String,
    pub role: String,
    pub kyc_status: String,
    pub emergency_contacts: Json<EmergencyContacts>,
    pub active_incident_id: Option<DbId>,
    pub created_at: Timestamp,
}

impl TryFrom<UserRow> for UserProfile {
    type Error = StoreError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let verification_status = VerificationStatus::parse(&row.kyc_status).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "user {} has unknown kyc_status '{}'",
                row.id, row.kyc_status
            ))
        })?;
        Ok(UserProfile {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            role: row.role,
            verification_status,
            emergency_contacts: row.emergency_contacts.0,
            active_incident_id: row.active_incident_id,
            created_at: row.created_at,
        })
    }
}
