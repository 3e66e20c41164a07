//! Read-only user snapshot consumed by the incident lifecycle.
//!
//! Users are owned by the account store; the lifecycle only reads the
//! fields it needs to gate and fan out an SOS.

use serde::{Deserialize, Serialize};

use crate::contacts::EmergencyContacts;
use crate::types::{DbId, Timestamp};

/// Regular account holder.
pub const ROLE_USER: &str = "user";

/// Administrator: may resolve any incident and search incidents.
pub const ROLE_ADMIN: &str = "admin";

/// Identity-verification (KYC) state of a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VerificationStatus {
    None,
    Pending,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationStatus::None => "NONE",
            VerificationStatus::Pending => "PENDING",
            VerificationStatus::Approved => "APPROVED",
            VerificationStatus::Rejected => "REJECTED",
        }
    }

    /// Parse the stored column value. Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "NONE" => Some(VerificationStatus::None),
            "PENDING" => Some(VerificationStatus::Pending),
            "APPROVED" => Some(VerificationStatus::Approved),
            "REJECTED" => Some(VerificationStatus::Rejected),
            _ => None,
        }
    }
}

/// The slice of a user record the lifecycle reads.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserProfile {
    pub id: DbId,
    /// Display name, captured onto incidents as their identifier.
    pub name: String,
    pub email: String,
    /// Account phone number as entered; compare through [`phone_digits`].
    pub phone: String,
    pub role: String,
    pub verification_status: VerificationStatus,
    pub emergency_contacts: EmergencyContacts,
    /// The user's current non-terminal incident, if any.
    pub active_incident_id: Option<DbId>,
    pub created_at: Timestamp,
}

impl UserProfile {
    pub fn is_admin(&self) -> bool {
        self.role == ROLE_ADMIN
    }

    /// Whether the account phone equals `digits` once separators are dropped.
    pub fn phone_matches(&self, digits: &str) -> bool {
        !digits.is_empty() && phone_digits(&self.phone) == digits
    }
}

/// Keep only the ASCII digits of a phone number.
pub fn phone_digits(raw: &str) -> String {
    raw.chars().filter(char::is_ascii_digit).collect()
}
