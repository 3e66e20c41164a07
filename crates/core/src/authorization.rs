//! SOS authorization gate.
//!
//! A pure check against a [`UserProfile`] snapshot deciding whether that
//! user may start a new incident. Both KYC approval and at least one
//! notifiable contact are required.

use std::fmt;

use serde::Serialize;

use crate::contacts::resolve_contacts;
use crate::user::{UserProfile, VerificationStatus};

/// Why the gate refused a trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DenyReason {
    KycNotApproved,
    NoContactsRegistered,
}

impl DenyReason {
    pub fn as_str(self) -> &'static str {
        match self {
            DenyReason::KycNotApproved => "KYC_NOT_APPROVED",
            DenyReason::NoContactsRegistered => "NO_CONTACTS_REGISTERED",
        }
    }
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Gate decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Authorization {
    Allow,
    Deny(DenyReason),
}

/// Decide whether `user` may trigger an SOS.
///
/// KYC is checked first, so an unverified user with no contacts is reported
/// as `KYC_NOT_APPROVED`.
pub fn authorize(user: &UserProfile) -> Authorization {
    if user.verification_status != VerificationStatus::Approved {
        return Authorization::Deny(DenyReason::KycNotApproved);
    }
    if resolve_contacts(&user.emergency_contacts).is_empty() {
        return Authorization::Deny(DenyReason::NoContactsRegistered);
    }
    Authorization::Allow
}
