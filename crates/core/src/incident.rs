//! Incident status machine and incident records.
//!
//! All transition legality lives here. Stores receive the allowed source
//! states from [`IncidentStatus`] and guard their conditional writes on
//! them, so no other code decides which status may follow which.
//!
//! Transition rules:
//! - `PENDING` -> `ACTIVE`, `CANCELLED`
//! - `ACTIVE`  -> `MOVING`, `RESOLVED`
//! - `MOVING`  -> `MOVING`, `RESOLVED`
//! - `RESOLVED`, `CANCELLED` are terminal

use serde::{Deserialize, Serialize};

use crate::contacts::ResolvedContacts;
use crate::geo::LocationSample;
use crate::types::{DbId, Timestamp};

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IncidentStatus {
    /// Reserved for pre-trigger holds; never produced on the happy path.
    Pending,
    /// Triggered, no movement reported yet.
    Active,
    /// At least one location update accepted after the trigger.
    Moving,
    /// Stopped by the owner or an administrator.
    Resolved,
    /// Aborted before reaching the server. Never produced server-side.
    Cancelled,
}

/// Statuses counted against the one-open-incident-per-user rule.
pub const OPEN_STATUSES: &[IncidentStatus] = &[
    IncidentStatus::Pending,
    IncidentStatus::Active,
    IncidentStatus::Moving,
];

/// Statuses that accept location updates and resolution.
pub const LIVE_STATUSES: &[IncidentStatus] = &[IncidentStatus::Active, IncidentStatus::Moving];

impl IncidentStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            IncidentStatus::Pending => "PENDING",
            IncidentStatus::Active => "ACTIVE",
            IncidentStatus::Moving => "MOVING",
            IncidentStatus::Resolved => "RESOLVED",
            IncidentStatus::Cancelled => "CANCELLED",
        }
    }

    /// Parse the stored column value. Unknown values yield `None`.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "PENDING" => Some(IncidentStatus::Pending),
            "ACTIVE" => Some(IncidentStatus::Active),
            "MOVING" => Some(IncidentStatus::Moving),
            "RESOLVED" => Some(IncidentStatus::Resolved),
            "CANCELLED" => Some(IncidentStatus::Cancelled),
            _ => None,
        }
    }

    /// The set of statuses this status may transition to.
    pub fn valid_transitions(self) -> &'static [IncidentStatus] {
        match self {
            IncidentStatus::Pending => &[IncidentStatus::Active, IncidentStatus::Cancelled],
            IncidentStatus::Active => &[IncidentStatus::Moving, IncidentStatus::Resolved],
            IncidentStatus::Moving => &[IncidentStatus::Moving, IncidentStatus::Resolved],
            IncidentStatus::Resolved | IncidentStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(self, next: IncidentStatus) -> bool {
        self.valid_transitions().contains(&next)
    }

    pub fn is_open(self) -> bool {
        OPEN_STATUSES.contains(&self)
    }

    /// Whether location samples may be applied in this status.
    pub fn accepts_location(self) -> bool {
        self.can_transition_to(IncidentStatus::Moving)
    }

    /// Source states from which `next` is reachable.
    pub fn sources_of(next: IncidentStatus) -> Vec<IncidentStatus> {
        ALL_STATUSES
            .iter()
            .copied()
            .filter(|s| s.can_transition_to(next))
            .collect()
    }
}

/// Every status, in declaration order.
pub const ALL_STATUSES: &[IncidentStatus] = &[
    IncidentStatus::Pending,
    IncidentStatus::Active,
    IncidentStatus::Moving,
    IncidentStatus::Resolved,
    IncidentStatus::Cancelled,
];

// ---------------------------------------------------------------------------
// Notified contacts
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContactChannel {
    Sms,
    Email,
}

impl ContactChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            ContactChannel::Sms => "sms",
            ContactChannel::Email => "email",
        }
    }
}

/// Delivery progress of one notified address.
///
/// `Queued` is written at creation; the dispatcher moves it to `Sent` or
/// `Failed`. `Delivered` and `Read` are reserved for gateway receipts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeliveryState {
    Queued,
    Sent,
    Delivered,
    Read,
    Failed,
}

impl DeliveryState {
    pub fn as_str(self) -> &'static str {
        match self {
            DeliveryState::Queued => "QUEUED",
            DeliveryState::Sent => "SENT",
            DeliveryState::Delivered => "DELIVERED",
            DeliveryState::Read => "READ",
            DeliveryState::Failed => "FAILED",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotifiedContact {
    pub channel: ContactChannel,
    pub address: String,
    pub delivery_state: DeliveryState,
}

/// Build the initial notified-contact list for a new incident.
pub fn queued_contacts(resolved: &ResolvedContacts) -> Vec<NotifiedContact> {
    let phones = resolved.phones.iter().map(|p| NotifiedContact {
        channel: ContactChannel::Sms,
        address: p.clone(),
        delivery_state: DeliveryState::Queued,
    });
    let emails = resolved.emails.iter().map(|e| NotifiedContact {
        channel: ContactChannel::Email,
        address: e.clone(),
        delivery_state: DeliveryState::Queued,
    });
    phones.chain(emails).collect()
}

// ---------------------------------------------------------------------------
// Incident
// ---------------------------------------------------------------------------

/// An emergency episode from trigger to resolution.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub id: DbId,
    pub owner_id: DbId,
    /// Owner's display name at trigger time.
    pub identifier: String,
    pub status: IncidentStatus,
    pub current_location: LocationSample,
    pub location_history: Vec<LocationSample>,
    pub notified_contacts: Vec<NotifiedContact>,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

/// Everything needed to create an incident; the store assigns the id.
#[derive(Debug, Clone, PartialEq)]
pub struct NewIncident {
    pub owner_id: DbId,
    pub identifier: String,
    pub initial_location: LocationSample,
    pub notified_contacts: Vec<NotifiedContact>,
    pub started_at: Timestamp,
}

impl NewIncident {
    /// Materialize the record as it looks right after creation.
    pub fn into_incident(self, id: DbId) -> Incident {
        Incident {
            id,
            owner_id: self.owner_id,
            identifier: self.identifier,
            status: IncidentStatus::Active,
            current_location: self.initial_location,
            location_history: vec![self.initial_location],
            notified_contacts: self.notified_contacts,
            started_at: self.started_at,
            ended_at: None,
            updated_at: self.started_at,
        }
    }
}

/// Public tracking view returned by incident lookup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IncidentView {
    pub id: DbId,
    pub status: IncidentStatus,
    pub current_location: LocationSample,
    pub identifier: String,
    pub last_update: Timestamp,
}

impl From<&Incident> for IncidentView {
    fn from(incident: &Incident) -> Self {
        Self {
            id: incident.id,
            status: incident.status,
            current_location: incident.current_location,
            identifier: incident.identifier.clone(),
            last_update: incident.updated_at,
        }
    }
}

// ---------------------------------------------------------------------------
// Search
// ---------------------------------------------------------------------------

/// A normalized incident search query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchQuery {
    /// Looks like an email: resolve the owner account first.
    Email(String),
    /// Contains letters: case-insensitive identifier match.
    Identifier(String),
    /// Digits only (separators stripped): exact identifier match.
    Phone(String),
}

/// Classify and normalize a raw search string.
///
/// Returns `None` when nothing searchable remains.
pub fn normalize_search_query(raw: &str) -> Option<SearchQuery> {
    let trimmed = raw.trim();
    if trimmed.contains('@') {
        let email = trimmed.to_lowercase();
        return Some(SearchQuery::Email(email));
    }
    if trimmed.chars().any(char::is_alphabetic) {
        return Some(SearchQuery::Identifier(trimmed.to_lowercase()));
    }
    let digits: String = trimmed.chars().filter(char::is_ascii_digit).collect();
    if digits.is_empty() {
        None
    } else {
        Some(SearchQuery::Phone(digits))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
