//! Persistence seams for the incident lifecycle.
//!
//! Every state change is a single atomic store operation guarded on the
//! incident's current status (and, for location updates, its capture
//! clock). Implementations must not express these as read-then-write pairs.

use async_trait::async_trait;

use crate::geo::LocationSample;
use crate::incident::{ContactChannel, DeliveryState, Incident, IncidentStatus, NewIncident};
use crate::types::{DbId, Timestamp};
use crate::user::UserProfile;

/// Failure of the underlying storage backend.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The backend could not be reached or the query failed.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A stored row could not be decoded into a domain value.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Result of an atomic create-or-return-open-incident claim.
#[derive(Debug, Clone, PartialEq)]
pub enum OpenClaim {
    /// No open incident existed; this one was just created.
    Created(Incident),
    /// The owner already had an open incident; nothing was written.
    Existing(Incident),
}

impl OpenClaim {
    pub fn incident(&self) -> &Incident {
        match self {
            OpenClaim::Created(i) | OpenClaim::Existing(i) => i,
        }
    }

    pub fn into_incident(self) -> Incident {
        match self {
            OpenClaim::Created(i) | OpenClaim::Existing(i) => i,
        }
    }
}

/// A conditional location write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocationWrite<'a> {
    pub sample: LocationSample,
    /// Statuses the incident must currently be in.
    pub from: &'a [IncidentStatus],
    /// Status to set on success.
    pub to: IncidentStatus,
}

/// A conditional close (resolve) write.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CloseWrite<'a> {
    /// When set, the incident must belong to this owner.
    pub owner_guard: Option<DbId>,
    pub from: &'a [IncidentStatus],
    pub to: IncidentStatus,
    pub ended_at: Timestamp,
}

#[async_trait]
pub trait IncidentStore: Send + Sync {
    /// Create an incident unless the owner already has an open one, in which
    /// case return that one. Must be atomic with respect to concurrent claims
    /// for the same owner.
    async fn claim_open(&self, new: NewIncident) -> Result<OpenClaim, StoreError>;

    async fn find_by_id(&self, id: DbId) -> Result<Option<Incident>, StoreError>;

    async fn find_open_for_owner(&self, owner_id: DbId) -> Result<Option<Incident>, StoreError>;

    /// Apply a sample iff the status is in `write.from` and the stored
    /// capture time is strictly older than the sample's. Returns the updated
    /// incident, or `None` if the guard failed or the incident is missing.
    async fn append_location(
        &self,
        id: DbId,
        write: LocationWrite<'_>,
    ) -> Result<Option<Incident>, StoreError>;

    /// Close an incident iff its status is in `write.from` (and the owner
    /// guard matches). Returns the updated incident, or `None` otherwise.
    async fn close(&self, id: DbId, write: CloseWrite<'_>) -> Result<Option<Incident>, StoreError>;

    /// Set the delivery state of every contact on `channel`.
    async fn record_delivery(
        &self,
        id: DbId,
        channel: ContactChannel,
        state: DeliveryState,
    ) -> Result<(), StoreError>;

    /// Incidents whose identifier equals `identifier`, ignoring case, newest first.
    async fn search_by_identifier(
        &self,
        identifier: &str,
        limit: i64,
    ) -> Result<Vec<Incident>, StoreError>;

    /// Incidents of one owner, newest first.
    async fn list_for_owner(&self, owner_id: DbId, limit: i64)
        -> Result<Vec<Incident>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;
}

/// Read-only view of the user account store.
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_id(&self, id: DbId) -> Result<Option<UserProfile>, StoreError>;

    async fn get_by_email(&self, email: &str) -> Result<Option<UserProfile>, StoreError>;

    /// Find the account whose phone, reduced to digits, equals `digits`.
    async fn get_by_phone(&self, digits: &str) -> Result<Option<UserProfile>, StoreError>;
}
