//! Incident row model.
//!
//! The row keeps the current location in flat columns and the history and
//! notified contacts as JSONB arrays; [`IncidentRow`] converts into the core
//! [`Incident`].

use sqlx::types::Json;
use sqlx::FromRow;
use traceam_core::geo::LocationSample;
use traceam_core::incident::{Incident, IncidentStatus, NotifiedContact};
use traceam_core::store::StoreError;
use traceam_core::types::{DbId, Timestamp};

/// A row from the `incidents` table.
#[derive(Debug, Clone, FromRow)]
pub struct IncidentRow {
    pub id: DbId,
    pub owner_id: DbId,
    pub identifier: String,
    pub status: String,
    pub lat: f64,
    pub lng: f64,
    pub accuracy: Option<f64>,
    pub captured_at: Timestamp,
    pub location_history: Json<Vec<LocationSample>>,
    pub notified_contacts: Json<Vec<NotifiedContact>>,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub updated_at: Timestamp,
}

impl TryFrom<IncidentRow> for Incident {
    type Error = StoreError;

    fn try_from(row: IncidentRow) -> Result<Self, Self::Error> {
        let status = IncidentStatus::parse(&row.status).ok_or_else(|| {
            StoreError::Corrupt(format!(
                "incident {} has unknown status '{}'",
                row.id, row.status
            ))
        })?;
        Ok(Incident {
            id: row.id,
            owner_id: row.owner_id,
            identifier: row.identifier,
            status,
            current_location: LocationSample {
                lat: row.lat,
                lng: row.lng,
                accuracy: row.accuracy,
                captured_at: row.captured_at,
            },
            location_history: row.location_history.0,
            notified_contacts: row.notified_contacts.0,
            started_at: row.started_at,
            ended_at: row.ended_at,
            updated_at: row.updated_at,
        })
    }
}
