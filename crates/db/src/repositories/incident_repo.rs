//! Repository for the `incidents` table.
//!
//! Every mutation is one statement guarded in its `WHERE` clause, so
//! concurrent callers race on the row lock rather than on a prior read.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use traceam_core::incident::{
    ContactChannel, DeliveryState, Incident, IncidentStatus, NewIncident, OPEN_STATUSES,
};
use traceam_core::store::{CloseWrite, IncidentStore, LocationWrite, OpenClaim, StoreError};
use traceam_core::types::DbId;

use crate::models::incident::IncidentRow;
use crate::store_err;

/// Column list for `incidents` queries.
const COLUMNS: &str = "id, owner_id, identifier, status, lat, lng, accuracy, captured_at, \
                       location_history, notified_contacts, started_at, ended_at, updated_at";

/// How often a claim is retried when the conflicting open incident closes
/// between the insert and the follow-up read.
const CLAIM_ATTEMPTS: usize = 3;

fn status_names(statuses: &[IncidentStatus]) -> Vec<String> {
    statuses.iter().map(|s| s.as_str().to_string()).collect()
}

/// Provides guarded reads and writes for incidents.
pub struct IncidentRepo;

impl IncidentRepo {
    /// Insert a new incident unless the owner already holds an open one.
    ///
    /// Returns `None` when the partial unique index rejected the row.
    pub async fn insert_if_none_open(
        pool: &PgPool,
        new: &NewIncident,
    ) -> Result<Option<IncidentRow>, sqlx::Error> {
        let loc = new.initial_location;
        let query = format!(
            "INSERT INTO incidents \
                 (owner_id, identifier, status, lat, lng, accuracy, captured_at, \
                  location_history, notified_contacts, started_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10) \
             ON CONFLICT (owner_id) WHERE status IN ('PENDING', 'ACTIVE', 'MOVING') \
             DO NOTHING \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, IncidentRow>(&query)
            .bind(new.owner_id)
            .bind(&new.identifier)
            .bind(IncidentStatus::Active.as_str())
            .bind(loc.lat)
            .bind(loc.lng)
            .bind(loc.accuracy)
            .bind(loc.captured_at)
            .bind(Json(vec![loc]))
            .bind(Json(&new.notified_contacts))
            .bind(new.started_at)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<IncidentRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM incidents WHERE id = $1");
        sqlx::query_as::<_, IncidentRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_open_for_owner(
        pool: &PgPool,
        owner_id: DbId,
    ) -> Result<Option<IncidentRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM incidents \
             WHERE owner_id = $1 AND status = ANY($2) \
             LIMIT 1"
        );
        sqlx::query_as::<_, IncidentRow>(&query)
            .bind(owner_id)
            .bind(status_names(OPEN_STATUSES))
            .fetch_optional(pool)
            .await
    }

    /// Move the current location and append it to the history, provided the
    /// status is one of `write.from` and the stored sample is strictly older.
    pub async fn append_location(
        pool: &PgPool,
        id: DbId,
        write: &LocationWrite<'_>,
    ) -> Result<Option<IncidentRow>, sqlx::Error> {
        let sample = write.sample;
        let query = format!(
            "UPDATE incidents \
             SET lat = $2, lng = $3, accuracy = $4, captured_at = $5, \
                 location_history = location_history || $6, \
                 status = $7, updated_at = NOW() \
             WHERE id = $1 AND status = ANY($8) AND captured_at < $5 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, IncidentRow>(&query)
            .bind(id)
            .bind(sample.lat)
            .bind(sample.lng)
            .bind(sample.accuracy)
            .bind(sample.captured_at)
            .bind(Json(vec![sample]))
            .bind(write.to.as_str())
            .bind(status_names(write.from))
            .fetch_optional(pool)
            .await
    }

    /// Set a terminal status and end time if the status is one of `write.from`
    /// and, when given, the owner matches.
    pub async fn close(
        pool: &PgPool,
        id: DbId,
        write: &CloseWrite<'_>,
    ) -> Result<Option<IncidentRow>, sqlx::Error> {
        let query = format!(
            "UPDATE incidents \
             SET status = $2, ended_at = $3, updated_at = NOW() \
             WHERE id = $1 AND status = ANY($4) \
               AND ($5::BIGINT IS NULL OR owner_id = $5) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, IncidentRow>(&query)
            .bind(id)
            .bind(write.to.as_str())
            .bind(write.ended_at)
            .bind(status_names(write.from))
            .bind(write.owner_guard)
            .fetch_optional(pool)
            .await
    }

    /// Rewrite the delivery state of every notified contact on `channel`.
    ///
    /// Returns `true` if the incident exists.
    pub async fn set_delivery_state(
        pool: &PgPool,
        id: DbId,
        channel: ContactChannel,
        state: DeliveryState,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE incidents SET notified_contacts = ( \
                 SELECT COALESCE( \
                     jsonb_agg( \
                         CASE WHEN elem->>'channel' = $2 \
                              THEN jsonb_set(elem, '{deliveryState}', to_jsonb($3::TEXT)) \
                              ELSE elem END \
                         ORDER BY ord), \
                     '[]'::jsonb) \
                 FROM jsonb_array_elements(notified_contacts) WITH ORDINALITY AS t(elem, ord) \
             ) \
             WHERE id = $1",
        )
        .bind(id)
        .bind(channel.as_str())
        .bind(state.as_str())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn search_by_identifier(
        pool: &PgPool,
        identifier: &str,
        limit: i64,
    ) -> Result<Vec<IncidentRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM incidents \
             WHERE LOWER(identifier) = LOWER($1) \
             ORDER BY started_at DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, IncidentRow>(&query)
            .bind(identifier)
            .bind(limit)
            .fetch_all(pool)
            .await
    }

    pub async fn list_for_owner(
        pool: &PgPool,
        owner_id: DbId,
        limit: i64,
    ) -> Result<Vec<IncidentRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM incidents \
             WHERE owner_id = $1 \
             ORDER BY started_at DESC \
             LIMIT $2"
        );
        sqlx::query_as::<_, IncidentRow>(&query)
            .bind(owner_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}

// ---------------------------------------------------------------------------
// Store adapter
// ---------------------------------------------------------------------------

/// [`IncidentStore`] backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgIncidentStore {
    pool: PgPool,
}

impl PgIncidentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn convert(row: Option<IncidentRow>) -> Result<Option<Incident>, StoreError> {
    row.map(Incident::try_from).transpose()
}

fn convert_all(rows: Vec<IncidentRow>) -> Result<Vec<Incident>, StoreError> {
    rows.into_iter().map(Incident::try_from).collect()
}

#[async_trait]
impl IncidentStore for PgIncidentStore {
    async fn claim_open(&self, new: NewIncident) -> Result<OpenClaim, StoreError> {
        for _ in 0..CLAIM_ATTEMPTS {
            if let Some(row) = IncidentRepo::insert_if_none_open(&self.pool, &new)
                .await
                .map_err(store_err)?
            {
                return Ok(OpenClaim::Created(row.try_into()?));
            }
            if let Some(row) = IncidentRepo::find_open_for_owner(&self.pool, new.owner_id)
                .await
                .map_err(store_err)?
            {
                return Ok(OpenClaim::Existing(row.try_into()?));
            }
            tracing::debug!(owner_id = new.owner_id, "Open incident closed during claim, retrying");
        }
        Err(StoreError::Unavailable(format!(
            "could not claim an incident for owner {} after {CLAIM_ATTEMPTS} attempts",
            new.owner_id
        )))
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<Incident>, StoreError> {
        convert(IncidentRepo::find_by_id(&self.pool, id).await.map_err(store_err)?)
    }

    async fn find_open_for_owner(&self, owner_id: DbId) -> Result<Option<Incident>, StoreError> {
        convert(
            IncidentRepo::find_open_for_owner(&self.pool, owner_id)
                .await
                .map_err(store_err)?,
        )
    }

    async fn append_location(
        &self,
        id: DbId,
        write: LocationWrite<'_>,
    ) -> Result<Option<Incident>, StoreError> {
        convert(
            IncidentRepo::append_location(&self.pool, id, &write)
                .await
                .map_err(store_err)?,
        )
    }

    async fn close(&self, id: DbId, write: CloseWrite<'_>) -> Result<Option<Incident>, StoreError> {
        convert(IncidentRepo::close(&self.pool, id, &write).await.map_err(store_err)?)
    }

    async fn record_delivery(
        &self,
        id: DbId,
        channel: ContactChannel,
        state: DeliveryState,
    ) -> Result<(), StoreError> {
        let found = IncidentRepo::set_delivery_state(&self.pool, id, channel, state)
            .await
            .map_err(store_err)?;
        if !found {
            tracing::warn!(incident_id = id, "Delivery state recorded for missing incident");
        }
        Ok(())
    }

    async fn search_by_identifier(
        &self,
        identifier: &str,
        limit: i64,
    ) -> Result<Vec<Incident>, StoreError> {
        convert_all(
            IncidentRepo::search_by_identifier(&self.pool, identifier, limit)
                .await
                .map_err(store_err)?,
        )
    }

    async fn list_for_owner(&self, owner_id: DbId, limit: i64) -> Result<Vec<Incident>, StoreError> {
        convert_all(
            IncidentRepo::list_for_owner(&self.pool, owner_id, limit)
                .await
                .map_err(store_err)?,
        )
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        crate::health_check(&self.pool).await.map_err(store_err)
    }
}
