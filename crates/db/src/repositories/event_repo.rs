//! Repository for the `events` audit table.

use sqlx::PgPool;
use traceam_core::types::DbId;

use crate::models::event::{CreateEvent, Event};

/// Column list for `events` queries.
const COLUMNS: &str =
    "id, event_type, source_entity_type, source_entity_id, actor_user_id, payload, created_at";

/// Provides read/write operations for audit events.
pub struct EventRepo;

impl EventRepo {
    /// Insert a new event row, returning the generated ID.
    pub async fn insert(pool: &PgPool, event: &CreateEvent<'_>) -> Result<DbId, sqlx::Error> {
        sqlx::query_scalar(
            "INSERT INTO events \
                 (event_type, source_entity_type, source_entity_id, actor_user_id, payload) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id",
        )
        .bind(event.event_type)
        .bind(event.source_entity_type)
        .bind(event.source_entity_id)
        .bind(event.actor_user_id)
        .bind(event.payload)
        .fetch_one(pool)
        .await
    }

    /// List events recorded against one entity, oldest first.
    pub async fn list_for_source(
        pool: &PgPool,
        source_entity_type: &str,
        source_entity_id: DbId,
        limit: i64,
    ) -> Result<Vec<Event>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM events \
             WHERE source_entity_type = $1 AND source_entity_id = $2 \
             ORDER BY created_at ASC, id ASC \
             LIMIT $3"
        );
        sqlx::query_as::<_, Event>(&query)
            .bind(source_entity_type)
            .bind(source_entity_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}
