//! Durable event persistence service.
//!
//! [`EventPersistence`] drains a bus receiver into the `events` table. It
//! runs as a background task and stops when the bus is dropped.

use tokio::sync::broadcast;
use traceam_core::types::DbId;
use traceam_db::models::event::CreateEvent;
use traceam_db::repositories::EventRepo;
use traceam_db::DbPool;

use crate::bus::{IncidentEvent, SOURCE_INCIDENT};

/// Background service that persists lifecycle events.
pub struct EventPersistence;

impl EventPersistence {
    /// Run the persistence loop until the channel closes.
    pub async fn run(pool: DbPool, mut receiver: broadcast::Receiver<IncidentEvent>) {
        let mut persisted: u64 = 0;
        loop {
            match receiver.recv().await {
                Ok(event) => match Self::persist(&pool, &event).await {
                    Ok(_) => persisted += 1,
                    Err(e) => {
                        tracing::error!(
                            error = %e,
                            kind = %event.kind,
                            incident_id = event.incident_id,
                            "Failed to persist event"
                        );
                    }
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Event persistence lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::info!(persisted, "Event bus closed, persistence shutting down");
                    break;
                }
            }
        }
    }

    async fn persist(pool: &DbPool, event: &IncidentEvent) -> Result<DbId, sqlx::Error> {
        EventRepo::insert(
            pool,
            &CreateEvent {
                event_type: event.kind.as_str(),
                source_entity_type: Some(SOURCE_INCIDENT),
                source_entity_id: Some(event.incident_id),
                actor_user_id: event.actor_user_id,
                payload: &event.payload,
            },
        )
        .await
    }
}
