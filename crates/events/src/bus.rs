//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! The incident engine publishes one [`IncidentEvent`] per accepted
//! transition and one after each contact fan-out. Subscribers (the audit
//! writer, tests) each receive every event independently.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use traceam_core::types::DbId;

/// Source entity kind recorded with every event in the audit log.
pub const SOURCE_INCIDENT: &str = "incident";

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// IncidentEvent
// ---------------------------------------------------------------------------

/// What happened to an incident.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    #[serde(rename = "incident.triggered")]
    Triggered,
    /// A trigger found the owner's open incident and returned it.
    #[serde(rename = "incident.resumed")]
    Resumed,
    #[serde(rename = "incident.location_updated")]
    LocationUpdated,
    #[serde(rename = "incident.resolved")]
    Resolved,
    /// The contact fan-out finished, whatever the per-channel outcome.
    #[serde(rename = "notification.dispatched")]
    NotificationDispatched,
}

impl EventKind {
    /// Dot-separated name stored in `events.event_type`.
    pub fn as_str(self) -> &'static str {
        match self {
            EventKind::Triggered => "incident.triggered",
            EventKind::Resumed => "incident.resumed",
            EventKind::LocationUpdated => "incident.location_updated",
            EventKind::Resolved => "incident.resolved",
            EventKind::NotificationDispatched => "notification.dispatched",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncidentEvent {
    pub kind: EventKind,
    pub incident_id: DbId,
    /// User whose request caused the event.
    pub actor_user_id: Option<DbId>,
    pub payload: serde_json::Value,
    pub occurred_at: DateTime<Utc>,
}

impl IncidentEvent {
    pub fn new(kind: EventKind, incident_id: DbId) -> Self {
        Self {
            kind,
            incident_id,
            actor_user_id: None,
            payload: serde_json::Value::Object(Default::default()),
            occurred_at: Utc::now(),
        }
    }

    pub fn by(mut self, user_id: DbId) -> Self {
        self.actor_user_id = Some(user_id);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Fan-out hub shared as `Arc<EventBus>`.
///
/// ```rust
/// use traceam_events::bus::{EventBus, EventKind, IncidentEvent};
///
/// let bus = EventBus::default();
/// let mut rx = bus.subscribe();
///
/// bus.publish(IncidentEvent::new(EventKind::Triggered, 1).by(7));
/// assert_eq!(rx.try_recv().unwrap().kind, EventKind::Triggered);
/// ```
pub struct EventBus {
    sender: broadcast::Sender<IncidentEvent>,
}

impl EventBus {
    /// Slow receivers that fall more than `capacity` events behind observe
    /// `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Never fails. With no subscribers the event is dropped.
    pub fn publish(&self, event: IncidentEvent) {
        tracing::trace!(kind = %event.kind, incident_id = event.incident_id, "Publishing event");
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IncidentEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn incident_event_reaches_every_subscriber() {
        let bus = EventBus::default();
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        bus.publish(
            IncidentEvent::new(EventKind::Resolved, 42)
                .by(7)
                .with_payload(serde_json::json!({ "status": "RESOLVED" })),
        );

        for rx in [&mut first, &mut second] {
            let received = rx.recv().await.unwrap();
            assert_eq!(received.kind, EventKind::Resolved);
            assert_eq!(received.incident_id, 42);
            assert_eq!(received.actor_user_id, Some(7));
            assert_eq!(received.payload["status"], "RESOLVED");
        }
    }

    #[test]
    fn publish_without_subscribers_is_a_no_op() {
        EventBus::default().publish(IncidentEvent::new(EventKind::NotificationDispatched, 1));
    }

    #[test]
    fn kind_names_match_serde() {
        for kind in [
            EventKind::Triggered,
            EventKind::Resumed,
            EventKind::LocationUpdated,
            EventKind::Resolved,
            EventKind::NotificationDispatched,
        ] {
            assert_eq!(serde_json::to_value(kind).unwrap(), kind.as_str());
        }
    }

    #[test]
    fn lagging_receiver_is_told_how_many_it_missed() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for id in 1..=3 {
            bus.publish(IncidentEvent::new(EventKind::LocationUpdated, id));
        }
        assert!(matches!(
            rx.try_recv(),
            Err(broadcast::error::TryRecvError::Lagged(1))
        ));
    }
}
