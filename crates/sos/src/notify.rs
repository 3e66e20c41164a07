//! Contact fan-out for a freshly created incident.

use std::sync::Arc;

use serde::Serialize;
use tokio::task::JoinHandle;
use traceam_core::contacts::ResolvedContacts;
use traceam_core::incident::ContactChannel;
use traceam_core::store::IncidentStore;
use traceam_core::types::DbId;
use traceam_events::{
    AlertMessage, DeliveryOutcome, EventBus, EventKind, IncidentEvent, NotificationDispatcher,
};

/// What the fan-out did on each channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationReport {
    pub sms: DeliveryOutcome,
    pub email: DeliveryOutcome,
}

pub(crate) struct FanOut {
    pub incident_id: DbId,
    pub owner_id: DbId,
    pub contacts: ResolvedContacts,
    pub alert: AlertMessage,
}

/// Send the alert on a background task and record the outcome per channel.
///
/// Runs once per created incident. Nothing here can fail the trigger.
pub(crate) fn spawn(
    fan_out: FanOut,
    dispatcher: Arc<NotificationDispatcher>,
    incidents: Arc<dyn IncidentStore>,
    bus: Arc<EventBus>,
) -> JoinHandle<NotificationReport> {
    tokio::spawn(async move {
        let FanOut {
            incident_id,
            owner_id,
            contacts,
            alert,
        } = fan_out;

        let (sms, email) = dispatcher.dispatch_alert(&contacts, &alert).await;

        for (channel, outcome) in [(ContactChannel::Sms, &sms), (ContactChannel::Email, &email)] {
            let Some(state) = outcome.delivery_state() else {
                continue;
            };
            if let Err(e) = incidents.record_delivery(incident_id, channel, state).await {
                tracing::error!(
                    incident_id,
                    channel = channel.as_str(),
                    error = %e,
                    "Failed to record delivery state"
                );
            }
        }

        tracing::info!(incident_id, sms = ?sms, email = ?email, "Contacts notified");

        bus.publish(
            IncidentEvent::new(EventKind::NotificationDispatched, incident_id)
                .by(owner_id)
                .with_payload(serde_json::json!({ "sms": &sms, "email": &email })),
        );

        NotificationReport { sms, email }
    })
}
