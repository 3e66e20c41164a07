//! Notification dispatcher.
//!
//! Sends one alert to a set of phones and a set of emails. The two channels
//! are independent: a failure on one never prevents or fails the other, and
//! nothing is retried here. An empty recipient set is [`DeliveryOutcome::Skipped`].

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Serialize;
use traceam_core::contacts::ResolvedContacts;
use traceam_core::incident::DeliveryState;
use traceam_core::types::Timestamp;

use crate::delivery::{EmailChannel, SmsChannel};

/// Result of sending on one channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeliveryOutcome {
    Sent { recipients: usize },
    Skipped,
    Failed { error: String },
}

impl DeliveryOutcome {
    /// The state to record on the incident's contacts, if any were targeted.
    pub fn delivery_state(&self) -> Option<DeliveryState> {
        match self {
            DeliveryOutcome::Sent { .. } => Some(DeliveryState::Sent),
            DeliveryOutcome::Failed { .. } => Some(DeliveryState::Failed),
            DeliveryOutcome::Skipped => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Alert text
// ---------------------------------------------------------------------------

/// The alert sent to a user's contacts when an incident starts.
#[derive(Debug, Clone, PartialEq)]
pub struct AlertMessage {
    sender: String,
    name: String,
    tracking_link: String,
    triggered_at: Timestamp,
}

impl AlertMessage {
    pub fn new(
        sender: impl Into<String>,
        name: &str,
        tracking_link: impl Into<String>,
        triggered_at: Timestamp,
    ) -> Self {
        Self {
            sender: sender.into(),
            name: name.trim().to_uppercase(),
            tracking_link: tracking_link.into(),
            triggered_at,
        }
    }

    pub fn sms_text(&self) -> String {
        format!(
            "{} SOS: {} is in danger.\n\nLive Track: {}",
            self.sender, self.name, self.tracking_link
        )
    }

    pub fn email_subject(&self) -> String {
        format!("{} SOS ALERT: {}", self.sender, self.name)
    }

    pub fn email_body(&self) -> String {
        format!(
            "{} triggered an SOS alert at {} and listed you as an emergency contact.\n\n\
             Live Track: {}\n\n\
             Open the link to follow their location. If you believe they are in \
             immediate danger, contact local emergency services.",
            self.name,
            self.triggered_at.format("%Y-%m-%d %H:%M:%S UTC"),
            self.tracking_link
        )
    }
}

// ---------------------------------------------------------------------------
// Dispatcher
// ---------------------------------------------------------------------------

pub struct NotificationDispatcher {
    sms: Arc<dyn SmsChannel>,
    email: Arc<dyn EmailChannel>,
}

impl NotificationDispatcher {
    pub fn new(sms: Arc<dyn SmsChannel>, email: Arc<dyn EmailChannel>) -> Self {
        Self { sms, email }
    }

    pub async fn dispatch_sms(&self, phones: &BTreeSet<String>, message: &str) -> DeliveryOutcome {
        if phones.is_empty() {
            return DeliveryOutcome::Skipped;
        }
        let to: Vec<String> = phones.iter().cloned().collect();
        match self.sms.send(&to, message).await {
            Ok(()) => DeliveryOutcome::Sent { recipients: to.len() },
            Err(e) => {
                tracing::error!(error = %e, recipients = to.len(), "SMS dispatch failed");
                DeliveryOutcome::Failed { error: e.to_string() }
            }
        }
    }

    pub async fn dispatch_email(
        &self,
        emails: &BTreeSet<String>,
        subject: &str,
        body: &str,
    ) -> DeliveryOutcome {
        if emails.is_empty() {
            return DeliveryOutcome::Skipped;
        }
        let to: Vec<String> = emails.iter().cloned().collect();
        match self.email.send(&to, subject, body).await {
            Ok(()) => DeliveryOutcome::Sent { recipients: to.len() },
            Err(e) => {
                tracing::error!(error = %e, recipients = to.len(), "Email dispatch failed");
                DeliveryOutcome::Failed { error: e.to_string() }
            }
        }
    }

    /// Send `alert` over both channels concurrently. Returns `(sms, email)`.
    pub async fn dispatch_alert(
        &self,
        contacts: &ResolvedContacts,
        alert: &AlertMessage,
    ) -> (DeliveryOutcome, DeliveryOutcome) {
        let sms_text = alert.sms_text();
        let subject = alert.email_subject();
        let body = alert.email_body();
        tokio::join!(
            self.dispatch_sms(&contacts.phones, &sms_text),
            self.dispatch_email(&contacts.emails, &subject, &body),
        )
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::delivery::{DeliveryError, OfflineChannel};

    #[derive(Default)]
    struct RecordingSms {
        sent: Mutex<Vec<(Vec<String>, String)>>,
    }

    #[async_trait]
    impl SmsChannel for RecordingSms {
        async fn send(&self, to: &[String], message: &str) -> Result<(), DeliveryError> {
            self.sent.lock().unwrap().push((to.to_vec(), message.to_string()));
            Ok(())
        }
    }

    fn alert() -> AlertMessage {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap();
        AlertMessage::new("TRACEAM", "Ada Obi", "https://maps.test/?q=6.5244,3.3792", at)
    }

    fn set(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn alert_texts() {
        let alert = alert();
        assert_eq!(
            alert.sms_text(),
            "TRACEAM SOS: ADA OBI is in danger.\n\nLive Track: https://maps.test/?q=6.5244,3.3792"
        );
        assert_eq!(alert.email_subject(), "TRACEAM SOS ALERT: ADA OBI");
        assert!(alert.email_body().contains("2026-03-01 12:00:00 UTC"));
        assert!(alert.email_body().contains("https://maps.test/?q=6.5244,3.3792"));
    }

    #[tokio::test]
    async fn empty_sets_are_skipped() {
        let sms = Arc::new(RecordingSms::default());
        let dispatcher = NotificationDispatcher::new(sms.clone(), Arc::new(OfflineChannel::email()));

        let (sms_outcome, email_outcome) =
            dispatcher.dispatch_alert(&ResolvedContacts::default(), &alert()).await;

        assert_eq!(sms_outcome, DeliveryOutcome::Skipped);
        assert_eq!(email_outcome, DeliveryOutcome::Skipped);
        assert!(sms.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failing_email_does_not_affect_sms() {
        let sms = Arc::new(RecordingSms::default());
        let dispatcher = NotificationDispatcher::new(sms.clone(), Arc::new(OfflineChannel::email()));
        let contacts = ResolvedContacts {
            phones: set(&["08011112222", "08033334444"]),
            emails: set(&["mum@example.com"]),
        };

        let (sms_outcome, email_outcome) = dispatcher.dispatch_alert(&contacts, &alert()).await;

        assert_eq!(sms_outcome, DeliveryOutcome::Sent { recipients: 2 });
        assert_eq!(
            email_outcome,
            DeliveryOutcome::Failed { error: "email channel not configured".into() }
        );
        let sent = sms.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, vec!["08011112222".to_string(), "08033334444".to_string()]);
    }

    #[test]
    fn outcome_maps_to_delivery_state() {
        assert_eq!(
            DeliveryOutcome::Sent { recipients: 1 }.delivery_state(),
            Some(DeliveryState::Sent)
        );
        assert_eq!(
            DeliveryOutcome::Failed { error: "x".into() }.delivery_state(),
            Some(DeliveryState::Failed)
        );
        assert_eq!(DeliveryOutcome::Skipped.delivery_state(), None);
    }
}
