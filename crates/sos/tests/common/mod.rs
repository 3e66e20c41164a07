#![allow(dead_code)]

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use traceam_core::contacts::{ContactEntry, EmergencyContacts};
use traceam_core::types::DbId;
use traceam_core::user::{UserProfile, VerificationStatus, ROLE_ADMIN, ROLE_USER};
use traceam_events::{DeliveryError, EmailChannel, EventBus, NotificationDispatcher, SmsChannel};
use traceam_sos::{EngineConfig, IncidentEngine, MemoryIncidentStore, MemoryUserStore};

pub const OWNER: DbId = 1;
pub const STRANGER: DbId = 2;
pub const ADMIN: DbId = 99;

/// SMS double that records every send and optionally fails.
#[derive(Default)]
pub struct RecordingSms {
    pub fail: bool,
    pub sent: Mutex<Vec<(Vec<String>, String)>>,
}

#[async_trait]
impl SmsChannel for RecordingSms {
    async fn send(&self, to: &[String], message: &str) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push((to.to_vec(), message.to_string()));
        if self.fail {
            return Err(DeliveryError::NotConfigured("sms"));
        }
        Ok(())
    }
}

/// Email double that records every send and optionally fails.
#[derive(Default)]
pub struct RecordingEmail {
    pub fail: bool,
    pub sent: Mutex<Vec<(Vec<String>, String)>>,
}

#[async_trait]
impl EmailChannel for RecordingEmail {
    async fn send(&self, to: &[String], subject: &str, _body: &str) -> Result<(), DeliveryError> {
        self.sent.lock().unwrap().push((to.to_vec(), subject.to_string()));
        if self.fail {
            return Err(DeliveryError::NotConfigured("email"));
        }
        Ok(())
    }
}

pub struct Harness {
    pub engine: Arc<IncidentEngine>,
    pub incidents: Arc<MemoryIncidentStore>,
    pub users: Arc<MemoryUserStore>,
    pub sms: Arc<RecordingSms>,
    pub email: Arc<RecordingEmail>,
    pub bus: Arc<EventBus>,
}

pub fn harness() -> Harness {
    harness_with(RecordingSms::default(), RecordingEmail::default())
}

/// Engine over fresh in-memory stores, seeded with an approved owner, a
/// second approved user and an admin.
pub fn harness_with(sms: RecordingSms, email: RecordingEmail) -> Harness {
    let incidents = Arc::new(MemoryIncidentStore::new());
    let users = Arc::new(MemoryUserStore::new(Arc::clone(&incidents)));
    let sms = Arc::new(sms);
    let email = Arc::new(email);
    let bus = Arc::new(EventBus::default());

    users.upsert(user(OWNER, "Ada", VerificationStatus::Approved, partner_phone()));
    users.upsert(user(STRANGER, "Bola", VerificationStatus::Approved, partner_phone()));
    let mut admin = user(ADMIN, "Admin", VerificationStatus::Approved, partner_phone());
    admin.role = ROLE_ADMIN.into();
    users.upsert(admin);

    let dispatcher = Arc::new(NotificationDispatcher::new(sms.clone(), email.clone()));
    let engine = Arc::new(IncidentEngine::new(
        incidents.clone(),
        users.clone(),
        dispatcher,
        Arc::clone(&bus),
        EngineConfig::default(),
    ));

    Harness {
        engine,
        incidents,
        users,
        sms,
        email,
        bus,
    }
}

pub fn user(
    id: DbId,
    name: &str,
    status: VerificationStatus,
    contacts: EmergencyContacts,
) -> UserProfile {
    UserProfile {
        id,
        name: name.into(),
        email: format!("{}@example.com", name.to_lowercase()),
        phone: format!("0803 000 {id:04}"),
        role: ROLE_USER.into(),
        verification_status: status,
        emergency_contacts: contacts,
        active_incident_id: None,
        created_at: Utc::now(),
    }
}

pub fn partner_phone() -> EmergencyContacts {
    EmergencyContacts {
        partner: Some(ContactEntry::with_phone("08011112222")),
        ..EmergencyContacts::default()
    }
}
