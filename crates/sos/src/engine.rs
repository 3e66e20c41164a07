//! Incident lifecycle orchestration.
//!
//! The engine never holds a lock across I/O. Every mutation is one
//! conditional store write; reads after a failed write only classify the
//! rejection.

use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use serde::Serialize;
use tokio::task::JoinHandle;
use traceam_core::authorization::{authorize, Authorization};
use traceam_core::contacts::resolve_contacts;
use traceam_core::error::SosError;
use traceam_core::geo::{self, Coordinates, LocationSample};
use traceam_core::incident::{
    normalize_search_query, queued_contacts, Incident, IncidentStatus, IncidentView, NewIncident,
    SearchQuery,
};
use traceam_core::store::{CloseWrite, IncidentStore, LocationWrite, OpenClaim, UserStore};
use traceam_core::types::{DbId, Timestamp};
use traceam_core::user::UserProfile;
use traceam_events::{AlertMessage, EventBus, EventKind, IncidentEvent, NotificationDispatcher};

use crate::config::EngineConfig;
use crate::notify::{self, FanOut, NotificationReport};

// ---------------------------------------------------------------------------
// Inputs and outputs
// ---------------------------------------------------------------------------

/// The authenticated caller of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Requester {
    pub user_id: DbId,
    pub is_admin: bool,
}

impl Requester {
    pub fn user(user_id: DbId) -> Self {
        Self {
            user_id,
            is_admin: false,
        }
    }

    pub fn admin(user_id: DbId) -> Self {
        Self {
            user_id,
            is_admin: true,
        }
    }

    fn may_access(&self, incident: &Incident) -> bool {
        self.is_admin || incident.owner_id == self.user_id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerReceipt {
    pub incident_id: DbId,
    pub status: IncidentStatus,
    pub contacts_notified: usize,
    pub tracking_link: String,
    /// `true` when an already open incident was returned.
    pub resumed: bool,
}

/// Result of a trigger: the receipt plus, for a newly created incident,
/// the running notification task.
#[derive(Debug)]
pub struct Triggered {
    pub receipt: TriggerReceipt,
    pub notification: Option<JoinHandle<NotificationReport>>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationAck {
    pub incident_id: DbId,
    pub status: IncidentStatus,
    pub current_location: LocationSample,
    pub history_len: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveReceipt {
    pub incident_id: DbId,
    pub status: IncidentStatus,
    pub ended_at: Timestamp,
    pub already_resolved: bool,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

pub struct IncidentEngine {
    incidents: Arc<dyn IncidentStore>,
    users: Arc<dyn UserStore>,
    dispatcher: Arc<NotificationDispatcher>,
    bus: Arc<EventBus>,
    config: EngineConfig,
}

impl IncidentEngine {
    pub fn new(
        incidents: Arc<dyn IncidentStore>,
        users: Arc<dyn UserStore>,
        dispatcher: Arc<NotificationDispatcher>,
        bus: Arc<EventBus>,
        config: EngineConfig,
    ) -> Self {
        Self {
            incidents,
            users,
            dispatcher,
            bus,
            config,
        }
    }

    /// Verify the incident store answers.
    pub async fn health_check(&self) -> Result<(), SosError> {
        Ok(self.incidents.health_check().await?)
    }

    /// Start an incident for `user_id`, or return the one already open.
    ///
    /// Order of checks: user exists, gate allows, coordinates are valid.
    /// Contacts are notified only when a new incident is created.
    pub async fn trigger(&self, user_id: DbId, coords: &Coordinates) -> Result<Triggered, SosError> {
        let user = self
            .users
            .get_by_id(user_id)
            .await?
            .ok_or(SosError::UserNotFound(user_id))?;

        if let Authorization::Deny(reason) = authorize(&user) {
            tracing::warn!(user_id, reason = reason.as_str(), "SOS trigger blocked");
            return Err(SosError::SignalBlocked(reason));
        }

        // The initial fix is always stamped with server time.
        let now = Utc::now().trunc_subsecs(6);
        let sample = geo::to_sample(
            &Coordinates {
                captured_at: None,
                ..*coords
            },
            now,
            self.config.max_clock_skew_secs,
        )?;

        let contacts = resolve_contacts(&user.emergency_contacts);
        let new = NewIncident {
            owner_id: user.id,
            identifier: user.name.clone(),
            initial_location: sample,
            notified_contacts: queued_contacts(&contacts),
            started_at: now,
        };

        match self.incidents.claim_open(new).await? {
            OpenClaim::Created(incident) => {
                let tracking_link = self.tracking_link(&incident.current_location);
                tracing::info!(
                    incident_id = incident.id,
                    owner_id = user.id,
                    contacts = contacts.len(),
                    "SOS incident created"
                );
                self.bus.publish(
                    IncidentEvent::new(EventKind::Triggered, incident.id)
                        .by(user.id)
                        .with_payload(serde_json::json!({
                            "status": incident.status,
                            "location": incident.current_location,
                            "contacts": contacts.len(),
                        })),
                );

                let notification = notify::spawn(
                    FanOut {
                        incident_id: incident.id,
                        owner_id: user.id,
                        alert: self.alert_for(&user, &incident, &tracking_link),
                        contacts,
                    },
                    Arc::clone(&self.dispatcher),
                    Arc::clone(&self.incidents),
                    Arc::clone(&self.bus),
                );

                Ok(Triggered {
                    receipt: TriggerReceipt {
                        incident_id: incident.id,
                        status: incident.status,
                        contacts_notified: incident.notified_contacts.len(),
                        tracking_link,
                        resumed: false,
                    },
                    notification: Some(notification),
                })
            }
            OpenClaim::Existing(incident) => {
                tracing::info!(
                    incident_id = incident.id,
                    owner_id = user.id,
                    "SOS trigger resumed open incident"
                );
                self.bus.publish(
                    IncidentEvent::new(EventKind::Resumed, incident.id)
                        .by(user.id),
                );
                Ok(Triggered {
                    receipt: TriggerReceipt {
                        incident_id: incident.id,
                        status: incident.status,
                        contacts_notified: incident.notified_contacts.len(),
                        tracking_link: self.tracking_link(&incident.current_location),
                        resumed: true,
                    },
                    notification: None,
                })
            }
        }
    }

    /// Apply a location sample to a live incident.
    ///
    /// A sample without `capturedAt` is stamped with server time.
    pub async fn update_location(
        &self,
        incident_id: DbId,
        coords: &Coordinates,
    ) -> Result<LocationAck, SosError> {
        let sample = geo::to_sample(coords, Utc::now(), self.config.max_clock_skew_secs)?;
        let from = IncidentStatus::sources_of(IncidentStatus::Moving);

        let write = LocationWrite {
            sample,
            from: &from,
            to: IncidentStatus::Moving,
        };
        if let Some(incident) = self.incidents.append_location(incident_id, write).await? {
            tracing::debug!(incident_id, lat = sample.lat, lng = sample.lng, "Location updated");
            self.bus.publish(
                IncidentEvent::new(EventKind::LocationUpdated, incident_id)
                    .by(incident.owner_id)
                    .with_payload(serde_json::json!({ "location": sample })),
            );
            return Ok(LocationAck {
                incident_id,
                status: incident.status,
                current_location: incident.current_location,
                history_len: incident.location_history.len(),
            });
        }

        let err = match self.incidents.find_by_id(incident_id).await? {
            None => SosError::IncidentInactive {
                id: incident_id,
                status: None,
            },
            Some(current) if !current.status.accepts_location() => SosError::IncidentInactive {
                id: incident_id,
                status: Some(current.status),
            },
            Some(current) => SosError::StaleSample {
                sample: sample.captured_at,
                current: current.current_location.captured_at,
            },
        };
        tracing::debug!(incident_id, code = err.code(), "Location update rejected");
        Err(err)
    }

    /// Close an incident. Owners may close their own; admins may close any.
    pub async fn resolve(
        &self,
        incident_id: DbId,
        requester: Requester,
    ) -> Result<ResolveReceipt, SosError> {
        let incident = self
            .incidents
            .find_by_id(incident_id)
            .await?
            .ok_or(SosError::NotFound(incident_id))?;
        if !requester.may_access(&incident) {
            return Err(SosError::Forbidden);
        }

        let from = IncidentStatus::sources_of(IncidentStatus::Resolved);
        let write = CloseWrite {
            owner_guard: (!requester.is_admin).then_some(requester.user_id),
            from: &from,
            to: IncidentStatus::Resolved,
            ended_at: Utc::now().trunc_subsecs(6),
        };

        let closed = match self.incidents.close(incident_id, write).await? {
            Some(closed) => closed,
            None => return self.classify_close_rejection(incident_id).await,
        };
        let ended_at = closed.ended_at.unwrap_or(closed.updated_at);

        tracing::info!(
            incident_id,
            resolved_by = requester.user_id,
            admin = requester.is_admin,
            "SOS incident resolved"
        );
        self.bus.publish(
            IncidentEvent::new(EventKind::Resolved, incident_id)
                .by(requester.user_id)
                .with_payload(serde_json::json!({
                    "ended_at": ended_at,
                    "admin_override": requester.is_admin && requester.user_id != closed.owner_id,
                })),
        );

        Ok(ResolveReceipt {
            incident_id,
            status: closed.status,
            ended_at,
            already_resolved: false,
        })
    }

    async fn classify_close_rejection(&self, incident_id: DbId) -> Result<ResolveReceipt, SosError> {
        let current = self
            .incidents
            .find_by_id(incident_id)
            .await?
            .ok_or(SosError::NotFound(incident_id))?;

        match (current.status, current.ended_at) {
            (IncidentStatus::Resolved, Some(ended_at)) => Ok(ResolveReceipt {
                incident_id,
                status: IncidentStatus::Resolved,
                ended_at,
                already_resolved: true,
            }),
            // Still live: only the owner guard can have refused the write.
            (status, _) if status.accepts_location() => Err(SosError::Forbidden),
            _ => Err(SosError::AlreadyResolved(incident_id)),
        }
    }

    /// Public tracking view of an incident.
    pub async fn lookup(&self, incident_id: DbId) -> Result<IncidentView, SosError> {
        let incident = self
            .incidents
            .find_by_id(incident_id)
            .await?
            .ok_or(SosError::NotFound(incident_id))?;
        Ok(IncidentView::from(&incident))
    }

    /// The caller's open incident, so a reloaded client can resume tracking.
    pub async fn active_for_user(&self, user_id: DbId) -> Result<Option<IncidentView>, SosError> {
        Ok(self
            .incidents
            .find_open_for_owner(user_id)
            .await?
            .as_ref()
            .map(IncidentView::from))
    }

    /// Full location history, oldest first.
    pub async fn history(
        &self,
        incident_id: DbId,
        requester: Requester,
    ) -> Result<Vec<LocationSample>, SosError> {
        let incident = self
            .incidents
            .find_by_id(incident_id)
            .await?
            .ok_or(SosError::NotFound(incident_id))?;
        if !requester.may_access(&incident) {
            return Err(SosError::Forbidden);
        }
        Ok(incident.location_history)
    }

    /// Administrative incident search.
    ///
    /// An email or a digits-only phone number resolves to its owner's
    /// incidents; anything else matches the incident identifier, ignoring case.
    pub async fn search(&self, raw_query: &str) -> Result<Vec<Incident>, SosError> {
        let limit = self.config.search_limit;
        let query = normalize_search_query(raw_query)
            .ok_or_else(|| SosError::InvalidQuery("search query is empty".into()))?;

        let results = match query {
            SearchQuery::Email(email) => match self.users.get_by_email(&email).await? {
                Some(owner) => self.incidents.list_for_owner(owner.id, limit).await?,
                None => Vec::new(),
            },
            SearchQuery::Phone(digits) => match self.users.get_by_phone(&digits).await? {
                Some(owner) => self.incidents.list_for_owner(owner.id, limit).await?,
                None => Vec::new(),
            },
            SearchQuery::Identifier(text) => {
                self.incidents.search_by_identifier(&text, limit).await?
            }
        };
        tracing::debug!(results = results.len(), "Incident search");
        Ok(results)
    }

    fn tracking_link(&self, at: &LocationSample) -> String {
        geo::tracking_link(&self.config.tracking_base_url, at.lat, at.lng)
    }

    fn alert_for(&self, user: &UserProfile, incident: &Incident, link: &str) -> AlertMessage {
        AlertMessage::new(
            self.config.alert_sender_name.as_str(),
            &user.name,
            link,
            incident.started_at,
        )
    }
}
