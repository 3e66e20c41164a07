//! In-process stores.
//!
//! Each operation runs inside one short `std::sync::Mutex` critical section
//! with no await inside, which gives the same atomicity the Postgres store
//! gets from its conditional statements.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{SubsecRound, Utc};
use traceam_core::incident::{ContactChannel, DeliveryState, Incident, NewIncident};
use traceam_core::store::{CloseWrite, IncidentStore, LocationWrite, OpenClaim, StoreError, UserStore};
use traceam_core::types::DbId;
use traceam_core::user::UserProfile;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// Incidents
// ---------------------------------------------------------------------------

#[derive(Default)]
struct IncidentTable {
    next_id: DbId,
    rows: BTreeMap<DbId, Incident>,
}

impl IncidentTable {
    fn open_for_owner(&self, owner_id: DbId) -> Option<&Incident> {
        self.rows
            .values()
            .find(|i| i.owner_id == owner_id && i.status.is_open())
    }
}

/// [`IncidentStore`] held in memory.
#[derive(Default)]
pub struct MemoryIncidentStore {
    table: Mutex<IncidentTable>,
    unavailable: AtomicBool,
}

impl MemoryIncidentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail with [`StoreError::Unavailable`].
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Insert a record as-is, for seeding states the engine never produces.
    pub fn insert_raw(&self, incident: Incident) {
        let mut table = lock(&self.table);
        table.next_id = table.next_id.max(incident.id);
        table.rows.insert(incident.id, incident);
    }

    pub(crate) fn open_id_for_owner(&self, owner_id: DbId) -> Option<DbId> {
        lock(&self.table).open_for_owner(owner_id).map(|i| i.id)
    }

    fn check(&self) -> Result<(), StoreError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl IncidentStore for MemoryIncidentStore {
    async fn claim_open(&self, new: NewIncident) -> Result<OpenClaim, StoreError> {
        self.check()?;
        let mut table = lock(&self.table);
        if let Some(existing) = table.open_for_owner(new.owner_id) {
            return Ok(OpenClaim::Existing(existing.clone()));
        }
        table.next_id += 1;
        let incident = new.into_incident(table.next_id);
        table.rows.insert(incident.id, incident.clone());
        Ok(OpenClaim::Created(incident))
    }

    async fn find_by_id(&self, id: DbId) -> Result<Option<Incident>, StoreError> {
        self.check()?;
        Ok(lock(&self.table).rows.get(&id).cloned())
    }

    async fn find_open_for_owner(&self, owner_id: DbId) -> Result<Option<Incident>, StoreError> {
        self.check()?;
        Ok(lock(&self.table).open_for_owner(owner_id).cloned())
    }

    async fn append_location(
        &self,
        id: DbId,
        write: LocationWrite<'_>,
    ) -> Result<Option<Incident>, StoreError> {
        self.check()?;
        let mut table = lock(&self.table);
        let Some(incident) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        if !write.from.contains(&incident.status)
            || incident.current_location.captured_at >= write.sample.captured_at
        {
            return Ok(None);
        }
        incident.current_location = write.sample;
        incident.location_history.push(write.sample);
        incident.status = write.to;
        incident.updated_at = Utc::now().trunc_subsecs(6);
        Ok(Some(incident.clone()))
    }

    async fn close(&self, id: DbId, write: CloseWrite<'_>) -> Result<Option<Incident>, StoreError> {
        self.check()?;
        let mut table = lock(&self.table);
        let Some(incident) = table.rows.get_mut(&id) else {
            return Ok(None);
        };
        if !write.from.contains(&incident.status)
            || write.owner_guard.is_some_and(|owner| owner != incident.owner_id)
        {
            return Ok(None);
        }
        incident.status = write.to;
        incident.ended_at = Some(write.ended_at);
        incident.updated_at = Utc::now().trunc_subsecs(6);
        Ok(Some(incident.clone()))
    }

    async fn record_delivery(
        &self,
        id: DbId,
        channel: ContactChannel,
        state: DeliveryState,
    ) -> Result<(), StoreError> {
        self.check()?;
        let mut table = lock(&self.table);
        if let Some(incident) = table.rows.get_mut(&id) {
            incident
                .notified_contacts
                .iter_mut()
                .filter(|c| c.channel == channel)
                .for_each(|c| c.delivery_state = state);
        }
        Ok(())
    }

    async fn search_by_identifier(
        &self,
        identifier: &str,
        limit: i64,
    ) -> Result<Vec<Incident>, StoreError> {
        self.check()?;
        let needle = identifier.to_lowercase();
        Ok(newest_first(
            lock(&self.table)
                .rows
                .values()
                .filter(|i| i.identifier.to_lowercase() == needle),
            limit,
        ))
    }

    async fn list_for_owner(&self, owner_id: DbId, limit: i64) -> Result<Vec<Incident>, StoreError> {
        self.check()?;
        Ok(newest_first(
            lock(&self.table).rows.values().filter(|i| i.owner_id == owner_id),
            limit,
        ))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.check()
    }
}

fn newest_first<'a>(rows: impl Iterator<Item = &'a Incident>, limit: i64) -> Vec<Incident> {
    let mut found: Vec<Incident> = rows.cloned().collect();
    found.sort_by(|a, b| b.started_at.cmp(&a.started_at).then(b.id.cmp(&a.id)));
    found.truncate(usize::try_from(limit).unwrap_or(0));
    found
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

/// [`UserStore`] held in memory. `active_incident_id` is derived from the
/// paired incident store on every read.
pub struct MemoryUserStore {
    users: Mutex<HashMap<DbId, UserProfile>>,
    incidents: Arc<MemoryIncidentStore>,
}

impl MemoryUserStore {
    pub fn new(incidents: Arc<MemoryIncidentStore>) -> Self {
        Self {
            users: Mutex::new(HashMap::new()),
            incidents,
        }
    }

    /// Insert or replace a user.
    pub fn upsert(&self, user: UserProfile) {
        lock(&self.users).insert(user.id, user);
    }

    fn with_active_incident(&self, mut user: UserProfile) -> UserProfile {
        user.active_incident_id = self.incidents.open_id_for_owner(user.id);
        user
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn get_by_id(&self, id: DbId) -> Result<Option<UserProfile>, StoreError> {
        let user = lock(&self.users).get(&id).cloned();
        Ok(user.map(|u| self.with_active_incident(u)))
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserProfile>, StoreError> {
        let needle = email.to_lowercase();
        let user = lock(&self.users)
            .values()
            .find(|u| u.email.to_lowercase() == needle)
            .cloned();
        Ok(user.map(|u| self.with_active_incident(u)))
    }

    async fn get_by_phone(&self, digits: &str) -> Result<Option<UserProfile>, StoreError> {
        let user = lock(&self.users)
            .values()
            .find(|u| u.phone_matches(digits))
            .cloned();
        Ok(user.map(|u| self.with_active_incident(u)))
    }
}
