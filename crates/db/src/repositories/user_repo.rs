//! Repository for the `users` table.
//!
//! Accounts are managed elsewhere; this side only reads them, together with
//! the id of the owner's open incident, if any.

use async_trait::async_trait;
use sqlx::PgPool;
use traceam_core::incident::OPEN_STATUSES;
use traceam_core::store::{StoreError, UserStore};
use traceam_core::types::DbId;
use traceam_core::user::UserProfile;

use crate::models::user::UserRow;
use crate::store_err;

/// Column list for `users` queries, including the derived open incident.
const COLUMNS: &str = "u.id, u.name, u.email, u.phone, u.role, u.kyc_status, u.emergency_contacts, \
                       u.created_at, \
                       (SELECT i.id FROM incidents i \
                        WHERE i.owner_id = u.id AND i.status = ANY($2) \
                        LIMIT 1) AS active_incident_id";

fn open_status_names() -> Vec<String> {
    OPEN_STATUSES.iter().map(|s| s.as_str().to_string()).collect()
}

/// Provides read operations for users.
pub struct UserRepo;

impl UserRepo {
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<UserRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users u WHERE u.id = $1");
        sqlx::query_as::<_, UserRow>(&query)
            .bind(id)
            .bind(open_status_names())
            .fetch_optional(pool)
            .await
    }

    /// Find a user by email, ignoring case.
    pub async fn find_by_email(pool: &PgPool, email: &str) -> Result<Option<UserRow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM users u WHERE LOWER(u.email) = LOWER($1)");
        sqlx::query_as::<_, UserRow>(&query)
            .bind(email)
            .bind(open_status_names())
            .fetch_optional(pool)
            .await
    }

    /// Find a user by phone, comparing digits only.
    pub async fn find_by_phone_digits(
        pool: &PgPool,
        digits: &str,
    ) -> Result<Option<UserRow>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM users u \
             WHERE regexp_replace(u.phone, '[^0-9]', '', 'g') = $1 \
             ORDER BY u.id LIMIT 1"
        );
        sqlx::query_as::<_, UserRow>(&query)
            .bind(digits)
            .bind(open_status_names())
            .fetch_optional(pool)
            .await
    }
}

/// [`UserStore`] backed by Postgres.
#[derive(Debug, Clone)]
pub struct PgUserStore {
    pool: PgPool,
}

impl PgUserStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserStore for PgUserStore {
    async fn get_by_id(&self, id: DbId) -> Result<Option<UserProfile>, StoreError> {
        UserRepo::find_by_id(&self.pool, id)
            .await
            .map_err(store_err)?
            .map(UserProfile::try_from)
            .transpose()
    }

    async fn get_by_email(&self, email: &str) -> Result<Option<UserProfile>, StoreError> {
        UserRepo::find_by_email(&self.pool, email)
            .await
            .map_err(store_err)?
            .map(UserProfile::try_from)
            .transpose()
    }

    async fn get_by_phone(&self, digits: &str) -> Result<Option<UserProfile>, StoreError> {
        if digits.is_empty() {
            return Ok(None);
        }
        UserRepo::find_by_phone_digits(&self.pool, digits)
            .await
            .map_err(store_err)?
            .map(UserProfile::try_from)
            .transpose()
    }
}
