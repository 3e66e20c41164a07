//! Repositories over the TraceAM tables.

pub mod event_repo;
pub mod incident_repo;
pub mod user_repo;

pub use event_repo::EventRepo;
pub use incident_repo::{IncidentRepo, PgIncidentStore};
pub use user_repo::{PgUserStore, UserRepo};
