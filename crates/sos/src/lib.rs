//! The SOS incident lifecycle engine.
//!
//! [`IncidentEngine`] runs the authorization gate, the incident state
//! machine and the contact fan-out on top of the store traits from
//! `traceam_core::store`. [`memory`] holds in-process stores for tests and
//! local runs without Postgres.

pub mod config;
pub mod engine;
pub mod memory;
mod notify;

pub use config::EngineConfig;
pub use engine::{
    IncidentEngine, LocationAck, ResolveReceipt, Requester, TriggerReceipt, Triggered,
};
pub use memory::{MemoryIncidentStore, MemoryUserStore};
pub use notify::NotificationReport;
