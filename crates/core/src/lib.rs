//! TraceAM domain core.
//!
//! Pure types and rules for the SOS incident lifecycle, free of I/O:
//!
//! - [`contacts`] -- emergency contact shape and the contact resolver.
//! - [`authorization`] -- the KYC / contacts gate for triggering an SOS.
//! - [`incident`] -- the incident status machine and records.
//! - [`geo`] -- coordinate validation and location samples.
//! - [`store`] -- persistence traits implemented by `traceam-db` and the
//!   in-memory stores.
//! - [`error`] -- the typed [`SosError`](error::SosError) taxonomy.

pub mod authorization;
pub mod contacts;
pub mod error;
pub mod geo;
pub mod incident;
pub mod store;
pub mod types;
pub mod user;
