pub mod admin;
pub mod health;
pub mod incidents;
pub mod sos;
