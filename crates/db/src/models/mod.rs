pub mod event;
pub mod incident;
pub mod user;
