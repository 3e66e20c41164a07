//! TraceAM event bus and alert delivery.
//!
//! - [`EventBus`] -- in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`IncidentEvent`] -- one incident lifecycle change, typed by [`EventKind`].
//! - [`EventPersistence`] -- background writer of every event to the
//!   `events` audit table.
//! - [`delivery`] -- SMS (Termii) and email (SMTP) channels.
//! - [`NotificationDispatcher`] -- sends one alert over both channels and
//!   reports a [`DeliveryOutcome`] per channel.

pub mod bus;
pub mod delivery;
pub mod dispatcher;
pub mod persistence;

pub use bus::{EventBus, EventKind, IncidentEvent};
pub use delivery::email::{EmailConfig, SmtpEmail};
pub use delivery::sms::{SmsConfig, TermiiSms};
pub use delivery::{DeliveryError, EmailChannel, OfflineChannel, SmsChannel};
pub use dispatcher::{AlertMessage, DeliveryOutcome, NotificationDispatcher};
pub use persistence::EventPersistence;
