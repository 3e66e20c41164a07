//! Alert delivery channels.
//!
//! [`SmsChannel`] and [`EmailChannel`] are the seams the dispatcher sends
//! through. Production uses [`TermiiSms`](sms::TermiiSms) and
//! [`SmtpEmail`](email::SmtpEmail); an [`OfflineChannel`] stands in for a
//! channel with no configuration.

use async_trait::async_trait;

pub mod email;
pub mod sms;

use email::EmailError;
use sms::SmsError;

/// Failure of a single send attempt on one channel.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The channel has no credentials or host configured.
    #[error("{0} channel not configured")]
    NotConfigured(&'static str),

    #[error(transparent)]
    Sms(#[from] SmsError),

    #[error(transparent)]
    Email(#[from] EmailError),
}

#[async_trait]
pub trait SmsChannel: Send + Sync {
    /// Send one text to every phone in `to`.
    async fn send(&self, to: &[String], message: &str) -> Result<(), DeliveryError>;
}

#[async_trait]
pub trait EmailChannel: Send + Sync {
    /// Send one plain-text email to every address in `to`.
    async fn send(&self, to: &[String], subject: &str, body: &str) -> Result<(), DeliveryError>;
}

/// A channel that is not configured. Every send fails with
/// [`DeliveryError::NotConfigured`].
#[derive(Debug, Clone, Copy)]
pub struct OfflineChannel {
    name: &'static str,
}

impl OfflineChannel {
    pub fn sms() -> Self {
        Self { name: "sms" }
    }

    pub fn email() -> Self {
        Self { name: "email" }
    }
}

#[async_trait]
impl SmsChannel for OfflineChannel {
    async fn send(&self, to: &[String], _message: &str) -> Result<(), DeliveryError> {
        tracing::warn!(recipients = to.len(), "SMS gateway offline, alert not sent");
        Err(DeliveryError::NotConfigured(self.name))
    }
}

#[async_trait]
impl EmailChannel for OfflineChannel {
    async fn send(&self, to: &[String], _subject: &str, _body: &str) -> Result<(), DeliveryError> {
        tracing::warn!(recipients = to.len(), "SMTP not configured, alert not sent");
        Err(DeliveryError::NotConfigured(self.name))
    }
}
