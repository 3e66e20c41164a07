//! Email delivery via SMTP.
//!
//! [`SmtpEmail`] holds one `lettre` async transport and sends each
//! recipient a separate copy so contacts never see each other's address.
//! If `SMTP_HOST` is not set, [`EmailConfig::from_env`] returns `None`.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{DeliveryError, EmailChannel};

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    Build(String),
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

const DEFAULT_FROM_ADDRESS: &str = "alerts@traceam.local";

#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// | Variable        | Required | Default                |
    /// |-----------------|----------|------------------------|
    /// | `SMTP_HOST`     | yes      |                        |
    /// | `SMTP_PORT`     | no       | `587`                  |
    /// | `SMTP_FROM`     | no       | `alerts@traceam.local` |
    /// | `SMTP_USER`     | no       |                        |
    /// | `SMTP_PASSWORD` | no       |                        |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// SmtpEmail
// ---------------------------------------------------------------------------

/// SMTP-backed [`EmailChannel`].
pub struct SmtpEmail {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
}

impl SmtpEmail {
    pub fn new(config: EmailConfig) -> Result<Self, EmailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port);

        if let (Some(user), Some(pass)) = (config.smtp_user, config.smtp_password) {
            builder = builder.credentials(Credentials::new(user, pass));
        }

        Ok(Self {
            mailer: builder.build(),
            from_address: config.from_address,
        })
    }

    fn build_message(&self, to: &str, subject: &str, body: &str) -> Result<Message, EmailError> {
        Message::builder()
            .from(self.from_address.parse()?)
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body.to_string())
            .map_err(|e| EmailError::Build(e.to_string()))
    }
}

#[async_trait]
impl EmailChannel for SmtpEmail {
    /// Attempts every recipient and returns the first failure, if any.
    async fn send(&self, to: &[String], subject: &str, body: &str) -> Result<(), DeliveryError> {
        let mut first_err: Option<EmailError> = None;
        let mut sent = 0usize;

        for address in to {
            let result = match self.build_message(address, subject, body) {
                Ok(message) => self.mailer.send(message).await.map(|_| ()).map_err(EmailError::from),
                Err(e) => Err(e),
            };
            match result {
                Ok(()) => sent += 1,
                Err(e) => {
                    tracing::warn!(to = %address, error = %e, "Alert email failed");
                    first_err.get_or_insert(e);
                }
            }
        }

        tracing::info!(sent, total = to.len(), "Alert emails sent");
        match first_err {
            Some(e) => Err(e.into()),
            None => Ok(()),
        }
    }
}
