//! SMS delivery through the Termii gateway.
//!
//! One POST to `{base}/api/sms/send` carries every recipient. There is no
//! retry here; the caller decides what a failure means.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;

use super::{DeliveryError, SmsChannel};

/// HTTP timeout for a single gateway call.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_TERMII_BASE_URL: &str = "https://api.ng.termii.com";
const DEFAULT_SENDER_ID: &str = "TraceAM";

#[derive(Debug, thiserror::Error)]
pub enum SmsError {
    /// Network, DNS or timeout failure.
    #[error("SMS request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("SMS gateway returned HTTP {0}")]
    HttpStatus(u16),
}

/// Configuration for the Termii gateway.
#[derive(Debug, Clone)]
pub struct SmsConfig {
    pub api_key: String,
    pub base_url: String,
    /// Alphanumeric sender shown on the handset.
    pub sender_id: String,
}

impl SmsConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `TERMII_API_KEY` is not set, meaning the SMS
    /// channel is offline.
    ///
    /// | Variable           | Required | Default                     |
    /// |--------------------|----------|-----------------------------|
    /// | `TERMII_API_KEY`   | yes      |                             |
    /// | `TERMII_BASE_URL`  | no       | `https://api.ng.termii.com` |
    /// | `TERMII_SENDER_ID` | no       | `TraceAM`                   |
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("TERMII_API_KEY").ok()?;
        Some(Self {
            api_key,
            base_url: std::env::var("TERMII_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_TERMII_BASE_URL.to_string()),
            sender_id: std::env::var("TERMII_SENDER_ID")
                .unwrap_or_else(|_| DEFAULT_SENDER_ID.to_string()),
        })
    }
}

/// Body of a Termii `sms/send` request.
#[derive(Debug, Serialize)]
struct SendRequest<'a> {
    to: &'a [String],
    from: &'a str,
    sms: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    channel: &'static str,
    api_key: &'a str,
}

/// Termii-backed [`SmsChannel`].
pub struct TermiiSms {
    client: reqwest::Client,
    config: SmsConfig,
}

impl TermiiSms {
    pub fn new(config: SmsConfig) -> Result<Self, SmsError> {
        let client = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/api/sms/send", self.config.base_url.trim_end_matches('/'))
    }

    fn request<'a>(&'a self, to: &'a [String], message: &'a str) -> SendRequest<'a> {
        SendRequest {
            to,
            from: &self.config.sender_id,
            sms: message,
            kind: "plain",
            channel: "generic",
            api_key: &self.config.api_key,
        }
    }
}

#[async_trait]
impl SmsChannel for TermiiSms {
    async fn send(&self, to: &[String], message: &str) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(self.endpoint())
            .json(&self.request(to, message))
            .send()
            .await
            .map_err(SmsError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SmsError::HttpStatus(status.as_u16()).into());
        }

        tracing::info!(recipients = to.len(), "Emergency SMS sent");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> TermiiSms {
        TermiiSms::new(SmsConfig {
            api_key: "key".into(),
            base_url: "https://sms.example.com/".into(),
            sender_id: "TraceAM".into(),
        })
        .unwrap()
    }

    #[test]
    fn request_body_matches_gateway_contract() {
        let sms = gateway();
        let to = vec!["08011112222".to_string()];
        let body = serde_json::to_value(sms.request(&to, "help")).unwrap();

        assert_eq!(
            body,
            serde_json::json!({
                "to": ["08011112222"],
                "from": "TraceAM",
                "sms": "help",
                "type": "plain",
                "channel": "generic",
                "api_key": "key",
            })
        );
    }

    #[test]
    fn endpoint_ignores_trailing_slash() {
        assert_eq!(gateway().endpoint(), "https://sms.example.com/api/sms/send");
    }

    #[test]
    fn http_status_error_display() {
        assert_eq!(SmsError::HttpStatus(401).to_string(), "SMS gateway returned HTTP 401");
    }
}
