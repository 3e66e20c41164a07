//! HS256 bearer tokens.
//!
//! [`JwtKeys`] is built once from [`JwtConfig`] at startup and shared through
//! `AppState`, so a request only pays for signature and claim checks.

use chrono::Utc;
use jsonwebtoken::errors::Error as JwtError;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use traceam_core::types::DbId;
use uuid::Uuid;

/// Payload of an access token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: DbId,
    /// `"user"` or `"admin"`.
    pub role: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
    /// Lifetime of tokens minted by [`JwtKeys::issue`].
    pub access_token_expiry_mins: i64,
    /// Clock drift tolerated when checking `exp`.
    pub leeway_secs: u64,
}

const DEFAULT_ACCESS_EXPIRY_MINS: i64 = 60;
const DEFAULT_LEEWAY_SECS: u64 = 30;

impl JwtConfig {
    /// | Env Var                  | Required | Default |
    /// |--------------------------|----------|---------|
    /// | `JWT_SECRET`             | **yes**  | --      |
    /// | `JWT_ACCESS_EXPIRY_MINS` | no       | `60`    |
    /// | `JWT_LEEWAY_SECS`        | no       | `30`    |
    ///
    /// # Panics
    ///
    /// Panics if `JWT_SECRET` is missing or empty, or a number is malformed.
    pub fn from_env() -> Self {
        let secret = std::env::var("JWT_SECRET").unwrap_or_default();
        assert!(!secret.is_empty(), "JWT_SECRET must be set and non-empty");

        let access_token_expiry_mins = std::env::var("JWT_ACCESS_EXPIRY_MINS")
            .map(|v| v.parse().expect("JWT_ACCESS_EXPIRY_MINS must be a valid i64"))
            .unwrap_or(DEFAULT_ACCESS_EXPIRY_MINS);
        let leeway_secs = std::env::var("JWT_LEEWAY_SECS")
            .map(|v| v.parse().expect("JWT_LEEWAY_SECS must be a valid u64"))
            .unwrap_or(DEFAULT_LEEWAY_SECS);

        Self {
            secret,
            access_token_expiry_mins,
            leeway_secs,
        }
    }
}

/// Signing and verification keys derived from one shared secret.
#[derive(Clone)]
pub struct JwtKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    expiry_secs: i64,
}

impl JwtKeys {
    pub fn new(config: &JwtConfig) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = config.leeway_secs;

        Self {
            encoding: EncodingKey::from_secret(config.secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.secret.as_bytes()),
            validation,
            expiry_secs: config.access_token_expiry_mins * 60,
        }
    }

    /// Mint a token for `user_id`. Production tokens come from the account
    /// service; this is used by tests and operator tooling.
    pub fn issue(&self, user_id: DbId, role: &str) -> Result<String, JwtError> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: user_id,
            role: role.to_string(),
            exp: now + self.expiry_secs,
            iat: now,
            jti: Uuid::new_v4().to_string(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
    }

    /// Check signature, algorithm and expiry.
    pub fn verify(&self, token: &str) -> Result<Claims, JwtError> {
        decode::<Claims>(token, &self.decoding, &self.validation).map(|data| data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> JwtConfig {
        JwtConfig {
            secret: "unit-test-secret-long-enough-for-hs256".to_string(),
            access_token_expiry_mins: 15,
            leeway_secs: 0,
        }
    }

    #[test]
    fn issued_token_verifies() {
        let keys = JwtKeys::new(&config());
        let claims = keys.verify(&keys.issue(42, "admin").unwrap()).unwrap();

        assert_eq!(claims.sub, 42);
        assert_eq!(claims.role, "admin");
        assert_eq!(claims.exp - claims.iat, 15 * 60);
    }

    #[test]
    fn foreign_secret_is_rejected() {
        let token = JwtKeys::new(&config()).issue(1, "user").unwrap();
        let other = JwtKeys::new(&JwtConfig {
            secret: "some-other-secret-of-similar-length".to_string(),
            ..config()
        });
        assert!(other.verify(&token).is_err());
    }

    #[test]
    fn expired_token_is_rejected() {
        let keys = JwtKeys::new(&JwtConfig {
            access_token_expiry_mins: -10,
            ..config()
        });
        assert!(keys.verify(&keys.issue(1, "user").unwrap()).is_err());
    }

    #[test]
    fn leeway_tolerates_small_clock_drift() {
        let keys = JwtKeys::new(&JwtConfig {
            access_token_expiry_mins: 0,
            leeway_secs: 60,
            ..config()
        });
        assert!(keys.verify(&keys.issue(1, "user").unwrap()).is_ok());
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(JwtKeys::new(&config()).verify("not.a.token").is_err());
    }
}
