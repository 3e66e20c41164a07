use std::fmt::Display;
use std::str::FromStr;

use crate::auth::jwt::JwtConfig;

/// Server configuration loaded from environment variables.
///
/// Every field except the database URL and JWT secret has a default suited
/// to local development.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins, parsed from comma-separated `CORS_ORIGINS`.
    pub cors_origins: Vec<String>,
    pub request_timeout_secs: u64,
    /// Upper bound on draining background tasks after shutdown.
    pub shutdown_timeout_secs: u64,
    pub database_url: String,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
}

impl ServerConfig {
    /// | Env Var                    | Default                 |
    /// |----------------------------|-------------------------|
    /// | `HOST`                     | `0.0.0.0`               |
    /// | `PORT`                     | `3000`                  |
    /// | `CORS_ORIGINS`             | `http://localhost:3001` |
    /// | `REQUEST_TIMEOUT_SECS`     | `30`                    |
    /// | `SHUTDOWN_TIMEOUT_SECS`    | `10`                    |
    /// | `DATABASE_URL`             | **required**            |
    /// | `DATABASE_MAX_CONNECTIONS` | `20`                    |
    ///
    /// Plus the [`JwtConfig::from_env`] block.
    pub fn from_env() -> Self {
        let cors_origins = std::env::var("CORS_ORIGINS")
            .unwrap_or_else(|_| "http://localhost:3001".into())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();

        Self {
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            port: env_or("PORT", 3000),
            cors_origins,
            request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30),
            shutdown_timeout_secs: env_or("SHUTDOWN_TIMEOUT_SECS", 10),
            database_url: std::env::var("DATABASE_URL").expect("DATABASE_URL must be set"),
            database_max_connections: env_or(
                "DATABASE_MAX_CONNECTIONS",
                traceam_db::DEFAULT_MAX_CONNECTIONS,
            ),
            jwt: JwtConfig::from_env(),
        }
    }
}

/// Parse `key` if set, else `default`. Panics on a malformed value.
fn env_or<T>(key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .unwrap_or_else(|e| panic!("{key} is not valid ({raw:?}): {e}")),
        Err(_) => default,
    }
}
