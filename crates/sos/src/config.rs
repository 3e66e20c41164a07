use traceam_core::geo::{
    CLOCK_SKEW_CEILING_SECS, DEFAULT_MAX_CLOCK_SKEW_SECS, DEFAULT_TRACKING_BASE_URL,
};

/// Default sender name printed at the start of every alert.
pub const DEFAULT_ALERT_SENDER_NAME: &str = "TRACEAM";

/// Default cap on rows returned by incident search and history listings.
pub const DEFAULT_SEARCH_LIMIT: i64 = 50;

/// Incident engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Prefix of the map link; `"{lat},{lng}"` is appended.
    pub tracking_base_url: String,
    pub alert_sender_name: String,
    /// How far ahead of server time a client `capturedAt` may be.
    pub max_clock_skew_secs: i64,
    pub search_limit: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tracking_base_url: DEFAULT_TRACKING_BASE_URL.to_string(),
            alert_sender_name: DEFAULT_ALERT_SENDER_NAME.to_string(),
            max_clock_skew_secs: DEFAULT_MAX_CLOCK_SKEW_SECS,
            search_limit: DEFAULT_SEARCH_LIMIT,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var               | Default                          |
    /// |-----------------------|----------------------------------|
    /// | `TRACKING_BASE_URL`   | `https://www.google.com/maps?q=` |
    /// | `ALERT_SENDER_NAME`   | `TRACEAM`                        |
    /// | `MAX_CLOCK_SKEW_SECS` | `300`                            |
    /// | `SEARCH_LIMIT`        | `50`                             |
    ///
    /// # Panics
    ///
    /// Panics if a number is malformed or fails [`EngineConfig::validate`].
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let max_clock_skew_secs: i64 = std::env::var("MAX_CLOCK_SKEW_SECS")
            .map(|v| v.parse().expect("MAX_CLOCK_SKEW_SECS must be a valid i64"))
            .unwrap_or(defaults.max_clock_skew_secs);

        let search_limit: i64 = std::env::var("SEARCH_LIMIT")
            .map(|v| v.parse().expect("SEARCH_LIMIT must be a valid i64"))
            .unwrap_or(defaults.search_limit);

        let config = Self {
            tracking_base_url: std::env::var("TRACKING_BASE_URL")
                .unwrap_or(defaults.tracking_base_url),
            alert_sender_name: std::env::var("ALERT_SENDER_NAME")
                .unwrap_or(defaults.alert_sender_name),
            max_clock_skew_secs,
            search_limit,
        };
        if let Err(msg) = config.validate() {
            panic!("{msg}");
        }
        config
    }

    /// Check numeric settings are within their supported ranges.
    pub fn validate(&self) -> Result<(), String> {
        if !(0..=CLOCK_SKEW_CEILING_SECS).contains(&self.max_clock_skew_secs) {
            return Err(format!(
                "MAX_CLOCK_SKEW_SECS must be between 0 and {CLOCK_SKEW_CEILING_SECS}, got {}",
                self.max_clock_skew_secs
            ));
        }
        if self.search_limit < 1 {
            return Err(format!(
                "SEARCH_LIMIT must be at least 1, got {}",
                self.search_limit
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        assert!(EngineConfig::default().validate().is_ok());
    }

    #[test]
    fn clock_skew_outside_range_is_rejected() {
        for skew in [-1, CLOCK_SKEW_CEILING_SECS + 1, i64::MAX] {
            let config = EngineConfig {
                max_clock_skew_secs: skew,
                ..EngineConfig::default()
            };
            let err = config.validate().unwrap_err();
            assert!(err.contains("MAX_CLOCK_SKEW_SECS"), "{err}");
        }
    }

    #[test]
    fn ceiling_skew_is_accepted() {
        let config = EngineConfig {
            max_clock_skew_secs: CLOCK_SKEW_CEILING_SECS,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_search_limit_is_rejected() {
        let config = EngineConfig {
            search_limit: 0,
            ..EngineConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
