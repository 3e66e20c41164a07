//! Location samples and coordinate validation.
//!
//! A [`Coordinates`] value is what a client device reports; a
//! [`LocationSample`] is the validated, timestamped form stored on an
//! incident. Capture times are truncated to microseconds so that samples
//! compare identically in memory and after a round trip through Postgres.

use chrono::{Duration, SubsecRound};
use serde::{Deserialize, Serialize};

use crate::error::SosError;
use crate::types::Timestamp;

/// Smallest valid latitude in degrees.
pub const MIN_LATITUDE: f64 = -90.0;
/// Largest valid latitude in degrees.
pub const MAX_LATITUDE: f64 = 90.0;
/// Smallest valid longitude in degrees.
pub const MIN_LONGITUDE: f64 = -180.0;
/// Largest valid longitude in degrees.
pub const MAX_LONGITUDE: f64 = 180.0;

/// Default tolerance for client clocks running ahead of the server.
pub const DEFAULT_MAX_CLOCK_SKEW_SECS: i64 = 300;

/// Largest configurable clock-skew tolerance (one day).
pub const CLOCK_SKEW_CEILING_SECS: i64 = 86_400;

/// Default prefix for generated tracking links.
pub const DEFAULT_TRACKING_BASE_URL: &str = "https://www.google.com/maps?q=";

/// A coordinate pair reported by a client, optionally with accuracy and a
/// device-side capture time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
    /// Horizontal accuracy radius in metres.
    #[serde(default)]
    pub accuracy: Option<f64>,
    /// When the device captured the fix. Server time is used when absent.
    #[serde(default, rename = "capturedAt", alias = "captured_at")]
    pub captured_at: Option<Timestamp>,
}

impl Coordinates {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            accuracy: None,
            captured_at: None,
        }
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    pub fn captured_at(mut self, at: Timestamp) -> Self {
        self.captured_at = Some(at);
        self
    }
}

/// A validated location fix as persisted on an incident.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LocationSample {
    pub lat: f64,
    pub lng: f64,
    pub accuracy: Option<f64>,
    #[serde(rename = "capturedAt", alias = "captured_at")]
    pub captured_at: Timestamp,
}

/// Validate the numeric part of a coordinate pair.
///
/// Latitude and longitude must be finite and within their ranges; accuracy,
/// when present, must be finite and non-negative.
pub fn validate_coordinates(coords: &Coordinates) -> Result<(), SosError> {
    if !coords.lat.is_finite() || !(MIN_LATITUDE..=MAX_LATITUDE).contains(&coords.lat) {
        return Err(SosError::InvalidLocation(format!(
            "latitude must be a finite number between {MIN_LATITUDE} and {MAX_LATITUDE}"
        )));
    }
    if !coords.lng.is_finite() || !(MIN_LONGITUDE..=MAX_LONGITUDE).contains(&coords.lng) {
        return Err(SosError::InvalidLocation(format!(
            "longitude must be a finite number between {MIN_LONGITUDE} and {MAX_LONGITUDE}"
        )));
    }
    if let Some(accuracy) = coords.accuracy {
        if !accuracy.is_finite() || accuracy < 0.0 {
            return Err(SosError::InvalidLocation(
                "accuracy must be a finite, non-negative number of metres".into(),
            ));
        }
    }
    Ok(())
}

/// Build a stored sample from client coordinates.
///
/// `now` is the server clock. A client-supplied capture time more than
/// `max_skew_secs` ahead of it is rejected; a missing one is replaced by `now`.
pub fn to_sample(
    coords: &Coordinates,
    now: Timestamp,
    max_skew_secs: i64,
) -> Result<LocationSample, SosError> {
    validate_coordinates(coords)?;

    // An out-of-range tolerance leaves the future bound open.
    let latest = Duration::try_seconds(max_skew_secs).and_then(|d| now.checked_add_signed(d));
    let captured_at = match coords.captured_at {
        Some(at) if latest.is_some_and(|latest| at > latest) => {
            return Err(SosError::InvalidLocation(format!(
                "capturedAt is more than {max_skew_secs}s ahead of server time"
            )));
        }
        Some(at) => at,
        None => now,
    };

    Ok(LocationSample {
        lat: coords.lat,
        lng: coords.lng,
        accuracy: coords.accuracy,
        captured_at: captured_at.trunc_subsecs(6),
    })
}

/// Map link pointing at a coordinate pair.
pub fn tracking_link(base_url: &str, lat: f64, lng: f64) -> String {
    format!("{base_url}{lat},{lng}")
}
