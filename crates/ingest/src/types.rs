//! Shared value types for the ingestion domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values with invariants (coordinates are finite, timestamps are in
//! range, stat percentages are derived rather than reported) and participate in
//! domain computations.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Location
// ---------------------------------------------------------------------------

/// A latitude/longitude pair in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl Coordinates {
    /// Creates a coordinate pair, returning `None` if either value is NaN or
    /// infinite.
    #[must_use]
    pub fn new(lat: f64, lng: f64) -> Option<Self> {
        if lat.is_finite() && lng.is_finite() {
            Some(Self { lat, lng })
        } else {
            None
        }
    }
}

impl fmt::Display for Coordinates {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.lat, self.lng)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a [`Timestamp`] from seconds since the Unix epoch.
    ///
    /// Fractional seconds are kept to nanosecond precision. Returns `None` if
    /// the value is not finite or falls outside the range `chrono` supports.
    #[must_use]
    pub fn from_epoch_seconds(seconds: f64) -> Option<Self> {
        if !seconds.is_finite() {
            return None;
        }
        let whole = seconds.floor();
        if whole < i64::MIN as f64 || whole > i64::MAX as f64 {
            return None;
        }
        let nanos = ((seconds - whole) * 1e9).round().min(999_999_999.0) as u32;
        DateTime::from_timestamp(whole as i64, nanos).map(Self)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// Derived stats
// ---------------------------------------------------------------------------

/// Highest possible sum of the three individual stat values (3 x 15).
pub const MAX_STAT_TOTAL: f64 = 45.0;

/// Overall individual-stat percentage of a spawn.
///
/// Only ever derived from three known stat values; there is no constructor
/// from a raw float.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct IvPercentage(f64);

impl IvPercentage {
    /// Computes `(attack + defense + stamina) * 100 / 45` in real arithmetic.
    pub fn from_stats(attack: u32, defense: u32, stamina: u32) -> Self {
        let total = f64::from(attack) + f64::from(defense) + f64::from(stamina);
        Self(total * 100.0 / MAX_STAT_TOTAL)
    }

    /// Returns the percentage as an `f64`.
    pub fn as_f64(self) -> f64 {
        self.0
    }
}

impl fmt::Display for IvPercentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Sentinels
// ---------------------------------------------------------------------------

/// Marker rendered for unknown moves, stats, and IV.
pub const UNKNOWN_MARKER: &str = "unkn";

/// Marker rendered for unknown height, weight, and gender.
pub const UNMEASURED_MARKER: &str = "?";

/// Display adapter rendering `Some(v)` as `v` and `None` as a sentinel marker.
///
/// Unknown values stay `None` in the data model; the marker only exists at
/// the presentation edge so it can never be confused with a numeric zero.
pub struct OrUnknown<'a, T>(pub &'a Option<T>, pub &'static str);

impl<T: fmt::Display> fmt::Display for OrUnknown<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(v) => v.fmt(f),
            None => f.write_str(self.1),
        }
    }
}
