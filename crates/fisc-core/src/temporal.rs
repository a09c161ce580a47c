//! # Temporal Types
//!
//! [`Timestamp`] is the UTC instant used for state transitions, attempts and
//! audit records. Document dates are different: authorities expect the
//! local wall-clock date and time printed on the sale, so documents carry a
//! `chrono::NaiveDateTime` and are rendered through the formatting helpers
//! below.

use chrono::{DateTime, Duration, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A UTC timestamp.
///
/// Serializes to RFC 3339 (e.g. `2026-01-15T12:00:00Z`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current UTC time.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create a timestamp from a `chrono::DateTime<Utc>`.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Access the underlying `chrono::DateTime<Utc>`.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// This timestamp shifted forward by `seconds`.
    pub fn plus_secs(&self, seconds: i64) -> Self {
        Self(self.0 + Duration::seconds(seconds))
    }

    /// ISO 8601 with `Z` suffix, truncated to seconds.
    pub fn to_canonical_string(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}

// ---------------------------------------------------------------------------
// Authority date formats
// ---------------------------------------------------------------------------

/// `YYYYMMDD` (eTIMS `salesDt`, `rfdDt`).
pub fn compact_date(dt: &NaiveDateTime) -> String {
    dt.format("%Y%m%d").to_string()
}

/// `YYYYMMDDHHmmss` (eTIMS `cfmDt`).
pub fn compact_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y%m%d%H%M%S").to_string()
}

/// `YYYY-MM-DD` (E-VAT `INVOICE_DATE`).
pub fn iso_date(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d").to_string()
}

/// `YYYY-MM-DD HH:MM:SS` (E-VAT `INVOICE_TIME`).
pub fn iso_datetime(dt: &NaiveDateTime) -> String {
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}

/// `ddmmyyyy` and `hhmmss` parts of a receipt QR payload.
pub fn qr_date_time(dt: &NaiveDateTime) -> (String, String) {
    (
        dt.format("%d%m%Y").to_string(),
        dt.format("%H%M%S").to_string(),
    )
}
