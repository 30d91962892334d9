//! # Temporal Types — UTC-Only Timestamps
//!
//! `Timestamp` is a UTC instant truncated to seconds. It is used for the
//! emission date of a manifest (which also yields the `YYMM` period embedded
//! in the access key) and for the transition audit log.
//!
//! Non-UTC inputs are rejected by [`Timestamp::parse`]; there is no silent
//! conversion.

use chrono::{DateTime, Datelike, NaiveDate, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;

/// A UTC timestamp, truncated to seconds precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Current UTC time, truncated.
    pub fn now() -> Self {
        Self(truncate_to_seconds(Utc::now()))
    }

    /// From a `DateTime<Utc>`, truncating sub-seconds.
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(truncate_to_seconds(dt))
    }

    /// Parse an RFC 3339 string with a `Z` suffix.
    ///
    /// # Errors
    ///
    /// Rejects strings that are not RFC 3339 or that carry an explicit
    /// offset (including `+00:00`).
    pub fn parse(s: &str) -> Result<Self, ValidationError> {
        if !s.ends_with('Z') {
            return Err(ValidationError::field(
                "timestamp",
                format!("must use Z suffix (UTC only), got {s:?}"),
            ));
        }
        let dt = DateTime::parse_from_rfc3339(s).map_err(|e| {
            ValidationError::field("timestamp", format!("invalid RFC 3339 timestamp {s:?}: {e}"))
        })?;
        Ok(Self(truncate_to_seconds(dt.with_timezone(&Utc))))
    }

    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Calendar date (UTC).
    pub fn date(&self) -> NaiveDate {
        self.0.date_naive()
    }

    /// `YYYY-MM-DDTHH:MM:SSZ`.
    pub fn to_iso8601(&self) -> String {
        self.0.format("%Y-%m-%dT%H:%M:%SZ").to_string()
    }

    /// Two-digit year and month, as embedded in an access key (`2401`).
    pub fn year_month(&self) -> String {
        format!("{:02}{:02}", self.0.year() % 100, self.0.month())
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_iso8601())
    }
}

fn truncate_to_seconds(dt: DateTime<Utc>) -> DateTime<Utc> {
    dt.with_nanosecond(0).unwrap_or(dt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_z_suffix() {
        let ts = Timestamp::parse("2024-01-15T10:30:00Z").unwrap();
        assert_eq!(ts.to_iso8601(), "2024-01-15T10:30:00Z");
        assert_eq!(ts.year_month(), "2401");
    }

    #[test]
    fn parse_rejects_offsets() {
        assert!(Timestamp::parse("2024-01-15T10:30:00+00:00").is_err());
        assert!(Timestamp::parse("2024-01-15T10:30:00-03:00").is_err());
        assert!(Timestamp::parse("not a date").is_err());
    }

    #[test]
    fn sub_seconds_are_truncated() {
        let ts = Timestamp::parse("2024-12-31T23:59:59.987Z").unwrap();
        assert_eq!(ts.to_iso8601(), "2024-12-31T23:59:59Z");
        assert_eq!(ts.year_month(), "2412");
    }

    #[test]
    fn now_has_no_sub_seconds() {
        assert_eq!(Timestamp::now().as_datetime().nanosecond(), 0);
    }
}
