//! Timestamp value object for immutable points in time.

use chrono::{DateTime, Duration, Months, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Immutable point in time, always UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a timestamp from a DateTime<Utc>.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the inner DateTime.
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Checks if this timestamp is before another.
    pub fn is_before(&self, other: &Timestamp) -> bool {
        self.0 < other.0
    }

    /// Checks if this timestamp is after another.
    pub fn is_after(&self, other: &Timestamp) -> bool {
        self.0 > other.0
    }

    /// Creates a new timestamp by adding the specified number of days.
    ///
    /// Negative values subtract days. Saturates at either end of the
    /// representable range.
    pub fn add_days(&self, days: i64) -> Self {
        match Duration::try_days(days).and_then(|d| self.0.checked_add_signed(d)) {
            Some(dt) => Self(dt),
            None if days < 0 => Self(DateTime::<Utc>::MIN_UTC),
            None => Self(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Creates a new timestamp by adding calendar months.
    ///
    /// Day-of-month is clamped to the last day of the target month
    /// (Jan 31 + 1 month = Feb 28/29). Saturates at the far future.
    pub fn add_months(&self, months: u32) -> Self {
        match self.0.checked_add_months(Months::new(months)) {
            Some(dt) => Self(dt),
            None => Self(DateTime::<Utc>::MAX_UTC),
        }
    }

    /// Creates a timestamp from Unix seconds.
    ///
    /// Returns `None` for values chrono cannot represent.
    pub fn from_unix_secs(secs: i64) -> Option<Self> {
        Utc.timestamp_opt(secs, 0).single().map(Self)
    }

    /// Creates a timestamp from Unix milliseconds.
    pub fn from_unix_millis(millis: i64) -> Option<Self> {
        Utc.timestamp_millis_opt(millis).single().map(Self)
    }

    /// Returns the timestamp as Unix seconds.
    pub fn as_unix_secs(&self) -> i64 {
        self.0.timestamp()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn timestamp_now_creates_current_time() {
        let before = Utc::now();
        let ts = Timestamp::now();
        let after = Utc::now();

        assert!(ts.as_datetime() >= &before);
        assert!(ts.as_datetime() <= &after);
    }

    #[test]
    fn timestamp_from_unix_secs_works() {
        // 2024-01-15T00:00:00Z
        let ts = Timestamp::from_unix_secs(1705276800).unwrap();
        assert_eq!(ts.as_datetime().year(), 2024);
        assert_eq!(ts.as_datetime().month(), 1);
        assert_eq!(ts.as_datetime().day(), 15);
        assert_eq!(ts.as_unix_secs(), 1705276800);
    }

    #[test]
    fn timestamp_from_unix_millis_keeps_seconds() {
        let ts = Timestamp::from_unix_millis(1705276800_500).unwrap();
        assert_eq!(ts.as_unix_secs(), 1705276800);
    }

    #[test]
    fn add_months_uses_calendar_months() {
        // 2024-01-15T10:30:00Z
        let ts = Timestamp::from_unix_secs(1705314600).unwrap();
        let later = ts.add_months(1);

        assert_eq!(later.as_datetime().month(), 2);
        assert_eq!(later.as_datetime().day(), 15);
        assert_eq!(later.as_datetime().hour(), 10);
    }

    #[test]
    fn add_months_clamps_to_end_of_month() {
        // 2024-01-31T00:00:00Z
        let ts = Timestamp::from_unix_secs(1706659200).unwrap();
        let later = ts.add_months(1);

        assert_eq!(later.as_datetime().month(), 2);
        assert_eq!(later.as_datetime().day(), 29);
    }

    #[test]
    fn add_days_accepts_negative_values() {
        let ts = Timestamp::from_unix_secs(86_400 * 10).unwrap();
        assert_eq!(ts.add_days(-1).as_unix_secs(), 86_400 * 9);
    }

    #[test]
    fn add_days_saturates_instead_of_overflowing() {
        let ts = Timestamp::from_unix_secs(1705314600).unwrap();

        assert_eq!(*ts.add_days(i64::MAX).as_datetime(), DateTime::<Utc>::MAX_UTC);
        assert_eq!(*ts.add_days(u32::MAX as i64).as_datetime(), DateTime::<Utc>::MAX_UTC);
        assert_eq!(*ts.add_days(i64::MIN).as_datetime(), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn timestamp_serializes_to_rfc3339() {
        let ts = Timestamp::from_unix_secs(1705314600).unwrap();
        let json = serde_json::to_string(&ts).unwrap();
        assert!(json.contains("2024-01-15T10:30:00"));
    }
}
