//! Injectable time source
//!
//! Every operation that stamps a record or compares against "now" takes a
//! `&dyn Clock` so tests can pin time.

use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Clock abstraction for injectable time source.
pub trait Clock: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// System clock implementation (production use).
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock clock for testing with controlled timestamps.
#[derive(Debug, Clone)]
pub struct MockClock {
    pub current_time: DateTime<Utc>,
}

impl MockClock {
    /// Create a new mock clock at the specified time.
    pub fn new(time: DateTime<Utc>) -> Self {
        Self { current_time: time }
    }

    /// Create a mock clock at a fixed test time (2026-01-15 12:00:00 UTC).
    pub fn fixed() -> Self {
        Self {
            current_time: Utc
                .with_ymd_and_hms(2026, 1, 15, 12, 0, 0)
                .single()
                .unwrap_or_default(),
        }
    }

    /// Advance the clock by the specified duration.
    pub fn advance(&mut self, duration: Duration) {
        self.current_time += duration;
    }
}

impl Clock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        self.current_time
    }
}

/// Compact UTC stamp used in generated file names (`20260115T120000Z`).
pub fn file_stamp(at: DateTime<Utc>) -> String {
    at.format("%Y%m%dT%H%M%SZ").to_string()
}

/// Parse a timestamp as written in front-matter or metadata: RFC 3339, a
/// naive `YYYY-MM-DDTHH:MM:SS`, or a bare date (midnight UTC).
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim().trim_matches('"').trim_matches('\'');
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}
