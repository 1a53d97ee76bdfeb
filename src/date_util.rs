use chrono::{DateTime, SecondsFormat, Utc};

/// Start of the incremental cursor when no sync has ever completed.
pub const EPOCH_CURSOR: &str = "1970-01-01T00:00:00Z";

/// Parse an RFC 3339 timestamp as returned by the Hevy API.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

/// Format a timestamp the way the API expects it in `since` filters.
pub fn to_iso(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn now_iso() -> String {
    to_iso(Utc::now())
}

/// Whole minutes between two timestamps, rounded to the nearest minute.
/// Returns `None` when either side is missing or unparseable.
pub fn minutes_between(start: Option<&str>, end: Option<&str>) -> Option<i64> {
    let start = parse_timestamp(start?)?;
    let end = parse_timestamp(end?)?;
    let seconds = (end - start).num_seconds() as f64;
    Some((seconds / 60.0).round() as i64)
}

/// Round to one decimal place.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Round to the nearest 0.5 (plate-loadable increments).
pub fn round_half(value: f64) -> f64 {
    (value * 2.0).round() / 2.0
}
