//! Date and time helpers shared by provider adapters.
//!
//! Upstream APIs are inconsistent about date formats: some send RFC 3339
//! timestamps, others send naive local date-times that must be interpreted
//! in the provider's home timezone. [`parse_provider_datetime`] accepts both.
//! The formatting helpers produce the exact strings sent upstream and hashed
//! into cache keys.

use chrono::{DateTime, FixedOffset, NaiveDateTime, TimeZone};

/// Naive date-time layouts accepted from providers, tried in order.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// UTC offset of Brasília time (UTC-3), the default for Brazilian providers.
pub fn brasilia_offset() -> FixedOffset {
    FixedOffset::west_opt(3 * 3600).expect("valid offset")
}

/// Parses a date-time as sent by a provider.
///
/// RFC 3339 input keeps its own offset. Naive input is interpreted in
/// `default_offset`. Returns `None` if no known layout matches.
pub fn parse_provider_datetime(
    raw: &str,
    default_offset: FixedOffset,
) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt);
    }

    NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .and_then(|naive| default_offset.from_local_datetime(&naive).single())
}

/// Formats the date part as `YYYY-MM-DD`, in the datetime's own offset.
pub fn format_api_date<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    dt.format("%Y-%m-%d").to_string()
}

/// Formats as `YYYY-MM-DD HH:MM:SS`, in the datetime's own offset.
///
/// Sub-second precision is dropped so equal instants always render the same.
pub fn format_api_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    dt.format("%Y-%m-%d %H:%M:%S").to_string()
}
