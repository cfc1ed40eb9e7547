//! Date and time helpers shared by the fetcher and the index helpers

use chrono::{DateTime, NaiveDateTime, Utc};

/// Seconds in one day
const SECONDS_PER_DAY: f64 = 86_400.0;

/// Date conversion errors
#[derive(Debug, thiserror::Error)]
pub enum DateError {
    /// Unix timestamp outside the representable range
    #[error("invalid unix timestamp: {0}")]
    InvalidTimestamp(i64),

    /// Unparseable date string
    #[error("invalid date '{input}': {reason}")]
    InvalidDate {
        /// Rejected input
        input: String,
        /// Parser message
        reason: String,
    },
}

/// Convert a unix timestamp (seconds) into a UTC datetime
pub fn unixtime_to_datetime(ut: i64) -> Result<DateTime<Utc>, DateError> {
    DateTime::<Utc>::from_timestamp(ut, 0).ok_or(DateError::InvalidTimestamp(ut))
}

/// Parse an RFC 3339 date, or a naive `YYYY-MM-DDTHH:MM:SS` date taken as UTC
pub fn parse_datetime(input: &str) -> Result<DateTime<Utc>, DateError> {
    let input = input.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(input, "%Y-%m-%dT%H:%M:%S")
        .or_else(|_| NaiveDateTime::parse_from_str(input, "%Y-%m-%d %H:%M:%S"))
        .map(|naive| naive.and_utc())
        .map_err(|e| DateError::InvalidDate {
            input: input.to_string(),
            reason: e.to_string(),
        })
}

/// Number of days between two instants, rounded to two decimals
///
/// Returns `None` when either side is missing. Negative when `end` precedes
/// `start`.
pub fn time_diff_days(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Option<f64> {
    let (start, end) = (start?, end?);
    let seconds = (end - start).num_milliseconds() as f64 / 1000.0;
    Some((seconds / SECONDS_PER_DAY * 100.0).round() / 100.0)
}

/// String flavour of [`time_diff_days`]
pub fn time_diff_days_str(start: Option<&str>, end: Option<&str>) -> Result<Option<f64>, DateError> {
    let (Some(start), Some(end)) = (start, end) else {
        return Ok(None);
    };
    Ok(time_diff_days(
        Some(parse_datetime(start)?),
        Some(parse_datetime(end)?),
    ))
}
