//! Row <-> domain value conversions shared by the repositories.

use bookwise_domain::{BookwiseError, Result};
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

pub(crate) fn ts_to_datetime(ts: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp(ts, 0)
        .ok_or_else(|| BookwiseError::Database(format!("timestamp {ts} out of range")))
}

pub(crate) fn opt_ts_to_datetime(ts: Option<i64>) -> Result<Option<DateTime<Utc>>> {
    ts.map(ts_to_datetime).transpose()
}

pub(crate) fn parse_time(value: &str) -> Result<NaiveTime> {
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|e| BookwiseError::Database(format!("invalid time '{value}': {e}")))
}

pub(crate) fn fmt_time(value: NaiveTime) -> String {
    value.format("%H:%M").to_string()
}

pub(crate) fn parse_date(value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|e| BookwiseError::Database(format!("invalid date '{value}': {e}")))
}

pub(crate) fn fmt_date(value: NaiveDate) -> String {
    value.format("%Y-%m-%d").to_string()
}

/// Parse a stored status string through the enum's `FromStr`.
pub(crate) fn parse_enum<T>(value: &str) -> Result<T>
where
    T: std::str::FromStr<Err = String>,
{
    value.parse::<T>().map_err(BookwiseError::Database)
}

/// Render a status set as a SQL `IN` list. Safe to interpolate because the
/// values come from enum `Display` impls, never from user input.
pub(crate) fn status_list<T: std::fmt::Display>(statuses: &[T]) -> String {
    statuses
        .iter()
        .map(|s| format!("'{s}'"))
        .collect::<Vec<_>>()
        .join(", ")
}
