//! Shared utility functions

use chrono::{DateTime, NaiveDate, Utc};

use crate::models::DATE_FORMAT;

/// Parse a datetime string (RFC3339 format) or return current time
///
/// This helper is used throughout the database layer to handle datetime parsing
/// with a fallback to the current time if parsing fails.
pub fn parse_datetime_or_now(s: &str) -> DateTime<Utc> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

/// Parse a stored calendar date, falling back to the Unix epoch
pub fn parse_date_or_epoch(s: &str) -> NaiveDate {
    NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap_or_default()
}

/// Upper-case the first character, leaving the rest untouched
///
/// ```
/// use userhub_db::utils::upper_first;
///
/// assert_eq!(upper_first("jane"), "Jane");
/// assert_eq!(upper_first("mcDonald"), "McDonald");
/// assert_eq!(upper_first(""), "");
/// ```
pub fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
