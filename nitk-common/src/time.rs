//! Timestamp utilities
//!
//! Stored timestamps are fixed-width RFC 3339 strings in UTC with
//! microsecond precision, so lexicographic order equals chronological order
//! inside SQLite.

use chrono::{DateTime, SecondsFormat, Utc};

/// Format a timestamp for storage
pub fn to_db_string(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parse a stored timestamp
pub fn from_db_string(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}
