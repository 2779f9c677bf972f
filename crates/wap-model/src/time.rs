//! Epoch-millisecond timestamp helpers.
//!
//! Raw activity events carry their time as milliseconds since the Unix
//! epoch. All calendar derivations here are in UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

/// Rendering used for derived event-time columns.
pub const EVENT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.3f";

/// Convert epoch milliseconds to a UTC datetime.
pub fn datetime_of_epoch_millis(millis: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp_millis(millis).map(|dt| dt.naive_utc())
}

/// Calendar date (UTC) that an epoch-millisecond timestamp falls on.
pub fn date_of_epoch_millis(millis: i64) -> Option<NaiveDate> {
    datetime_of_epoch_millis(millis).map(|dt| dt.date())
}

/// Render epoch milliseconds as `YYYY-MM-DD HH:MM:SS.mmm`.
pub fn format_event_time(millis: i64) -> Option<String> {
    datetime_of_epoch_millis(millis).map(|dt| dt.format(EVENT_TIME_FORMAT).to_string())
}
