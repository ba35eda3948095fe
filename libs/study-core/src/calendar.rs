//! Calendar arithmetic on whole days.
//!
//! Every algorithm in this crate reasons in days of a single reference
//! timezone. Instants are truncated to a `NaiveDate` once, at the edge, with
//! [`start_of_day`]; everything downstream works on dates only.

use chrono::{DateTime, Datelike, Duration, Local, NaiveDate, TimeZone, Timelike, Weekday};

use crate::error::{EngineError, Result};

/// Truncate an instant to the calendar day it falls on in its own timezone.
pub fn start_of_day<Tz: TimeZone>(instant: &DateTime<Tz>) -> NaiveDate {
    instant.date_naive()
}

/// Calendar-day arithmetic. Negative `days` walk backwards.
///
/// Results outside chrono's date range are a validation error.
pub fn add_days(day: NaiveDate, days: i64) -> Result<NaiveDate> {
    Duration::try_days(days)
        .and_then(|delta| day.checked_add_signed(delta))
        .ok_or_else(|| {
            EngineError::validation(format!("{} {:+} days is out of range", day, days))
        })
}

/// Signed number of whole days from `b` to `a` (`a - b`).
pub fn diff_in_days(a: NaiveDate, b: NaiveDate) -> i64 {
    a.signed_duration_since(b).num_days()
}

/// Walk back from `day` until its weekday equals `first_day`.
pub fn start_of_week(day: NaiveDate, first_day: Weekday) -> Result<NaiveDate> {
    let back = offset_from_first_day(first_day, day.weekday());
    add_days(day, -back)
}

/// Exclusive end of the week starting at `start`.
pub fn end_of_week(start: NaiveDate) -> Result<NaiveDate> {
    add_days(start, 7)
}

/// Position of `weekday` inside a week that begins on `first_day` (0..=6).
pub fn offset_from_first_day(first_day: Weekday, weekday: Weekday) -> i64 {
    let first = weekday_index(first_day) as i64;
    let slot = weekday_index(weekday) as i64;
    (slot - first + 7) % 7
}

/// Storage index of a weekday, Sunday = 0 through Saturday = 6.
pub fn weekday_index(weekday: Weekday) -> u8 {
    weekday.num_days_from_sunday() as u8
}

/// Inverse of [`weekday_index`].
pub fn weekday_from_index(index: u8) -> Option<Weekday> {
    match index {
        0 => Some(Weekday::Sun),
        1 => Some(Weekday::Mon),
        2 => Some(Weekday::Tue),
        3 => Some(Weekday::Wed),
        4 => Some(Weekday::Thu),
        5 => Some(Weekday::Fri),
        6 => Some(Weekday::Sat),
        _ => None,
    }
}

/// Get the study day for `now`, honouring a daily reset hour.
///
/// Before `reset_hour` the previous calendar day is still "today", so a late
/// night session counts towards the day it started in.
pub fn study_day<Tz: TimeZone>(now: &DateTime<Tz>, reset_hour: u32) -> Result<NaiveDate> {
    let today = start_of_day(now);
    if now.hour() < reset_hour {
        add_days(today, -1)
    } else {
        Ok(today)
    }
}

/// First day of a bounded look-back window ending at `today`.
pub fn lookback_start(today: NaiveDate, days: u32) -> Result<NaiveDate> {
    add_days(today, -i64::from(days))
}

/// Parse a date given as `YYYY-MM-DD` or as an RFC 3339 timestamp.
///
/// Timestamps are converted into the local reference timezone before being
/// truncated to a day.
pub fn parse_iso_date(value: &str) -> Result<NaiveDate> {
    parse_iso_date_in(value, &Local)
}

/// Like [`parse_iso_date`] with an explicit reference timezone.
pub fn parse_iso_date_in<Tz: TimeZone>(value: &str, tz: &Tz) -> Result<NaiveDate> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::validation("empty date"));
    }

    if let Ok(day) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(day);
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|instant| start_of_day(&instant.with_timezone(tz)))
        .map_err(|_| EngineError::validation(format!("invalid date '{}'", trimmed)))
}

/// Format a day as `YYYY-MM-DD`.
pub fn format_day(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}
