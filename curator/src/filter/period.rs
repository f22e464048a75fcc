//! Calendar-range computation for the period filter.
//!
//! Relative mode anchors at the current unit truncated to its start (top of
//! the hour, midnight, start of week per `week_starts_on`, first of the
//! month, January 1st) and shifts by whole units; months and years respect
//! calendar boundaries. Absolute mode parses explicit from/to dates with
//! strftime-subset formats and extends the `to` bound to the end of its
//! smallest unit.

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::filter::timestring::parse_name_timestamp;

/// Period evaluation mode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodType {
    #[default]
    Relative,
    Absolute,
}

/// Units the period filter understands (no seconds/minutes; those have no
/// calendar meaning).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeriodUnit {
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

/// First day of the week for weekly truncation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeekStartsOn {
    #[default]
    Sunday,
    Monday,
}

/// Inclusive `[from, to]` range in epoch seconds.
pub fn relative_range(
    unit: PeriodUnit,
    range_from: i64,
    range_to: i64,
    now_epoch: i64,
    week_starts_on: WeekStartsOn,
) -> Result<(i64, i64)> {
    if range_from > range_to {
        return Err(Error::Config(format!(
            "range_from ({}) must not exceed range_to ({})",
            range_from, range_to
        )));
    }

    let now = Utc
        .timestamp_opt(now_epoch, 0)
        .single()
        .ok_or_else(|| Error::Config(format!("invalid epoch: {}", now_epoch)))?;

    match unit {
        PeriodUnit::Hours => {
            let start = truncate_to_hour(now)?.timestamp();
            Ok((
                start + range_from * 3600,
                start + range_to * 3600 + 3600 - 1,
            ))
        }
        PeriodUnit::Days => {
            let start = truncate_to_day(now)?.timestamp();
            Ok((
                start + range_from * 86400,
                start + range_to * 86400 + 86400 - 1,
            ))
        }
        PeriodUnit::Weeks => {
            let start = truncate_to_week(now, week_starts_on)?.timestamp();
            Ok((
                start + range_from * 604800,
                start + range_to * 604800 + 604800 - 1,
            ))
        }
        PeriodUnit::Months => {
            let anchor = first_of_month(now)?;
            let from = shift_months(anchor, range_from)?;
            let to_exclusive = shift_months(anchor, range_to + 1)?;
            Ok((from.timestamp(), to_exclusive.timestamp() - 1))
        }
        PeriodUnit::Years => {
            let anchor = first_of_year(now)?;
            let from = shift_years(anchor, range_from)?;
            let to_exclusive = shift_years(anchor, range_to + 1)?;
            Ok((from.timestamp(), to_exclusive.timestamp() - 1))
        }
    }
}

/// Inclusive `[from, to]` range from absolute dates.
///
/// `date_to` is extended to the end of the smallest unit its format names,
/// so `2017.04` with `%Y.%m` covers the whole of April.
pub fn absolute_range(
    date_from: &str,
    date_from_format: &str,
    date_to: &str,
    date_to_format: &str,
) -> Result<(i64, i64)> {
    let from = parse_name_timestamp(date_from, date_from_format)?.ok_or_else(|| {
        Error::Config(format!(
            "date_from '{}' does not match format '{}'",
            date_from, date_from_format
        ))
    })?;
    let to_start = parse_name_timestamp(date_to, date_to_format)?.ok_or_else(|| {
        Error::Config(format!(
            "date_to '{}' does not match format '{}'",
            date_to, date_to_format
        ))
    })?;

    let to = end_of_format_unit(to_start, date_to_format)?;
    if from > to {
        return Err(Error::Config(format!(
            "date_from ({}) is after date_to ({})",
            date_from, date_to
        )));
    }
    Ok((from, to))
}

/// Whether a timestamp (or, with `intersect`, a min/max pair) falls inside
/// the range.
pub fn in_range(range: (i64, i64), timestamp: i64) -> bool {
    timestamp >= range.0 && timestamp <= range.1
}

fn end_of_format_unit(start: i64, format: &str) -> Result<i64> {
    if format.contains("%S") {
        return Ok(start);
    }
    if format.contains("%M") {
        return Ok(start + 60 - 1);
    }
    if format.contains("%H") {
        return Ok(start + 3600 - 1);
    }
    if format.contains("%d") || format.contains("%j") {
        return Ok(start + 86400 - 1);
    }
    if format.contains("%W") || format.contains("%V") {
        return Ok(start + 604800 - 1);
    }
    let dt = Utc
        .timestamp_opt(start, 0)
        .single()
        .ok_or_else(|| Error::Config(format!("invalid timestamp: {}", start)))?;
    if format.contains("%m") {
        let next = shift_months(dt, 1)?;
        return Ok(next.timestamp() - 1);
    }
    // Year-only formats.
    let next = shift_years(dt, 1)?;
    Ok(next.timestamp() - 1)
}

fn truncate_to_hour(dt: DateTime<Utc>) -> Result<DateTime<Utc>> {
    dt.with_minute(0)
        .and_then(|d| d.with_second(0))
        .and_then(|d| d.with_nanosecond(0))
        .ok_or_else(|| Error::Fatal("hour truncation failed".to_string()))
}

fn truncate_to_day(dt: DateTime<Utc>) -> Result<DateTime<Utc>> {
    truncate_to_hour(dt)?
        .with_hour(0)
        .ok_or_else(|| Error::Fatal("day truncation failed".to_string()))
}

fn truncate_to_week(dt: DateTime<Utc>, week_starts_on: WeekStartsOn) -> Result<DateTime<Utc>> {
    let day = truncate_to_day(dt)?;
    let days_from_start = match week_starts_on {
        WeekStartsOn::Monday => i64::from(day.weekday().num_days_from_monday()),
        WeekStartsOn::Sunday => i64::from(day.weekday().num_days_from_sunday()),
    };
    Ok(day - Duration::days(days_from_start))
}

fn first_of_month(dt: DateTime<Utc>) -> Result<DateTime<Utc>> {
    truncate_to_day(dt)?
        .with_day(1)
        .ok_or_else(|| Error::Fatal("month truncation failed".to_string()))
}

fn first_of_year(dt: DateTime<Utc>) -> Result<DateTime<Utc>> {
    first_of_month(dt)?
        .with_month(1)
        .ok_or_else(|| Error::Fatal("year truncation failed".to_string()))
}

fn shift_months(dt: DateTime<Utc>, months: i64) -> Result<DateTime<Utc>> {
    let magnitude = months.unsigned_abs() as u32;
    let shifted = if months >= 0 {
        dt.checked_add_months(Months::new(magnitude))
    } else {
        dt.checked_sub_months(Months::new(magnitude))
    };
    shifted.ok_or_else(|| Error::Config(format!("month shift out of range: {}", months)))
}

fn shift_years(dt: DateTime<Utc>, years: i64) -> Result<DateTime<Utc>> {
    let target_year = dt.year() as i64 + years;
    let target_year = i32::try_from(target_year)
        .map_err(|_| Error::Config(format!("year shift out of range: {}", years)))?;
    let date = NaiveDate::from_ymd_opt(target_year, dt.month(), dt.day())
        .ok_or_else(|| Error::Config(format!("year shift out of range: {}", years)))?;
    Utc.from_local_datetime(&date.and_hms_opt(0, 0, 0).ok_or_else(|| {
        Error::Fatal("midnight construction failed".to_string())
    })?)
    .single()
    .ok_or_else(|| Error::Fatal("year shift produced an ambiguous time".to_string()))
}
