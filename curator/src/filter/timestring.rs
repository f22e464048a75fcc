//! strftime-subset handling for name-based filters.
//!
//! Two directions over the same directive table:
//! - render a timestring to a regex (fixed-width digit classes) so names can
//!   be matched and timestamps extracted;
//! - parse an extracted match back into an epoch timestamp.
//!
//! Supported directives: `%Y %G %y %m %W %V %d %H %M %S %j`.
//!
//! A deliberate sharp edge, kept: the regex for `%Y.%m` also matches inside
//! longer stamps like `%Y.%m.%d`. The documented workaround is a second
//! chained filter with `exclude` set for the longer pattern; chain order
//! handles it, not this module.

use chrono::{Datelike, NaiveDate, NaiveDateTime, NaiveTime, Weekday};
use regex::Regex;

use crate::error::{Error, Result};

const DIRECTIVES: &[(char, &str, &str)] = &[
    ('Y', "year4", r"\d{4}"),
    ('G', "isoyear", r"\d{4}"),
    ('y', "year2", r"\d{2}"),
    ('m', "month", r"\d{2}"),
    ('W', "week", r"\d{2}"),
    ('V', "isoweek", r"\d{2}"),
    ('d', "day", r"\d{2}"),
    ('H', "hour", r"\d{2}"),
    ('M', "minute", r"\d{2}"),
    ('S', "second", r"\d{2}"),
    ('j', "ordinal", r"\d{3}"),
];

/// Render a timestring to an (unanchored) regex with named capture groups.
pub fn timestring_regex(timestring: &str) -> Result<Regex> {
    let mut pattern = String::new();
    let mut chars = timestring.chars().peekable();

    while let Some(c) = chars.next() {
        if c != '%' {
            pattern.push_str(&regex::escape(&c.to_string()));
            continue;
        }
        let Some(directive) = chars.next() else {
            return Err(Error::Config(
                "timestring ends with a bare '%'".to_string(),
            ));
        };
        if directive == '%' {
            pattern.push_str(&regex::escape("%"));
            continue;
        }
        match DIRECTIVES.iter().find(|(d, _, _)| *d == directive) {
            Some((_, name, class)) => {
                pattern.push_str(&format!("(?P<{}>{})", name, class));
            }
            None => {
                return Err(Error::Config(format!(
                    "unsupported timestring directive: %{}",
                    directive
                )))
            }
        }
    }

    Regex::new(&pattern).map_err(|e| Error::Config(format!("invalid timestring regex: {}", e)))
}

/// Extracted date components from a timestring match.
#[derive(Debug, Default, Clone, Copy)]
struct Components {
    year4: Option<i32>,
    isoyear: Option<i32>,
    year2: Option<i32>,
    month: Option<u32>,
    week: Option<u32>,
    isoweek: Option<u32>,
    day: Option<u32>,
    hour: Option<u32>,
    minute: Option<u32>,
    second: Option<u32>,
    ordinal: Option<u32>,
}

/// Extract an epoch timestamp (UTC seconds) from a name, using a timestring.
///
/// Returns `None` when the name does not contain the timestring or the
/// extracted components do not form a valid date.
pub fn parse_name_timestamp(name: &str, timestring: &str) -> Result<Option<i64>> {
    let regex = timestring_regex(timestring)?;
    let Some(caps) = regex.captures(name) else {
        return Ok(None);
    };

    let mut c = Components::default();
    let grab = |key: &str| -> Option<u32> {
        caps.name(key).and_then(|m| m.as_str().parse().ok())
    };
    c.year4 = caps.name("year4").and_then(|m| m.as_str().parse().ok());
    c.isoyear = caps.name("isoyear").and_then(|m| m.as_str().parse().ok());
    c.year2 = caps.name("year2").and_then(|m| m.as_str().parse().ok());
    c.month = grab("month");
    c.week = grab("week");
    c.isoweek = grab("isoweek");
    c.day = grab("day");
    c.hour = grab("hour");
    c.minute = grab("minute");
    c.second = grab("second");
    c.ordinal = grab("ordinal");

    Ok(components_to_epoch(&c))
}

fn components_to_epoch(c: &Components) -> Option<i64> {
    // Two-digit years follow the strptime convention: 69-99 are the 1900s.
    let year = c
        .year4
        .or(c.isoyear)
        .or(c.year2.map(|y| if y >= 69 { 1900 + y } else { 2000 + y }))?;

    let date = if let Some(ordinal) = c.ordinal {
        NaiveDate::from_yo_opt(year, ordinal)?
    } else if let Some(isoweek) = c.isoweek {
        NaiveDate::from_isoywd_opt(c.isoyear.unwrap_or(year), isoweek, Weekday::Mon)?
    } else if let Some(week) = c.week {
        monday_of_week(year, week)?
    } else {
        NaiveDate::from_ymd_opt(year, c.month.unwrap_or(1), c.day.unwrap_or(1))?
    };

    let time = NaiveTime::from_hms_opt(
        c.hour.unwrap_or(0),
        c.minute.unwrap_or(0),
        c.second.unwrap_or(0),
    )?;

    Some(NaiveDateTime::new(date, time).and_utc().timestamp())
}

/// `%W` semantics: week 1 starts at the first Monday of the year; week 0
/// collapses to January 1st.
fn monday_of_week(year: i32, week: u32) -> Option<NaiveDate> {
    let jan1 = NaiveDate::from_ymd_opt(year, 1, 1)?;
    if week == 0 {
        return Some(jan1);
    }
    let days_until_monday = (7 - jan1.weekday().num_days_from_monday()) % 7;
    let first_monday = jan1 + chrono::Duration::days(i64::from(days_until_monday));
    Some(first_monday + chrono::Duration::weeks(i64::from(week) - 1))
}

/// Expand the supported strftime directives against a UTC timestamp.
///
/// Used for snapshot and index names (`curator-%Y%m%d%H%M%S`). Unknown
/// directives are a configuration error so typos fail before any cluster
/// call.
pub fn render_timestring(template: &str, at: chrono::DateTime<chrono::Utc>) -> Result<String> {
    use chrono::Timelike;

    let mut out = String::new();
    let mut chars = template.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '%' {
            out.push(ch);
            continue;
        }
        let Some(directive) = chars.next() else {
            return Err(Error::Config("name template ends with a bare '%'".to_string()));
        };
        match directive {
            '%' => out.push('%'),
            'Y' => out.push_str(&format!("{:04}", at.year())),
            'G' => out.push_str(&format!("{:04}", at.iso_week().year())),
            'y' => out.push_str(&format!("{:02}", at.year() % 100)),
            'm' => out.push_str(&format!("{:02}", at.month())),
            'W' => out.push_str(&format!("{:02}", week_of_year(at.date_naive()))),
            'V' => out.push_str(&format!("{:02}", at.iso_week().week())),
            'd' => out.push_str(&format!("{:02}", at.day())),
            'H' => out.push_str(&format!("{:02}", at.hour())),
            'M' => out.push_str(&format!("{:02}", at.minute())),
            'S' => out.push_str(&format!("{:02}", at.second())),
            'j' => out.push_str(&format!("{:03}", at.ordinal())),
            other => {
                return Err(Error::Config(format!(
                    "unsupported name template directive: %{}",
                    other
                )))
            }
        }
    }
    Ok(out)
}

/// `%W`-style week number: full weeks since the first Monday of the year.
fn week_of_year(date: NaiveDate) -> u32 {
    let Some(jan1) = NaiveDate::from_ymd_opt(date.year(), 1, 1) else {
        return 0;
    };
    let days_until_monday = (7 - jan1.weekday().num_days_from_monday()) % 7;
    let first_monday = jan1 + chrono::Duration::days(i64::from(days_until_monday));
    if date < first_monday {
        0
    } else {
        ((date - first_monday).num_days() / 7 + 1) as u32
    }
}
