//! Suffix arithmetic for rotated repositories and versioned ILM policies.

use chrono::{DateTime, Datelike, Utc};
use regex::Regex;

use crate::deepfreeze::types::Style;
use crate::error::{Error, Result};

/// The first suffix for a fresh setup.
pub fn initial_suffix(style: Style, now: DateTime<Utc>) -> String {
    match style {
        Style::Oneup => "000001".to_string(),
        Style::Date => format!("{:04}.{:02}", now.year(), now.month()),
    }
}

/// Compute the next suffix.
///
/// `year`/`month` are only meaningful for `style=date`; passing them with
/// `style=oneup` is a configuration error rather than a silent ignore.
pub fn next_suffix(
    style: Style,
    last_suffix: &str,
    year: Option<i32>,
    month: Option<u32>,
    now: DateTime<Utc>,
) -> Result<String> {
    match style {
        Style::Oneup => {
            if year.is_some() || month.is_some() {
                return Err(Error::Config(
                    "year/month inputs require style=date".to_string(),
                ));
            }
            let current: u32 = last_suffix.parse().map_err(|_| {
                Error::Fatal(format!("last_suffix '{}' is not a counter", last_suffix))
            })?;
            Ok(format!("{:06}", current + 1))
        }
        Style::Date => {
            let year = year.unwrap_or_else(|| now.year());
            let month = month.unwrap_or_else(|| now.month());
            if !(1..=12).contains(&month) {
                return Err(Error::Config(format!("invalid month: {}", month)));
            }
            Ok(format!("{:04}.{:02}", year, month))
        }
    }
}

/// Strip a trailing suffix (`-000001` or `-2025.01`) from a name, yielding
/// the base a versioned policy name is built from.
pub fn strip_suffix(name: &str) -> &str {
    // Compiled on every call; rotation runs this a handful of times.
    let pattern = Regex::new(r"-(\d{6}|\d{4}\.\d{2})$").ok();
    match pattern.and_then(|re| re.find(name)) {
        Some(found) => &name[..found.start()],
        None => name,
    }
}

/// The suffix of a name produced by [`strip_suffix`]'s convention, if any.
pub fn suffix_of(name: &str) -> Option<&str> {
    let base = strip_suffix(name);
    if base.len() == name.len() {
        None
    } else {
        Some(&name[base.len() + 1..])
    }
}
