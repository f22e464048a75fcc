//! Age derivation and the fixed unit table.
//!
//! The unit table is deliberately not calendar-aware (months are 30 days,
//! years 365); the `period` filter is the calendar-aware alternative.

use serde::{Deserialize, Serialize};

use curator_client::{IndexInfo, SnapshotInfo};

use crate::error::{Error, Result};
use crate::filter::timestring::parse_name_timestamp;

/// Where an entity's timestamp comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgeSource {
    Name,
    CreationDate,
    FieldStats,
}

/// Retention direction relative to the point of reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Older,
    Younger,
}

/// Time units for age arithmetic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimeUnit {
    Seconds,
    Minutes,
    Hours,
    Days,
    Weeks,
    Months,
    Years,
}

impl TimeUnit {
    /// Fixed seconds-per-unit table.
    pub fn seconds(&self) -> i64 {
        match self {
            TimeUnit::Seconds => 1,
            TimeUnit::Minutes => 60,
            TimeUnit::Hours => 3600,
            TimeUnit::Days => 86400,
            TimeUnit::Weeks => 604800,
            TimeUnit::Months => 2_592_000,
            TimeUnit::Years => 31_536_000,
        }
    }
}

/// Which side of a field-stats aggregation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsResult {
    #[default]
    MinValue,
    MaxValue,
}

/// Point of reference: `epoch − unit.seconds × unit_count`.
pub fn point_of_reference(unit: TimeUnit, unit_count: i64, epoch: i64) -> i64 {
    epoch - unit.seconds() * unit_count
}

/// Whether a timestamp is retained for a direction and point of reference:
/// `older` keeps timestamps at or before the POR, `younger` keeps
/// timestamps at or after it.
pub fn retain(direction: Direction, timestamp: i64, por: i64) -> bool {
    match direction {
        Direction::Older => timestamp <= por,
        Direction::Younger => timestamp >= por,
    }
}

/// Derive an index timestamp (epoch seconds) from the configured source.
///
/// `field_range` carries the prefetched field-stats aggregation for the
/// index when the source needs one. `None` means the timestamp cannot be
/// derived; callers drop such entities from the actionable list.
pub fn index_timestamp(
    index: &IndexInfo,
    source: AgeSource,
    timestring: Option<&str>,
    stats_result: StatsResult,
    field_range: Option<(i64, i64)>,
) -> Result<Option<i64>> {
    match source {
        AgeSource::Name => {
            let timestring = timestring.ok_or_else(|| {
                Error::Config("age source 'name' requires a timestring".to_string())
            })?;
            parse_name_timestamp(&index.name, timestring)
        }
        AgeSource::CreationDate => Ok(Some(index.creation_date_ms / 1000)),
        AgeSource::FieldStats => Ok(field_range.map(|(min, max)| match stats_result {
            StatsResult::MinValue => min,
            StatsResult::MaxValue => max,
        })),
    }
}

/// Derive a snapshot timestamp from the configured source.
///
/// Snapshots support `name` and `creation_date` (start time); `field_stats`
/// is an index-only source.
pub fn snapshot_timestamp(
    snapshot: &SnapshotInfo,
    source: AgeSource,
    timestring: Option<&str>,
) -> Result<Option<i64>> {
    match source {
        AgeSource::Name => {
            let timestring = timestring.ok_or_else(|| {
                Error::Config("age source 'name' requires a timestring".to_string())
            })?;
            parse_name_timestamp(&snapshot.name, timestring)
        }
        AgeSource::CreationDate => Ok(Some(snapshot.start_time_ms / 1000)),
        AgeSource::FieldStats => Err(Error::Config(
            "field_stats is not a valid age source for snapshots".to_string(),
        )),
    }
}

/// Resolve `unit_count_pattern` against a name: the first capture group
/// overrides the configured count. A miss with `unit_count = -1` yields
/// `None`, which drops the entity.
pub fn effective_unit_count(
    name: &str,
    unit_count: i64,
    pattern: Option<&regex::Regex>,
) -> Option<i64> {
    if let Some(pattern) = pattern {
        if let Some(captured) = pattern
            .captures(name)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<i64>().ok())
        {
            return Some(captured);
        }
    }
    if unit_count == -1 {
        None
    } else {
        Some(unit_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_seconds_table() {
        assert_eq!(TimeUnit::Seconds.seconds(), 1);
        assert_eq!(TimeUnit::Minutes.seconds(), 60);
        assert_eq!(TimeUnit::Hours.seconds(), 3600);
        assert_eq!(TimeUnit::Days.seconds(), 86400);
        assert_eq!(TimeUnit::Weeks.seconds(), 604800);
        assert_eq!(TimeUnit::Months.seconds(), 2_592_000);
        assert_eq!(TimeUnit::Years.seconds(), 31_536_000);
    }

    #[test]
    fn test_point_of_reference() {
        // 2017-04-07T15:00:00Z minus 3 days
        assert_eq!(
            point_of_reference(TimeUnit::Days, 3, 1491577200),
            1491318000
        );
    }

    #[test]
    fn test_retain_directions() {
        let por = 1000;
        assert!(retain(Direction::Older, 999, por));
        assert!(retain(Direction::Older, 1000, por));
        assert!(!retain(Direction::Older, 1001, por));
        assert!(retain(Direction::Younger, 1001, por));
        assert!(retain(Direction::Younger, 1000, por));
        assert!(!retain(Direction::Younger, 999, por));
    }

    #[test]
    fn test_effective_unit_count_override() {
        let pattern = regex::Regex::new(r"keep-(\d+)-").unwrap();
        assert_eq!(
            effective_unit_count("keep-30-logs", 7, Some(&pattern)),
            Some(30)
        );
        // No match: fall back to the configured count.
        assert_eq!(effective_unit_count("logs", 7, Some(&pattern)), Some(7));
        // No match with the -1 sentinel: skip the entity.
        assert_eq!(effective_unit_count("logs", -1, Some(&pattern)), None);
        // No pattern at all.
        assert_eq!(effective_unit_count("logs", 7, None), Some(7));
    }
}
