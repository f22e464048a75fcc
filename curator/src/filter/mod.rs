//! The filter engine.
//!
//! A filter chain starts from the complete index (or snapshot) inventory and
//! narrows it: filters run in declared order, joined by logical AND, and
//! every filter returns a subset of its input. Disjunction is expressed by a
//! single `regex` filter whose value encodes the alternatives.
//!
//! Every filter carries an `exclude` flag that inverts its retention
//! decision. The default is filter-specific: `allocated`, `kibana` and
//! `forcemerged` default to excluding their matches (acting on those indices
//! is almost never intended), everything else defaults to including them.

pub mod age;
pub mod count;
pub mod period;
pub mod space;
pub mod timestring;

use std::collections::HashMap;

use async_trait::async_trait;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use curator_client::{EsClient, IndexInfo, SnapshotInfo, SnapshotState};

use crate::error::{Error, Result};

pub use age::{AgeSource, Direction, StatsResult, TimeUnit};
pub use period::{PeriodType, PeriodUnit, WeekStartsOn};
pub use space::ThresholdBehavior;

/// Source of per-index date-field aggregations for `field_stats` filters.
#[async_trait]
pub trait FieldStats: Send + Sync {
    /// `(min, max)` of a date field, epoch seconds.
    async fn date_field_range(&self, index: &str, field: &str) -> Result<(i64, i64)>;
}

#[async_trait]
impl FieldStats for EsClient {
    async fn date_field_range(&self, index: &str, field: &str) -> Result<(i64, i64)> {
        Ok(EsClient::date_field_range(self, index, field).await?)
    }
}

/// A [`FieldStats`] that rejects every lookup. Used where `field_stats`
/// sources cannot occur (snapshot chains, validation-only paths).
pub struct NoFieldStats;

#[async_trait]
impl FieldStats for NoFieldStats {
    async fn date_field_range(&self, index: &str, _field: &str) -> Result<(i64, i64)> {
        Err(Error::Config(format!(
            "field_stats lookup not available for {}",
            index
        )))
    }
}

/// How a pattern filter matches names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternKind {
    Prefix,
    Suffix,
    Timestring,
    Regex,
}

/// One declared filter. The `filtertype` tag selects the variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "filtertype", rename_all = "snake_case")]
pub enum FilterSpec {
    Pattern {
        kind: PatternKind,
        value: String,
        #[serde(default)]
        exclude: bool,
    },
    Age {
        source: AgeSource,
        direction: Direction,
        unit: TimeUnit,
        unit_count: i64,
        #[serde(default)]
        unit_count_pattern: Option<String>,
        #[serde(default)]
        timestring: Option<String>,
        #[serde(default)]
        field: Option<String>,
        #[serde(default)]
        stats_result: StatsResult,
        #[serde(default)]
        epoch: Option<i64>,
        #[serde(default)]
        exclude: bool,
    },
    Period {
        #[serde(default)]
        period_type: PeriodType,
        source: AgeSource,
        unit: PeriodUnit,
        #[serde(default)]
        range_from: Option<i64>,
        #[serde(default)]
        range_to: Option<i64>,
        #[serde(default)]
        date_from: Option<String>,
        #[serde(default)]
        date_to: Option<String>,
        #[serde(default)]
        date_from_format: Option<String>,
        #[serde(default)]
        date_to_format: Option<String>,
        #[serde(default)]
        week_starts_on: WeekStartsOn,
        #[serde(default)]
        timestring: Option<String>,
        #[serde(default)]
        field: Option<String>,
        #[serde(default)]
        intersect: bool,
        #[serde(default)]
        epoch: Option<i64>,
        #[serde(default)]
        exclude: bool,
    },
    Space {
        disk_space: f64,
        #[serde(default)]
        threshold_behavior: ThresholdBehavior,
        #[serde(default = "default_true")]
        reverse: bool,
        #[serde(default)]
        use_age: bool,
        #[serde(default)]
        source: Option<AgeSource>,
        #[serde(default)]
        timestring: Option<String>,
        #[serde(default)]
        field: Option<String>,
        #[serde(default)]
        stats_result: StatsResult,
        #[serde(default)]
        exclude: bool,
    },
    Count {
        count: usize,
        #[serde(default = "default_true")]
        reverse: bool,
        #[serde(default)]
        use_age: bool,
        #[serde(default)]
        pattern: Option<String>,
        #[serde(default)]
        source: Option<AgeSource>,
        #[serde(default)]
        timestring: Option<String>,
        #[serde(default)]
        field: Option<String>,
        #[serde(default)]
        stats_result: StatsResult,
        #[serde(default)]
        exclude: bool,
    },
    Alias {
        aliases: Vec<String>,
        #[serde(default)]
        exclude: bool,
    },
    Allocated {
        key: String,
        value: String,
        #[serde(default = "default_allocation_type")]
        allocation_type: String,
        #[serde(default = "default_true")]
        exclude: bool,
    },
    Opened {
        #[serde(default)]
        exclude: bool,
    },
    Closed {
        #[serde(default)]
        exclude: bool,
    },
    Empty {
        #[serde(default)]
        exclude: bool,
    },
    Forcemerged {
        max_num_segments: u64,
        #[serde(default = "default_true")]
        exclude: bool,
    },
    Kibana {
        #[serde(default = "default_true")]
        exclude: bool,
    },
    None {},
    State {
        state: SnapshotState,
        #[serde(default)]
        exclude: bool,
    },
}

fn default_true() -> bool {
    true
}

fn default_allocation_type() -> String {
    "require".to_string()
}

impl FilterSpec {
    /// The `filtertype` name, for logs and errors.
    pub fn type_name(&self) -> &'static str {
        match self {
            FilterSpec::Pattern { .. } => "pattern",
            FilterSpec::Age { .. } => "age",
            FilterSpec::Period { .. } => "period",
            FilterSpec::Space { .. } => "space",
            FilterSpec::Count { .. } => "count",
            FilterSpec::Alias { .. } => "alias",
            FilterSpec::Allocated { .. } => "allocated",
            FilterSpec::Opened { .. } => "opened",
            FilterSpec::Closed { .. } => "closed",
            FilterSpec::Empty { .. } => "empty",
            FilterSpec::Forcemerged { .. } => "forcemerged",
            FilterSpec::Kibana { .. } => "kibana",
            FilterSpec::None {} => "none",
            FilterSpec::State { .. } => "state",
        }
    }

    /// Whether this filter needs segment counts loaded on the inventory.
    pub fn needs_segment_counts(&self) -> bool {
        matches!(self, FilterSpec::Forcemerged { .. })
    }
}

/// Compile a pattern filter to its regex form. Prefix and suffix values are
/// anchored; timestrings and raw regexes are used as written.
fn pattern_regex(kind: PatternKind, value: &str) -> Result<Regex> {
    let pattern = match kind {
        PatternKind::Prefix => format!("^{}.*$", regex::escape(value)),
        PatternKind::Suffix => format!("^.*{}$", regex::escape(value)),
        PatternKind::Timestring => return timestring::timestring_regex(value),
        PatternKind::Regex => value.to_string(),
    };
    Regex::new(&pattern).map_err(|e| Error::Config(format!("invalid pattern: {}", e)))
}

const KIBANA_PATTERN: &str = r"^\.kibana.*$";

/// Apply a filter chain to the index inventory.
pub async fn apply_to_indices(
    mut list: Vec<IndexInfo>,
    chain: &[FilterSpec],
    stats: &dyn FieldStats,
    now_epoch: i64,
) -> Result<Vec<IndexInfo>> {
    for filter in chain {
        let before = list.len();
        list = apply_one_to_indices(list, filter, stats, now_epoch).await?;
        debug!(
            filtertype = filter.type_name(),
            before,
            after = list.len(),
            "applied index filter"
        );
    }
    Ok(list)
}

async fn apply_one_to_indices(
    list: Vec<IndexInfo>,
    filter: &FilterSpec,
    stats: &dyn FieldStats,
    now_epoch: i64,
) -> Result<Vec<IndexInfo>> {
    match filter {
        FilterSpec::Pattern { kind, value, exclude } => {
            let regex = pattern_regex(*kind, value)?;
            Ok(retain_matching(list, *exclude, |index| {
                regex.is_match(&index.name)
            }))
        }

        FilterSpec::Age {
            source,
            direction,
            unit,
            unit_count,
            unit_count_pattern,
            timestring,
            field,
            stats_result,
            epoch,
            exclude,
        } => {
            let count_pattern = unit_count_pattern
                .as_deref()
                .map(Regex::new)
                .transpose()
                .map_err(|e| Error::Config(format!("invalid unit_count_pattern: {}", e)))?;
            let ranges =
                field_ranges_if_needed(&list, *source, field.as_deref(), stats).await?;
            let reference = epoch.unwrap_or(now_epoch);

            let mut retained = Vec::new();
            for index in list {
                let Some(count) =
                    age::effective_unit_count(&index.name, *unit_count, count_pattern.as_ref())
                else {
                    debug!(index = %index.name, "age filter: no unit count, dropping");
                    continue;
                };
                let range = ranges.as_ref().and_then(|r| r.get(&index.name)).copied();
                let Some(timestamp) = age::index_timestamp(
                    &index,
                    *source,
                    timestring.as_deref(),
                    *stats_result,
                    range,
                )?
                else {
                    debug!(index = %index.name, "age filter: no derivable timestamp, dropping");
                    continue;
                };
                let por = age::point_of_reference(*unit, count, reference);
                if age::retain(*direction, timestamp, por) != *exclude {
                    retained.push(index);
                }
            }
            Ok(retained)
        }

        FilterSpec::Period {
            period_type,
            source,
            unit,
            range_from,
            range_to,
            date_from,
            date_to,
            date_from_format,
            date_to_format,
            week_starts_on,
            timestring,
            field,
            intersect,
            epoch,
            exclude,
        } => {
            let range = period_range(
                *period_type,
                *unit,
                *range_from,
                *range_to,
                date_from.as_deref(),
                date_to.as_deref(),
                date_from_format.as_deref(),
                date_to_format.as_deref(),
                *week_starts_on,
                epoch.unwrap_or(now_epoch),
            )?;
            let ranges =
                field_ranges_if_needed(&list, *source, field.as_deref(), stats).await?;

            let mut retained = Vec::new();
            for index in list {
                let matches = if *source == AgeSource::FieldStats {
                    let Some((min, max)) =
                        ranges.as_ref().and_then(|r| r.get(&index.name)).copied()
                    else {
                        debug!(index = %index.name, "period filter: no field stats, dropping");
                        continue;
                    };
                    if *intersect {
                        period::in_range(range, min) && period::in_range(range, max)
                    } else {
                        period::in_range(range, min)
                    }
                } else {
                    let Some(timestamp) = age::index_timestamp(
                        &index,
                        *source,
                        timestring.as_deref(),
                        StatsResult::MinValue,
                        None,
                    )?
                    else {
                        debug!(index = %index.name, "period filter: no derivable timestamp, dropping");
                        continue;
                    };
                    period::in_range(range, timestamp)
                };
                if matches != *exclude {
                    retained.push(index);
                }
            }
            Ok(retained)
        }

        FilterSpec::Space {
            disk_space,
            threshold_behavior,
            reverse,
            use_age,
            source,
            timestring,
            field,
            stats_result,
            exclude,
        } => {
            let timestamps = if *use_age {
                let source = source.ok_or_else(|| {
                    Error::Config("space filter with use_age requires a source".to_string())
                })?;
                Some(
                    index_timestamps(
                        &list,
                        source,
                        timestring.as_deref(),
                        *stats_result,
                        field.as_deref(),
                        stats,
                    )
                    .await?,
                )
            } else {
                None
            };
            let selected = space::apply_space(
                list.clone(),
                timestamps.as_ref(),
                *disk_space,
                *threshold_behavior,
                *reverse,
                *use_age,
            );
            Ok(invert_selection(list, selected, *exclude, |i| &i.name))
        }

        FilterSpec::Count {
            count,
            reverse,
            use_age,
            pattern,
            source,
            timestring,
            field,
            stats_result,
            exclude,
        } => {
            let group_pattern = pattern
                .as_deref()
                .map(Regex::new)
                .transpose()
                .map_err(|e| Error::Config(format!("invalid count pattern: {}", e)))?;
            let timestamps = if *use_age {
                let source = source.ok_or_else(|| {
                    Error::Config("count filter with use_age requires a source".to_string())
                })?;
                Some(
                    index_timestamps(
                        &list,
                        source,
                        timestring.as_deref(),
                        *stats_result,
                        field.as_deref(),
                        stats,
                    )
                    .await?,
                )
            } else {
                None
            };
            let selected = count::apply_count(
                list.clone(),
                |index| index.name.as_str(),
                timestamps.as_ref(),
                *count,
                *reverse,
                *use_age,
                group_pattern.as_ref(),
            );
            Ok(invert_selection(list, selected, *exclude, |i| &i.name))
        }

        FilterSpec::Alias { aliases, exclude } => Ok(retain_matching(list, *exclude, |index| {
            aliases.iter().all(|alias| index.aliases.contains(alias))
        })),

        FilterSpec::Allocated {
            key,
            value,
            allocation_type,
            exclude,
        } => {
            if !matches!(allocation_type.as_str(), "require" | "include" | "exclude") {
                return Err(Error::Config(format!(
                    "invalid allocation_type: {}",
                    allocation_type
                )));
            }
            let setting = format!("{}.{}", allocation_type, key);
            Ok(retain_matching(list, *exclude, |index| {
                index.routing_allocation.get(&setting) == Some(value)
            }))
        }

        FilterSpec::Opened { exclude } => {
            Ok(retain_matching(list, *exclude, |index| index.is_open()))
        }

        FilterSpec::Closed { exclude } => {
            Ok(retain_matching(list, *exclude, |index| index.is_closed()))
        }

        FilterSpec::Empty { exclude } => {
            Ok(retain_matching(list, *exclude, |index| index.docs_count == 0))
        }

        FilterSpec::Forcemerged {
            max_num_segments,
            exclude,
        } => Ok(retain_matching(list, *exclude, |index| {
            match index.segments_per_shard() {
                Some(per_shard) => per_shard <= *max_num_segments,
                None => {
                    debug!(index = %index.name, "forcemerged filter: segment count unknown");
                    false
                }
            }
        })),

        FilterSpec::Kibana { exclude } => {
            let regex = Regex::new(KIBANA_PATTERN)
                .map_err(|e| Error::Fatal(format!("kibana pattern: {}", e)))?;
            Ok(retain_matching(list, *exclude, |index| {
                regex.is_match(&index.name)
            }))
        }

        FilterSpec::None {} => Ok(list),

        FilterSpec::State { .. } => Err(Error::Config(
            "the state filter applies only to snapshots".to_string(),
        )),
    }
}

/// Apply a filter chain to a snapshot list.
pub fn apply_to_snapshots(
    mut list: Vec<SnapshotInfo>,
    chain: &[FilterSpec],
    now_epoch: i64,
) -> Result<Vec<SnapshotInfo>> {
    for filter in chain {
        let before = list.len();
        list = apply_one_to_snapshots(list, filter, now_epoch)?;
        debug!(
            filtertype = filter.type_name(),
            before,
            after = list.len(),
            "applied snapshot filter"
        );
    }
    Ok(list)
}

fn apply_one_to_snapshots(
    list: Vec<SnapshotInfo>,
    filter: &FilterSpec,
    now_epoch: i64,
) -> Result<Vec<SnapshotInfo>> {
    match filter {
        FilterSpec::Pattern { kind, value, exclude } => {
            let regex = pattern_regex(*kind, value)?;
            Ok(retain_matching(list, *exclude, |snapshot| {
                regex.is_match(&snapshot.name)
            }))
        }

        FilterSpec::Age {
            source,
            direction,
            unit,
            unit_count,
            unit_count_pattern,
            timestring,
            epoch,
            exclude,
            ..
        } => {
            let count_pattern = unit_count_pattern
                .as_deref()
                .map(Regex::new)
                .transpose()
                .map_err(|e| Error::Config(format!("invalid unit_count_pattern: {}", e)))?;
            let reference = epoch.unwrap_or(now_epoch);

            let mut retained = Vec::new();
            for snapshot in list {
                let Some(count) = age::effective_unit_count(
                    &snapshot.name,
                    *unit_count,
                    count_pattern.as_ref(),
                ) else {
                    continue;
                };
                let Some(timestamp) =
                    age::snapshot_timestamp(&snapshot, *source, timestring.as_deref())?
                else {
                    debug!(snapshot = %snapshot.name, "age filter: no derivable timestamp, dropping");
                    continue;
                };
                let por = age::point_of_reference(*unit, count, reference);
                if age::retain(*direction, timestamp, por) != *exclude {
                    retained.push(snapshot);
                }
            }
            Ok(retained)
        }

        FilterSpec::Period {
            period_type,
            source,
            unit,
            range_from,
            range_to,
            date_from,
            date_to,
            date_from_format,
            date_to_format,
            week_starts_on,
            timestring,
            epoch,
            exclude,
            ..
        } => {
            if *source == AgeSource::FieldStats {
                return Err(Error::Config(
                    "field_stats is not a valid period source for snapshots".to_string(),
                ));
            }
            let range = period_range(
                *period_type,
                *unit,
                *range_from,
                *range_to,
                date_from.as_deref(),
                date_to.as_deref(),
                date_from_format.as_deref(),
                date_to_format.as_deref(),
                *week_starts_on,
                epoch.unwrap_or(now_epoch),
            )?;

            let mut retained = Vec::new();
            for snapshot in list {
                let Some(timestamp) =
                    age::snapshot_timestamp(&snapshot, *source, timestring.as_deref())?
                else {
                    continue;
                };
                if period::in_range(range, timestamp) != *exclude {
                    retained.push(snapshot);
                }
            }
            Ok(retained)
        }

        FilterSpec::Count {
            count,
            reverse,
            use_age,
            pattern,
            source,
            timestring,
            exclude,
            ..
        } => {
            let group_pattern = pattern
                .as_deref()
                .map(Regex::new)
                .transpose()
                .map_err(|e| Error::Config(format!("invalid count pattern: {}", e)))?;
            let timestamps = if *use_age {
                let source = source.ok_or_else(|| {
                    Error::Config("count filter with use_age requires a source".to_string())
                })?;
                let mut map = HashMap::new();
                for snapshot in &list {
                    if let Some(ts) =
                        age::snapshot_timestamp(snapshot, source, timestring.as_deref())?
                    {
                        map.insert(snapshot.name.clone(), ts);
                    }
                }
                Some(map)
            } else {
                None
            };
            let selected = count::apply_count(
                list.clone(),
                |snapshot| snapshot.name.as_str(),
                timestamps.as_ref(),
                *count,
                *reverse,
                *use_age,
                group_pattern.as_ref(),
            );
            Ok(invert_selection(list, selected, *exclude, |s| &s.name))
        }

        FilterSpec::State { state, exclude } => Ok(retain_matching(list, *exclude, |snapshot| {
            snapshot.state == *state
        })),

        FilterSpec::None {} => Ok(list),

        other => Err(Error::Config(format!(
            "the {} filter applies only to indices",
            other.type_name()
        ))),
    }
}

#[allow(clippy::too_many_arguments)]
fn period_range(
    period_type: PeriodType,
    unit: PeriodUnit,
    range_from: Option<i64>,
    range_to: Option<i64>,
    date_from: Option<&str>,
    date_to: Option<&str>,
    date_from_format: Option<&str>,
    date_to_format: Option<&str>,
    week_starts_on: WeekStartsOn,
    now_epoch: i64,
) -> Result<(i64, i64)> {
    match period_type {
        PeriodType::Relative => {
            let (from, to) = match (range_from, range_to) {
                (Some(from), Some(to)) => (from, to),
                _ => {
                    return Err(Error::Config(
                        "relative period requires range_from and range_to".to_string(),
                    ))
                }
            };
            period::relative_range(unit, from, to, now_epoch, week_starts_on)
        }
        PeriodType::Absolute => {
            let (Some(date_from), Some(date_to), Some(from_format), Some(to_format)) =
                (date_from, date_to, date_from_format, date_to_format)
            else {
                return Err(Error::Config(
                    "absolute period requires date_from, date_to and their formats".to_string(),
                ));
            };
            period::absolute_range(date_from, from_format, date_to, to_format)
        }
    }
}

/// `keep = matches != exclude` over a list, preserving order.
fn retain_matching<T>(list: Vec<T>, exclude: bool, matches: impl Fn(&T) -> bool) -> Vec<T> {
    list.into_iter()
        .filter(|entity| matches(entity) != exclude)
        .collect()
}

/// For reordering filters (count, space): without `exclude` the selection
/// replaces the list; with it, the selection is removed from the original
/// list, which keeps its order.
fn invert_selection<T>(
    original: Vec<T>,
    selected: Vec<T>,
    exclude: bool,
    name_of: impl Fn(&T) -> &String,
) -> Vec<T> {
    if !exclude {
        return selected;
    }
    let selected_names: Vec<String> = selected.iter().map(|e| name_of(e).clone()).collect();
    original
        .into_iter()
        .filter(|entity| !selected_names.contains(name_of(entity)))
        .collect()
}

async fn field_ranges_if_needed(
    list: &[IndexInfo],
    source: AgeSource,
    field: Option<&str>,
    stats: &dyn FieldStats,
) -> Result<Option<HashMap<String, (i64, i64)>>> {
    if source != AgeSource::FieldStats {
        return Ok(None);
    }
    let field = field.ok_or_else(|| {
        Error::Config("field_stats source requires a field".to_string())
    })?;
    let mut map = HashMap::new();
    for index in list {
        match stats.date_field_range(&index.name, field).await {
            Ok(range) => {
                map.insert(index.name.clone(), range);
            }
            Err(e) => {
                debug!(index = %index.name, error = %e, "field stats unavailable");
            }
        }
    }
    Ok(Some(map))
}

async fn index_timestamps(
    list: &[IndexInfo],
    source: AgeSource,
    timestring: Option<&str>,
    stats_result: StatsResult,
    field: Option<&str>,
    stats: &dyn FieldStats,
) -> Result<HashMap<String, i64>> {
    let ranges = field_ranges_if_needed(list, source, field, stats).await?;
    let mut map = HashMap::new();
    for index in list {
        let range = ranges.as_ref().and_then(|r| r.get(&index.name)).copied();
        if let Some(ts) =
            age::index_timestamp(index, source, timestring, stats_result, range)?
        {
            map.insert(index.name.clone(), ts);
        }
    }
    Ok(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use curator_client::IndexState;
    use std::collections::{BTreeMap, BTreeSet};

    fn index(name: &str) -> IndexInfo {
        IndexInfo {
            name: name.to_string(),
            state: IndexState::Open,
            creation_date_ms: 0,
            docs_count: 10,
            size_bytes: 0,
            aliases: BTreeSet::new(),
            routing_allocation: BTreeMap::new(),
            hidden: false,
            ilm_policy: None,
            number_of_shards: 1,
            data_stream: None,
            is_write_index: false,
            store_snapshot: None,
            segment_count: None,
        }
    }

    fn names(list: &[IndexInfo]) -> Vec<&str> {
        list.iter().map(|i| i.name.as_str()).collect()
    }

    fn midnight(name: &str, timestring: &str) -> IndexInfo {
        let mut info = index(name);
        let epoch = timestring::parse_name_timestamp(name, timestring)
            .unwrap()
            .unwrap();
        info.creation_date_ms = epoch * 1000;
        info
    }

    #[tokio::test]
    async fn test_age_filter_scenario() {
        // Three dated indices, creation at name-midnight; an `older than 3
        // days from 2017-04-07T15:00:00Z` filter keeps only 04-04.
        let list = vec![
            midnight("logstash-2017.04.04", "%Y.%m.%d"),
            midnight("logstash-2017.04.06", "%Y.%m.%d"),
            midnight("logstash-2017.04.08", "%Y.%m.%d"),
        ];
        let chain = vec![FilterSpec::Age {
            source: AgeSource::Name,
            direction: Direction::Older,
            unit: TimeUnit::Days,
            unit_count: 3,
            unit_count_pattern: None,
            timestring: Some("%Y.%m.%d".to_string()),
            field: None,
            stats_result: StatsResult::MinValue,
            epoch: Some(1491577200),
            exclude: false,
        }];
        let result = apply_to_indices(list, &chain, &NoFieldStats, 0)
            .await
            .unwrap();
        assert_eq!(names(&result), vec!["logstash-2017.04.04"]);
    }

    #[tokio::test]
    async fn test_pattern_prefix_anchored() {
        let list = vec![index("logstash-1"), index("not-logstash-1")];
        let chain = vec![FilterSpec::Pattern {
            kind: PatternKind::Prefix,
            value: "logstash-".to_string(),
            exclude: false,
        }];
        let result = apply_to_indices(list, &chain, &NoFieldStats, 0)
            .await
            .unwrap();
        assert_eq!(names(&result), vec!["logstash-1"]);
    }

    #[tokio::test]
    async fn test_timestring_workaround_chain() {
        // %Y.%m alone also matches daily indices; the documented workaround
        // chains an exclude filter for the longer stamp.
        let list = vec![index("idx-2017.04"), index("idx-2017.04.12")];
        let loose = vec![FilterSpec::Pattern {
            kind: PatternKind::Timestring,
            value: "%Y.%m".to_string(),
            exclude: false,
        }];
        let result = apply_to_indices(list.clone(), &loose, &NoFieldStats, 0)
            .await
            .unwrap();
        assert_eq!(result.len(), 2);

        let chained = vec![
            FilterSpec::Pattern {
                kind: PatternKind::Timestring,
                value: "%Y.%m".to_string(),
                exclude: false,
            },
            FilterSpec::Pattern {
                kind: PatternKind::Timestring,
                value: "%Y.%m.%d".to_string(),
                exclude: true,
            },
        ];
        let result = apply_to_indices(list, &chained, &NoFieldStats, 0)
            .await
            .unwrap();
        assert_eq!(names(&result), vec!["idx-2017.04"]);
    }

    #[tokio::test]
    async fn test_alias_filter_requires_all() {
        let mut both = index("both");
        both.aliases.insert("a1".to_string());
        both.aliases.insert("a2".to_string());
        let mut one = index("one");
        one.aliases.insert("a1".to_string());

        let chain = vec![FilterSpec::Alias {
            aliases: vec!["a1".to_string(), "a2".to_string()],
            exclude: false,
        }];
        let result = apply_to_indices(vec![both, one], &chain, &NoFieldStats, 0)
            .await
            .unwrap();
        assert_eq!(names(&result), vec!["both"]);
    }

    #[tokio::test]
    async fn test_kibana_filter_default_excludes() {
        let list = vec![index(".kibana_8.9.0"), index("logs-1")];
        let chain = vec![FilterSpec::Kibana { exclude: true }];
        let result = apply_to_indices(list, &chain, &NoFieldStats, 0)
            .await
            .unwrap();
        assert_eq!(names(&result), vec!["logs-1"]);
    }

    #[tokio::test]
    async fn test_state_filter_rejected_for_indices() {
        let chain = vec![FilterSpec::State {
            state: SnapshotState::Success,
            exclude: false,
        }];
        let err = apply_to_indices(vec![index("a")], &chain, &NoFieldStats, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_space_filter_rejected_for_snapshots() {
        let snapshot = SnapshotInfo {
            repository: "repo".to_string(),
            name: "snap-1".to_string(),
            state: SnapshotState::Success,
            start_time_ms: 0,
            indices: vec![],
        };
        let chain = vec![FilterSpec::Space {
            disk_space: 1.0,
            threshold_behavior: ThresholdBehavior::GreaterThan,
            reverse: true,
            use_age: false,
            source: None,
            timestring: None,
            field: None,
            stats_result: StatsResult::MinValue,
            exclude: false,
        }];
        assert!(apply_to_snapshots(vec![snapshot], &chain, 0).is_err());
    }

    #[tokio::test]
    async fn test_snapshot_state_filter() {
        let snap = |name: &str, state: SnapshotState| SnapshotInfo {
            repository: "repo".to_string(),
            name: name.to_string(),
            state,
            start_time_ms: 0,
            indices: vec![],
        };
        let list = vec![
            snap("good", SnapshotState::Success),
            snap("bad", SnapshotState::Failed),
        ];
        let chain = vec![FilterSpec::State {
            state: SnapshotState::Success,
            exclude: false,
        }];
        let result = apply_to_snapshots(list, &chain, 0).unwrap();
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].name, "good");
    }

    #[tokio::test]
    async fn test_exclude_inverts_count_selection() {
        let list: Vec<IndexInfo> = (1..=4).map(|i| index(&format!("idx-{}", i))).collect();
        let keep_two = vec![FilterSpec::Count {
            count: 2,
            reverse: true,
            use_age: false,
            pattern: None,
            source: None,
            timestring: None,
            field: None,
            stats_result: StatsResult::MinValue,
            exclude: false,
        }];
        let kept = apply_to_indices(list.clone(), &keep_two, &NoFieldStats, 0)
            .await
            .unwrap();
        assert_eq!(names(&kept), vec!["idx-4", "idx-3"]);

        let drop_two = vec![FilterSpec::Count {
            count: 2,
            reverse: true,
            use_age: false,
            pattern: None,
            source: None,
            timestring: None,
            field: None,
            stats_result: StatsResult::MinValue,
            exclude: true,
        }];
        let dropped = apply_to_indices(list, &drop_two, &NoFieldStats, 0)
            .await
            .unwrap();
        // Original order preserved for the survivors.
        assert_eq!(names(&dropped), vec!["idx-1", "idx-2"]);
    }

    #[test]
    fn test_filter_spec_yaml_round_trip() {
        let yaml = r#"
filtertype: age
source: name
direction: older
unit: days
unit_count: 3
timestring: '%Y.%m.%d'
"#;
        let spec: FilterSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.type_name(), "age");
        match spec {
            FilterSpec::Age { exclude, epoch, .. } => {
                assert!(!exclude);
                assert_eq!(epoch, None);
            }
            _ => panic!("wrong variant"),
        }
    }

    #[test]
    fn test_type_specific_exclude_defaults() {
        let allocated: FilterSpec = serde_yaml::from_str(
            "filtertype: allocated\nkey: box_type\nvalue: warm\n",
        )
        .unwrap();
        match allocated {
            FilterSpec::Allocated { exclude, allocation_type, .. } => {
                assert!(exclude);
                assert_eq!(allocation_type, "require");
            }
            _ => panic!("wrong variant"),
        }

        let kibana: FilterSpec = serde_yaml::from_str("filtertype: kibana\n").unwrap();
        match kibana {
            FilterSpec::Kibana { exclude } => assert!(exclude),
            _ => panic!("wrong variant"),
        }

        let pattern: FilterSpec =
            serde_yaml::from_str("filtertype: pattern\nkind: prefix\nvalue: x\n").unwrap();
        match pattern {
            FilterSpec::Pattern { exclude, .. } => assert!(!exclude),
            _ => panic!("wrong variant"),
        }
    }
}
