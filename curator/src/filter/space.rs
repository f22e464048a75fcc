//! Disk-space accounting filter.
//!
//! Orders the candidate indices, accumulates their sizes, and retains the
//! tail once the running total crosses `disk_space`. A gigabyte is 10⁹
//! bytes here, matching the behavior operators already depend on.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use curator_client::IndexInfo;

/// Which side of the threshold stays in the actionable list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdBehavior {
    #[default]
    GreaterThan,
    LessThan,
}

const GIGABYTE: f64 = 1_000_000_000.0;

/// Apply the space filter.
///
/// `timestamps` supplies derived ages when `use_age` is set; indices without
/// one are dropped. Closed indices are silently excluded; their size is
/// unknown to the stats API.
pub fn apply_space(
    list: Vec<IndexInfo>,
    timestamps: Option<&HashMap<String, i64>>,
    disk_space_gb: f64,
    threshold_behavior: ThresholdBehavior,
    reverse: bool,
    use_age: bool,
) -> Vec<IndexInfo> {
    let mut candidates: Vec<IndexInfo> = list
        .into_iter()
        .filter(|index| {
            if index.is_closed() {
                debug!(index = %index.name, "space filter: skipping closed index (size unknown)");
                return false;
            }
            true
        })
        .collect();

    if use_age {
        let Some(timestamps) = timestamps else {
            return Vec::new();
        };
        candidates.retain(|index| {
            let known = timestamps.contains_key(&index.name);
            if !known {
                debug!(index = %index.name, "space filter: no derivable age, dropping");
            }
            known
        });
        // Newest first, so the oldest indices are the ones that overflow.
        candidates.sort_by_key(|index| std::cmp::Reverse(timestamps[&index.name]));
    } else if reverse {
        candidates.sort_by(|a, b| b.name.cmp(&a.name));
    } else {
        candidates.sort_by(|a, b| a.name.cmp(&b.name));
    }

    let limit = disk_space_gb * GIGABYTE;
    let mut running = 0.0f64;
    let mut retained = Vec::new();
    for index in candidates {
        running += index.size_bytes as f64;
        let keep = match threshold_behavior {
            ThresholdBehavior::GreaterThan => running > limit,
            ThresholdBehavior::LessThan => running <= limit,
        };
        if keep {
            retained.push(index);
        }
    }
    retained
}

#[cfg(test)]
mod tests {
    use super::*;
    use curator_client::IndexState;
    use std::collections::{BTreeMap, BTreeSet};

    fn index(name: &str, size_gb: u64, state: IndexState) -> IndexInfo {
        IndexInfo {
            name: name.to_string(),
            state,
            creation_date_ms: 0,
            docs_count: 1,
            size_bytes: size_gb * 1_000_000_000,
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

    #[test]
    fn test_reverse_default_retains_overflow() {
        // Five 10 GB indices, 21 GB budget: the newest two fit, the three
        // oldest cross the threshold and stay actionable.
        let list: Vec<IndexInfo> = (1..=5)
            .map(|i| index(&format!("index{}", i), 10, IndexState::Open))
            .collect();
        let retained = apply_space(list, None, 21.0, ThresholdBehavior::GreaterThan, true, false);
        let mut got = names(&retained);
        got.sort();
        assert_eq!(got, vec!["index1", "index2", "index3"]);
    }

    #[test]
    fn test_threshold_crossing_entity_is_retained() {
        let list: Vec<IndexInfo> = (1..=5)
            .map(|i| index(&format!("index{}", i), 10, IndexState::Open))
            .collect();
        let retained = apply_space(list, None, 21.0, ThresholdBehavior::GreaterThan, true, false);
        // index3 crosses 21 GB at a running total of 30 GB and is retained.
        assert!(retained.iter().any(|i| i.name == "index3"));
        assert!(!retained.iter().any(|i| i.name == "index4"));
    }

    #[test]
    fn test_zero_disk_space_retains_everything_open() {
        let list = vec![
            index("a", 1, IndexState::Open),
            index("b", 1, IndexState::Open),
        ];
        let retained = apply_space(list, None, 0.0, ThresholdBehavior::GreaterThan, true, false);
        assert_eq!(retained.len(), 2);
    }

    #[test]
    fn test_closed_indices_silently_excluded() {
        let list = vec![
            index("open1", 10, IndexState::Open),
            index("closed1", 10, IndexState::Close),
        ];
        let retained = apply_space(list, None, 0.0, ThresholdBehavior::GreaterThan, true, false);
        assert_eq!(names(&retained), vec!["open1"]);
    }

    #[test]
    fn test_less_than_keeps_under_threshold() {
        let list: Vec<IndexInfo> = (1..=5)
            .map(|i| index(&format!("index{}", i), 10, IndexState::Open))
            .collect();
        let retained = apply_space(list, None, 21.0, ThresholdBehavior::LessThan, true, false);
        let mut got = names(&retained);
        got.sort();
        // The first two accumulated (newest) stay under 21 GB.
        assert_eq!(got, vec!["index4", "index5"]);
    }

    #[test]
    fn test_use_age_orders_by_timestamp() {
        let list = vec![
            index("a-old", 10, IndexState::Open),
            index("b-new", 10, IndexState::Open),
        ];
        let mut timestamps = HashMap::new();
        timestamps.insert("a-old".to_string(), 100);
        timestamps.insert("b-new".to_string(), 200);
        let retained = apply_space(
            list,
            Some(&timestamps),
            15.0,
            ThresholdBehavior::GreaterThan,
            true,
            true,
        );
        // b-new is counted first (10 GB, under); a-old crosses.
        assert_eq!(names(&retained), vec!["a-old"]);
    }
}
