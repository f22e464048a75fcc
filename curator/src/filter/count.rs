//! Keep-N counting filter, with optional per-group counting.

use std::collections::HashMap;

use regex::Regex;
use tracing::debug;

/// Apply the count filter over any named entity list.
///
/// Ordering is reverse-lexicographic by default (`reverse` flips it); with
/// `use_age` the derived timestamp orders entities newest-first and
/// `reverse` is ignored. With a `group_pattern`, entities are grouped by the
/// pattern's first capture group and the count applies per group; entities
/// the pattern does not match are dropped.
pub fn apply_count<T>(
    list: Vec<T>,
    name_of: impl Fn(&T) -> &str,
    timestamps: Option<&HashMap<String, i64>>,
    count: usize,
    reverse: bool,
    use_age: bool,
    group_pattern: Option<&Regex>,
) -> Vec<T> {
    let mut groups: Vec<(String, Vec<T>)> = Vec::new();

    for entity in list {
        let key = match group_pattern {
            Some(pattern) => {
                match pattern
                    .captures(name_of(&entity))
                    .and_then(|caps| caps.get(1))
                {
                    Some(group) => group.as_str().to_string(),
                    None => {
                        debug!(entity = name_of(&entity), "count filter: no group match, dropping");
                        continue;
                    }
                }
            }
            None => String::new(),
        };
        match groups.iter_mut().find(|(k, _)| *k == key) {
            Some((_, members)) => members.push(entity),
            None => groups.push((key, vec![entity])),
        }
    }

    let mut retained = Vec::new();
    for (_, mut members) in groups {
        if use_age {
            let Some(timestamps) = timestamps else {
                continue;
            };
            members.retain(|entity| {
                let known = timestamps.contains_key(name_of(entity));
                if !known {
                    debug!(
                        entity = name_of(entity),
                        "count filter: no derivable age, dropping"
                    );
                }
                known
            });
            // Newest first; `reverse` has no effect in age mode.
            members.sort_by_key(|entity| std::cmp::Reverse(timestamps[name_of(entity)]));
        } else if reverse {
            members.sort_by(|a, b| name_of(b).cmp(name_of(a)));
        } else {
            members.sort_by(|a, b| name_of(a).cmp(name_of(b)));
        }
        retained.extend(members.into_iter().take(count));
    }
    retained
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[String]) -> Vec<&str> {
        list.iter().map(String::as_str).collect()
    }

    #[test]
    fn test_retains_first_count_reverse_lexicographic() {
        let list: Vec<String> = (1..=5).map(|i| format!("index-{}", i)).collect();
        let kept = apply_count(list, |s| s.as_str(), None, 2, true, false, None);
        assert_eq!(names(&kept), vec!["index-5", "index-4"]);
    }

    #[test]
    fn test_reverse_false_flips_ordering() {
        let list: Vec<String> = (1..=5).map(|i| format!("index-{}", i)).collect();
        let kept = apply_count(list, |s| s.as_str(), None, 2, false, false, None);
        assert_eq!(names(&kept), vec!["index-1", "index-2"]);
    }

    #[test]
    fn test_count_zero_removes_everything() {
        let list: Vec<String> = (1..=3).map(|i| format!("index-{}", i)).collect();
        let kept = apply_count(list, |s| s.as_str(), None, 0, true, false, None);
        assert!(kept.is_empty());
    }

    #[test]
    fn test_use_age_ignores_reverse() {
        let list = vec!["old".to_string(), "new".to_string()];
        let mut timestamps = HashMap::new();
        timestamps.insert("old".to_string(), 100);
        timestamps.insert("new".to_string(), 200);

        // reverse=false would sort ascending lexicographically, but age mode
        // always orders newest-first.
        let kept = apply_count(
            list.clone(),
            |s| s.as_str(),
            Some(&timestamps),
            1,
            false,
            true,
            None,
        );
        assert_eq!(names(&kept), vec!["new"]);

        let kept = apply_count(list, |s| s.as_str(), Some(&timestamps), 1, true, true, None);
        assert_eq!(names(&kept), vec!["new"]);
    }

    #[test]
    fn test_group_pattern_counts_per_group() {
        let list = vec![
            "logs-a-1".to_string(),
            "logs-a-2".to_string(),
            "logs-b-1".to_string(),
            "logs-b-2".to_string(),
            "logs-b-3".to_string(),
            "unrelated".to_string(),
        ];
        let pattern = Regex::new(r"^logs-(\w+)-\d+$").unwrap();
        let kept = apply_count(list, |s| s.as_str(), None, 1, true, false, Some(&pattern));
        let mut got = names(&kept);
        got.sort();
        // One newest per group; the non-matching entity is dropped.
        assert_eq!(got, vec!["logs-a-2", "logs-b-3"]);
    }
}
