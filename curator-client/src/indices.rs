//! Index inventory and index-level operations.
//!
//! The inventory is assembled from four API calls (settings, cat, stats,
//! aliases) plus the data-stream listing, so downstream filtering is a pure
//! in-memory affair. Expensive per-index detail (segment counts, field
//! stats) is fetched lazily by the callers that need it.

use std::collections::BTreeMap;

use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use crate::client::{chunk_names, EsClient, NAME_CHUNK_LIMIT};
use crate::error::{EsError, Result};
use crate::types::{DataStreamInfo, IndexInfo, IndexState, StoreSnapshot};

const EXPAND_ALL: &str = "open,closed,hidden";

impl EsClient {
    /// Fetch the complete index inventory: open, closed and hidden indices
    /// with settings, sizes, aliases and data-stream membership resolved.
    pub async fn inventory(&self) -> Result<Vec<IndexInfo>> {
        let expand = [("expand_wildcards", EXPAND_ALL.to_string())];

        let settings: Value = self.get("_all/_settings", &expand).await?;
        let cat: Value = self
            .get(
                "_cat/indices",
                &[
                    ("format", "json".to_string()),
                    ("h", "index,status".to_string()),
                    ("expand_wildcards", EXPAND_ALL.to_string()),
                ],
            )
            .await?;
        let stats: Value = self.get("_all/_stats/docs,store", &expand).await?;
        let aliases: Value = self.get("_all/_alias", &expand).await?;
        let data_streams = self.data_streams().await?;

        let mut states = BTreeMap::new();
        if let Some(rows) = cat.as_array() {
            for row in rows {
                let name = row.get("index").and_then(Value::as_str).unwrap_or_default();
                let status = row.get("status").and_then(Value::as_str).unwrap_or("open");
                let state = if status == "close" {
                    IndexState::Close
                } else {
                    IndexState::Open
                };
                states.insert(name.to_string(), state);
            }
        }

        let mut stream_of = BTreeMap::new();
        let mut write_indices = BTreeMap::new();
        for ds in &data_streams {
            for backing in &ds.backing_indices {
                stream_of.insert(backing.clone(), ds.name.clone());
            }
            write_indices.insert(ds.write_index.clone(), ds.name.clone());
        }

        let empty = Value::Object(Default::default());
        let stats_indices = stats.get("indices").unwrap_or(&empty);

        let mut inventory = Vec::new();
        let Some(settings_map) = settings.as_object() else {
            return Ok(inventory);
        };

        for (name, entry) in settings_map {
            let index_settings = entry
                .pointer("/settings/index")
                .cloned()
                .unwrap_or_else(|| Value::Object(Default::default()));

            let index_stats = stats_indices.get(name);
            let docs_count = index_stats
                .and_then(|s| s.pointer("/primaries/docs/count"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let size_bytes = index_stats
                .and_then(|s| s.pointer("/total/store/size_in_bytes"))
                .and_then(Value::as_u64)
                .unwrap_or(0);

            let alias_set = aliases
                .pointer(&format!("/{}/aliases", escape_pointer(name)))
                .and_then(Value::as_object)
                .map(|m| m.keys().cloned().collect())
                .unwrap_or_default();

            inventory.push(IndexInfo {
                name: name.clone(),
                state: states
                    .get(name)
                    .copied()
                    .unwrap_or(IndexState::Open),
                creation_date_ms: str_or_num(&index_settings, "creation_date").unwrap_or(0),
                docs_count,
                size_bytes,
                aliases: alias_set,
                routing_allocation: parse_routing_allocation(&index_settings),
                hidden: flag(&index_settings, "hidden"),
                ilm_policy: index_settings
                    .pointer("/lifecycle/name")
                    .and_then(Value::as_str)
                    .map(str::to_string),
                number_of_shards: str_or_num(&index_settings, "number_of_shards").unwrap_or(1)
                    as u32,
                data_stream: stream_of.get(name).cloned(),
                is_write_index: write_indices.contains_key(name),
                store_snapshot: parse_store_snapshot(&index_settings),
                segment_count: None,
            });
        }

        inventory.sort_by(|a, b| a.name.cmp(&b.name));
        debug!(count = inventory.len(), "assembled index inventory");
        Ok(inventory)
    }

    /// List all data streams; clusters without the API report none.
    pub async fn data_streams(&self) -> Result<Vec<DataStreamInfo>> {
        let response: Result<Value> = self.get("_data_stream", &[]).await;
        let value = match response {
            Ok(v) => v,
            Err(e) if e.is_not_found() => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut streams = Vec::new();
        if let Some(entries) = value.get("data_streams").and_then(Value::as_array) {
            for entry in entries {
                let name = entry
                    .get("name")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string();
                let backing: Vec<String> = entry
                    .get("indices")
                    .and_then(Value::as_array)
                    .map(|arr| {
                        arr.iter()
                            .filter_map(|i| i.get("index_name").and_then(Value::as_str))
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                let write_index = backing.last().cloned().unwrap_or_default();
                streams.push(DataStreamInfo {
                    name,
                    backing_indices: backing,
                    write_index,
                });
            }
        }
        Ok(streams)
    }

    /// Attach a backing index to a data stream.
    pub async fn add_backing_index(&self, data_stream: &str, index: &str) -> Result<()> {
        let body = json!({
            "actions": [
                { "add_backing_index": { "data_stream": data_stream, "index": index } }
            ]
        });
        let _: Value = self
            .request(Method::POST, "_data_stream/_modify", &[], Some(&body), None)
            .await?;
        Ok(())
    }

    /// Total segment counts for the named indices.
    pub async fn segment_counts(&self, names: &[String]) -> Result<BTreeMap<String, u64>> {
        let mut counts = BTreeMap::new();
        for chunk in chunk_names(names, NAME_CHUNK_LIMIT) {
            let value: Value = self
                .get(&format!("{}/_segments", chunk), &[])
                .await?;
            if let Some(indices) = value.get("indices").and_then(Value::as_object) {
                for (name, entry) in indices {
                    let mut total = 0u64;
                    if let Some(shards) = entry.get("shards").and_then(Value::as_object) {
                        for copies in shards.values() {
                            if let Some(copies) = copies.as_array() {
                                for copy in copies {
                                    total += copy
                                        .get("num_search_segments")
                                        .and_then(Value::as_u64)
                                        .unwrap_or(0);
                                }
                            }
                        }
                    }
                    counts.insert(name.clone(), total);
                }
            }
        }
        Ok(counts)
    }

    /// Min/max of a date field, epoch seconds, via a two-bucket aggregation.
    pub async fn date_field_range(&self, index: &str, field: &str) -> Result<(i64, i64)> {
        let body = json!({
            "size": 0,
            "aggs": {
                "min_v": { "min": { "field": field } },
                "max_v": { "max": { "field": field } }
            }
        });
        let value: Value = self
            .request(
                Method::POST,
                &format!("{}/_search", index),
                &[],
                Some(&body),
                None,
            )
            .await?;
        let min = value
            .pointer("/aggregations/min_v/value")
            .and_then(Value::as_f64);
        let max = value
            .pointer("/aggregations/max_v/value")
            .and_then(Value::as_f64);
        match (min, max) {
            (Some(min), Some(max)) => Ok(((min / 1000.0) as i64, (max / 1000.0) as i64)),
            _ => Err(EsError::Api {
                status: 500,
                reason: format!("no field stats for {} on {}", field, index),
            }),
        }
    }

    /// Delete indices, chunked.
    pub async fn delete_indices(
        &self,
        names: &[String],
        timeout_override: Option<u64>,
    ) -> Result<()> {
        for chunk in chunk_names(names, NAME_CHUNK_LIMIT) {
            let _: Value = self
                .request(
                    Method::DELETE,
                    &chunk,
                    &[("expand_wildcards", EXPAND_ALL.to_string())],
                    None,
                    timeout_override,
                )
                .await?;
        }
        Ok(())
    }

    /// Open indices, chunked.
    pub async fn open_indices(
        &self,
        names: &[String],
        timeout_override: Option<u64>,
    ) -> Result<()> {
        for chunk in chunk_names(names, NAME_CHUNK_LIMIT) {
            let _: Value = self
                .request(
                    Method::POST,
                    &format!("{}/_open", chunk),
                    &[("expand_wildcards", EXPAND_ALL.to_string())],
                    None,
                    timeout_override,
                )
                .await?;
        }
        Ok(())
    }

    /// Close indices, chunked.
    pub async fn close_indices(
        &self,
        names: &[String],
        timeout_override: Option<u64>,
    ) -> Result<()> {
        for chunk in chunk_names(names, NAME_CHUNK_LIMIT) {
            let _: Value = self
                .request(
                    Method::POST,
                    &format!("{}/_close", chunk),
                    &[],
                    None,
                    timeout_override,
                )
                .await?;
        }
        Ok(())
    }

    /// Flush indices (used before close unless `skip_flush`).
    pub async fn flush_indices(&self, names: &[String]) -> Result<()> {
        for chunk in chunk_names(names, NAME_CHUNK_LIMIT) {
            let _: Value = self
                .request(Method::POST, &format!("{}/_flush", chunk), &[], None, None)
                .await?;
        }
        Ok(())
    }

    /// Apply settings to indices.
    pub async fn put_index_settings(
        &self,
        names: &[String],
        settings: &Value,
        preserve_existing: bool,
        ignore_unavailable: bool,
        timeout_override: Option<u64>,
    ) -> Result<()> {
        let mut query = vec![("expand_wildcards", EXPAND_ALL.to_string())];
        if preserve_existing {
            query.push(("preserve_existing", "true".to_string()));
        }
        if ignore_unavailable {
            query.push(("ignore_unavailable", "true".to_string()));
        }
        for chunk in chunk_names(names, NAME_CHUNK_LIMIT) {
            let _: Value = self
                .request(
                    Method::PUT,
                    &format!("{}/_settings", chunk),
                    &query,
                    Some(settings),
                    timeout_override,
                )
                .await?;
        }
        Ok(())
    }

    /// Atomic alias update (`POST /_aliases`).
    pub async fn update_aliases(&self, actions: Vec<Value>) -> Result<()> {
        let body = json!({ "actions": actions });
        let _: Value = self
            .request(Method::POST, "_aliases", &[], Some(&body), None)
            .await?;
        Ok(())
    }

    /// Remove every alias from the named indices.
    pub async fn delete_all_aliases(&self, names: &[String]) -> Result<()> {
        for chunk in chunk_names(names, NAME_CHUNK_LIMIT) {
            let result: Result<Value> = self
                .request(
                    Method::DELETE,
                    &format!("{}/_alias/*", chunk),
                    &[],
                    None,
                    None,
                )
                .await;
            match result {
                Ok(_) => {}
                // No aliases on any of the chunk's indices.
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Resolve an alias to its member indices and write-index flags.
    pub async fn get_alias(&self, alias: &str) -> Result<BTreeMap<String, bool>> {
        let value: Value = self.get(&format!("_alias/{}", alias), &[]).await?;
        let mut members = BTreeMap::new();
        if let Some(map) = value.as_object() {
            for (index, entry) in map {
                let is_write = entry
                    .pointer(&format!("/aliases/{}/is_write_index", escape_pointer(alias)))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                members.insert(index.clone(), is_write);
            }
        }
        Ok(members)
    }

    /// Check whether an alias exists.
    pub async fn alias_exists(&self, alias: &str) -> Result<bool> {
        match self.get_alias(alias).await {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Force-merge one index down to `max_num_segments`.
    pub async fn forcemerge(
        &self,
        index: &str,
        max_num_segments: u32,
        timeout_override: Option<u64>,
    ) -> Result<()> {
        let _: Value = self
            .request(
                Method::POST,
                &format!("{}/_forcemerge", index),
                &[("max_num_segments", max_num_segments.to_string())],
                None,
                timeout_override,
            )
            .await?;
        Ok(())
    }

    /// Roll an alias over. Returns `true` when a rollover happened.
    pub async fn rollover(
        &self,
        alias: &str,
        conditions: &Value,
        new_index: Option<&str>,
        extra_settings: Option<&Value>,
        timeout_override: Option<u64>,
    ) -> Result<bool> {
        let mut body = json!({ "conditions": conditions });
        if let Some(settings) = extra_settings {
            body["settings"] = settings.clone();
        }
        let path = match new_index {
            Some(target) => format!("{}/_rollover/{}", alias, target),
            None => format!("{}/_rollover", alias),
        };
        let value: Value = self
            .request(Method::POST, &path, &[], Some(&body), timeout_override)
            .await?;
        Ok(value
            .get("rolled_over")
            .and_then(Value::as_bool)
            .unwrap_or(false))
    }

    /// Create an index with optional settings/mappings body.
    pub async fn create_index(&self, name: &str, body: &Value) -> Result<()> {
        let _: Value = self
            .request(Method::PUT, name, &[], Some(body), None)
            .await?;
        Ok(())
    }

    /// Check index existence.
    pub async fn index_exists(&self, name: &str) -> Result<bool> {
        let result: Result<Value> = self
            .get(
                &format!("{}/_settings", name),
                &[("expand_wildcards", EXPAND_ALL.to_string())],
            )
            .await;
        match result {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Shrink `source` into `target` with the given request body.
    pub async fn shrink(
        &self,
        source: &str,
        target: &str,
        body: &Value,
        timeout_override: Option<u64>,
    ) -> Result<()> {
        let _: Value = self
            .request(
                Method::PUT,
                &format!("{}/_shrink/{}", source, target),
                &[],
                Some(body),
                timeout_override,
            )
            .await?;
        Ok(())
    }

    /// True when every shard of the named indices reports recovery `DONE`.
    pub async fn recovery_done(&self, names: &[String]) -> Result<bool> {
        for chunk in chunk_names(names, NAME_CHUNK_LIMIT) {
            let value: Value = self.get(&format!("{}/_recovery", chunk), &[]).await?;
            let Some(indices) = value.as_object() else {
                continue;
            };
            for entry in indices.values() {
                if let Some(shards) = entry.get("shards").and_then(Value::as_array) {
                    for shard in shards {
                        if shard.get("stage").and_then(Value::as_str) != Some("DONE") {
                            return Ok(false);
                        }
                    }
                }
            }
        }
        Ok(true)
    }
}

fn escape_pointer(segment: &str) -> String {
    segment.replace('~', "~0").replace('/', "~1")
}

/// Index settings frequently encode numbers as strings; accept both.
fn str_or_num(settings: &Value, key: &str) -> Option<i64> {
    match settings.get(key) {
        Some(Value::String(s)) => s.parse().ok(),
        Some(Value::Number(n)) => n.as_i64(),
        _ => None,
    }
}

fn flag(settings: &Value, key: &str) -> bool {
    match settings.get(key) {
        Some(Value::String(s)) => s == "true",
        Some(Value::Bool(b)) => *b,
        _ => false,
    }
}

fn parse_routing_allocation(settings: &Value) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for alloc_type in ["require", "include", "exclude"] {
        if let Some(entries) = settings
            .pointer(&format!("/routing/allocation/{}", alloc_type))
            .and_then(Value::as_object)
        {
            for (key, value) in entries {
                if let Some(value) = value.as_str() {
                    map.insert(format!("{}.{}", alloc_type, key), value.to_string());
                }
            }
        }
    }
    map
}

fn parse_store_snapshot(settings: &Value) -> Option<StoreSnapshot> {
    let store_type = settings.pointer("/store/type").and_then(Value::as_str);
    if store_type != Some("snapshot") {
        return None;
    }
    let snapshot = settings.pointer("/store/snapshot")?;
    Some(StoreSnapshot {
        repository: snapshot
            .get("repository_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        snapshot: snapshot
            .get("snapshot_name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        index_name: snapshot
            .get("index_name")
            .and_then(Value::as_str)
            .map(str::to_string),
        partial: match snapshot.get("partial") {
            Some(Value::String(s)) => s == "true",
            Some(Value::Bool(b)) => *b,
            _ => false,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_routing_allocation() {
        let settings = serde_json::json!({
            "routing": { "allocation": { "require": { "box_type": "warm" },
                                          "exclude": { "rack": "r1" } } }
        });
        let map = parse_routing_allocation(&settings);
        assert_eq!(map.get("require.box_type"), Some(&"warm".to_string()));
        assert_eq!(map.get("exclude.rack"), Some(&"r1".to_string()));
        assert!(!map.contains_key("include.box_type"));
    }

    #[test]
    fn test_parse_store_snapshot() {
        let settings = serde_json::json!({
            "store": {
                "type": "snapshot",
                "snapshot": {
                    "repository_name": "deepfreeze-000001",
                    "snapshot_name": "snap-1",
                    "partial": "true"
                }
            }
        });
        let snap = parse_store_snapshot(&settings).unwrap();
        assert_eq!(snap.repository, "deepfreeze-000001");
        assert!(snap.partial);

        let plain = serde_json::json!({ "store": { "type": "fs" } });
        assert!(parse_store_snapshot(&plain).is_none());
    }

    #[test]
    fn test_str_or_num_accepts_both_encodings() {
        let settings = serde_json::json!({ "creation_date": "1700000000000", "number_of_shards": 3 });
        assert_eq!(str_or_num(&settings, "creation_date"), Some(1700000000000));
        assert_eq!(str_or_num(&settings, "number_of_shards"), Some(3));
        assert_eq!(str_or_num(&settings, "missing"), None);
    }
}
