//! Data model for cluster inventory.
//!
//! `IndexInfo` and `SnapshotInfo` are the entities the filter and action
//! engines operate on. They are assembled from several API responses
//! (settings, cat, stats, aliases, data streams) and carry everything a
//! filter chain may need, so filtering itself never has to call the cluster
//! except for lazily-loaded segment counts and field stats.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

/// Open/closed state of an index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexState {
    Open,
    Close,
}

impl std::fmt::Display for IndexState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            IndexState::Open => write!(f, "open"),
            IndexState::Close => write!(f, "close"),
        }
    }
}

/// Searchable-snapshot backing information, present on mounted indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub repository: String,
    pub snapshot: String,
    /// Original index name inside the snapshot, when reported
    pub index_name: Option<String>,
    /// `true` for frozen-tier (shared-cache) mounts
    pub partial: bool,
}

/// One index as seen by the filter and action engines.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexInfo {
    pub name: String,
    pub state: IndexState,
    /// Index creation time, epoch milliseconds
    pub creation_date_ms: i64,
    pub docs_count: u64,
    pub size_bytes: u64,
    pub aliases: BTreeSet<String>,
    /// `{allocation_type}.{key}` → value, e.g. `require.box_type` → `warm`
    pub routing_allocation: BTreeMap<String, String>,
    pub hidden: bool,
    pub ilm_policy: Option<String>,
    pub number_of_shards: u32,
    /// Backing data stream, if this is a data-stream index
    pub data_stream: Option<String>,
    /// Set when this index is the write index of its data stream
    pub is_write_index: bool,
    /// Present on searchable-snapshot mounts
    pub store_snapshot: Option<StoreSnapshot>,
    /// Total segment count, lazily loaded when a filter or action needs it
    pub segment_count: Option<u64>,
}

impl IndexInfo {
    pub fn is_open(&self) -> bool {
        self.state == IndexState::Open
    }

    pub fn is_closed(&self) -> bool {
        self.state == IndexState::Close
    }

    pub fn is_searchable_snapshot(&self) -> bool {
        self.store_snapshot.is_some()
    }

    /// Segments per shard, for the forcemerge filter/action.
    pub fn segments_per_shard(&self) -> Option<u64> {
        let total = self.segment_count?;
        Some(total / u64::from(self.number_of_shards.max(1)))
    }
}

/// Snapshot state as reported by the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotState {
    Success,
    Partial,
    Failed,
    InProgress,
}

impl std::fmt::Display for SnapshotState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SnapshotState::Success => "SUCCESS",
            SnapshotState::Partial => "PARTIAL",
            SnapshotState::Failed => "FAILED",
            SnapshotState::InProgress => "IN_PROGRESS",
        };
        write!(f, "{}", s)
    }
}

impl std::str::FromStr for SnapshotState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "SUCCESS" => Ok(SnapshotState::Success),
            "PARTIAL" => Ok(SnapshotState::Partial),
            "FAILED" => Ok(SnapshotState::Failed),
            "IN_PROGRESS" => Ok(SnapshotState::InProgress),
            other => Err(format!("unknown snapshot state: {}", other)),
        }
    }
}

/// One snapshot inside a repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotInfo {
    pub repository: String,
    pub name: String,
    pub state: SnapshotState,
    /// Snapshot start time, epoch milliseconds
    pub start_time_ms: i64,
    pub indices: Vec<String>,
}

/// A registered snapshot repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryInfo {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub bucket: Option<String>,
    pub base_path: Option<String>,
}

/// A data stream and its backing indices.
#[derive(Debug, Clone, Deserialize)]
pub struct DataStreamInfo {
    pub name: String,
    pub backing_indices: Vec<String>,
    pub write_index: String,
}

/// Node roles and free disk space, for shrink-node selection.
#[derive(Debug, Clone)]
pub struct NodeInfo {
    pub id: String,
    pub name: String,
    pub roles: Vec<String>,
    pub available_bytes: u64,
}

impl NodeInfo {
    pub fn is_master(&self) -> bool {
        self.roles.iter().any(|r| r == "master")
    }

    pub fn is_data_node(&self) -> bool {
        self.roles.iter().any(|r| r.starts_with("data"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segments_per_shard() {
        let index = IndexInfo {
            name: "idx".to_string(),
            state: IndexState::Open,
            creation_date_ms: 0,
            docs_count: 0,
            size_bytes: 0,
            aliases: BTreeSet::new(),
            routing_allocation: BTreeMap::new(),
            hidden: false,
            ilm_policy: None,
            number_of_shards: 4,
            data_stream: None,
            is_write_index: false,
            store_snapshot: None,
            segment_count: Some(12),
        };
        assert_eq!(index.segments_per_shard(), Some(3));
    }

    #[test]
    fn test_snapshot_state_round_trip() {
        for s in ["SUCCESS", "PARTIAL", "FAILED", "IN_PROGRESS"] {
            let state: SnapshotState = s.parse().unwrap();
            assert_eq!(state.to_string(), s);
        }
        assert!("BOGUS".parse::<SnapshotState>().is_err());
    }
}
