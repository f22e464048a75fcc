//! Cluster-level operations: health, routing settings, node statistics.

use reqwest::Method;
use serde_json::{json, Value};

use crate::client::EsClient;
use crate::error::Result;
use crate::types::NodeInfo;

/// Cluster health fields the poll loops care about.
#[derive(Debug, Clone)]
pub struct ClusterHealth {
    pub status: String,
    pub relocating_shards: u64,
}

impl ClusterHealth {
    pub fn is_green(&self) -> bool {
        self.status == "green"
    }

    pub fn relocation_done(&self) -> bool {
        self.relocating_shards == 0
    }
}

impl EsClient {
    /// Cluster health, optionally scoped to specific indices.
    pub async fn cluster_health(&self, indices: Option<&str>) -> Result<ClusterHealth> {
        let path = match indices {
            Some(names) => format!("_cluster/health/{}", names),
            None => "_cluster/health".to_string(),
        };
        let value: Value = self.get(&path, &[]).await?;
        Ok(ClusterHealth {
            status: value
                .get("status")
                .and_then(Value::as_str)
                .unwrap_or("red")
                .to_string(),
            relocating_shards: value
                .get("relocating_shards")
                .and_then(Value::as_u64)
                .unwrap_or(0),
        })
    }

    /// Set a transient cluster routing setting
    /// (`cluster.routing.allocation.enable` or
    /// `cluster.routing.rebalance.enable`).
    pub async fn put_cluster_routing(
        &self,
        setting: &str,
        value: &str,
        timeout_override: Option<u64>,
    ) -> Result<()> {
        let mut transient = serde_json::Map::new();
        transient.insert(setting.to_string(), json!(value));
        let body = json!({ "transient": transient });
        let _: Value = self
            .request(
                Method::PUT,
                "_cluster/settings",
                &[],
                Some(&body),
                timeout_override,
            )
            .await?;
        Ok(())
    }

    /// Data-node roles and free filesystem space, for shrink-node selection.
    pub async fn node_fs_stats(&self) -> Result<Vec<NodeInfo>> {
        let value: Value = self.get("_nodes/stats/fs", &[]).await?;
        let mut nodes = Vec::new();
        if let Some(map) = value.get("nodes").and_then(Value::as_object) {
            for (id, entry) in map {
                let roles = entry
                    .get("roles")
                    .and_then(Value::as_array)
                    .map(|arr| {
                        arr.iter()
                            .filter_map(Value::as_str)
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
                nodes.push(NodeInfo {
                    id: id.clone(),
                    name: entry
                        .get("name")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    roles,
                    available_bytes: entry
                        .pointer("/fs/total/available_in_bytes")
                        .and_then(Value::as_u64)
                        .unwrap_or(0),
                });
            }
        }
        Ok(nodes)
    }
}
