//! The shrink action.
//!
//! Preconditions, in order: the target must not exist, the requested shard
//! count must be a proper factor of the source's, a node must be able to
//! hold every shard (twice the index size free), and the cluster must be
//! green. The source is then marked read-only, its shards collected on the
//! chosen node, the target created, and the source deleted (or unlocked,
//! with `delete_after: false`).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

use curator_client::{IndexInfo, NodeInfo};

use crate::actions::waiter::{self, WaitOptions};
use crate::actions::{
    build_index_list, check_empty, ActionContext, ActionOutcome, CommonOptions,
};
use crate::error::{Error, Result};
use crate::filter::FilterSpec;

/// Sentinel for picking the data node with the most free space.
pub const DETERMINISTIC: &str = "DETERMINISTIC";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeFilters {
    /// Allow master-eligible nodes to receive the shards
    #[serde(default)]
    pub permit_masters: bool,
    /// Node names that must not be chosen
    #[serde(default)]
    pub exclude_nodes: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostAllocation {
    #[serde(default = "default_allocation_type")]
    pub allocation_type: String,
    pub key: String,
    pub value: String,
}

fn default_allocation_type() -> String {
    "require".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShrinkOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    #[serde(default = "default_shrink_node")]
    pub shrink_node: String,
    #[serde(default)]
    pub node_filters: NodeFilters,
    #[serde(default = "default_shards")]
    pub number_of_shards: u32,
    #[serde(default)]
    pub shrink_prefix: String,
    #[serde(default = "default_suffix")]
    pub shrink_suffix: String,
    #[serde(default)]
    pub copy_aliases: bool,
    #[serde(default = "default_true")]
    pub delete_after: bool,
    #[serde(default)]
    pub post_allocation: Option<PostAllocation>,
    #[serde(default)]
    pub extra_settings: Option<Value>,
    #[serde(flatten)]
    pub wait: WaitOptions,
}

fn default_shrink_node() -> String {
    DETERMINISTIC.to_string()
}

fn default_shards() -> u32 {
    1
}

fn default_suffix() -> String {
    "-shrink".to_string()
}

fn default_true() -> bool {
    true
}

impl ShrinkOptions {
    pub fn validate(&self) -> Result<()> {
        if self.number_of_shards == 0 {
            return Err(Error::Config(
                "number_of_shards must be at least 1".to_string(),
            ));
        }
        if self.shrink_prefix.is_empty() && self.shrink_suffix.is_empty() {
            return Err(Error::Config(
                "shrink requires a prefix or suffix so the target name differs".to_string(),
            ));
        }
        if let Some(post) = &self.post_allocation {
            if !matches!(post.allocation_type.as_str(), "require" | "include" | "exclude") {
                return Err(Error::Config(format!(
                    "invalid post_allocation type: {}",
                    post.allocation_type
                )));
            }
        }
        self.wait.validate()
    }

    pub fn target_name(&self, source: &str) -> String {
        format!("{}{}{}", self.shrink_prefix, source, self.shrink_suffix)
    }
}

/// The requested shard count must evenly divide the source's (and shrink
/// must actually shrink).
pub fn shard_factor_ok(source_shards: u32, target_shards: u32) -> bool {
    target_shards > 0 && source_shards > target_shards && source_shards % target_shards == 0
}

/// Pick the shrink node: most available bytes among eligible data nodes,
/// requiring room for a second full copy of the index.
pub fn select_node<'a>(
    nodes: &'a [NodeInfo],
    filters: &NodeFilters,
    required_bytes: u64,
) -> Result<&'a NodeInfo> {
    let candidate = nodes
        .iter()
        .filter(|node| node.is_data_node())
        .filter(|node| filters.permit_masters || !node.is_master())
        .filter(|node| !filters.exclude_nodes.contains(&node.name))
        .max_by_key(|node| node.available_bytes)
        .ok_or_else(|| Error::Precondition("no eligible shrink node".to_string()))?;
    if candidate.available_bytes < required_bytes {
        return Err(Error::Precondition(format!(
            "node {} has {} bytes free but the shrink needs {}",
            candidate.name, candidate.available_bytes, required_bytes
        )));
    }
    Ok(candidate)
}

pub async fn run(
    options: &ShrinkOptions,
    filters: &[FilterSpec],
    ctx: &ActionContext<'_>,
) -> Result<ActionOutcome> {
    let list = build_index_list(ctx, &options.common, filters).await?;
    if let Some(outcome) = check_empty(&list, &options.common, "shrink")? {
        return Ok(outcome);
    }

    if ctx.dry_run {
        for index in &list {
            info!(
                "DRY-RUN: would shrink {} into {} ({} shards)",
                index.name,
                options.target_name(&index.name),
                options.number_of_shards
            );
        }
        return Ok(ActionOutcome::DryRun {
            affected: list.len(),
        });
    }

    let mut affected = 0;
    for index in &list {
        shrink_one(options, ctx, index).await?;
        affected += 1;
    }
    Ok(ActionOutcome::Completed { affected })
}

async fn shrink_one(
    options: &ShrinkOptions,
    ctx: &ActionContext<'_>,
    index: &IndexInfo,
) -> Result<()> {
    let source = &index.name;
    let target = options.target_name(source);

    if ctx.client.index_exists(&target).await? {
        return Err(Error::Precondition(format!(
            "shrink target {} already exists",
            target
        )));
    }
    if !shard_factor_ok(index.number_of_shards, options.number_of_shards) {
        return Err(Error::Precondition(format!(
            "cannot shrink {} from {} shards to {}",
            source, index.number_of_shards, options.number_of_shards
        )));
    }

    let node = if options.shrink_node == DETERMINISTIC {
        let nodes = ctx.client.node_fs_stats().await?;
        select_node(&nodes, &options.node_filters, index.size_bytes * 2)?
            .name
            .clone()
    } else {
        options.shrink_node.clone()
    };
    debug!(source = %source, node = %node, "selected shrink node");

    // The cluster must be green before shards start moving.
    waiter::wait_for("shrink: cluster health", &options.wait, || {
        let client = ctx.client.clone();
        async move { Ok(client.cluster_health(None).await?.is_green()) }
    })
    .await?;

    // Mark read-only and collect one copy of every shard on the node.
    let prepare = json!({
        "index.blocks.write": true,
        "index.routing.allocation.require._name": node,
    });
    ctx.client
        .put_index_settings(
            std::slice::from_ref(source),
            &prepare,
            false,
            false,
            options.common.timeout_override,
        )
        .await?;

    let source_owned = source.clone();
    waiter::wait_for("shrink: shard relocation", &options.wait, || {
        let client = ctx.client.clone();
        let source = source_owned.clone();
        async move {
            let health = client.cluster_health(Some(&source)).await?;
            Ok(health.relocation_done() && health.is_green())
        }
    })
    .await?;

    // Build the target. Allocation requirements must not follow the source
    // settings into the new index.
    let mut settings = json!({
        "index.number_of_shards": options.number_of_shards,
        "index.blocks.write": Value::Null,
        "index.routing.allocation.require._name": Value::Null,
    });
    if let Some(extra) = options.extra_settings.as_ref().and_then(Value::as_object) {
        for (key, value) in extra {
            settings[key] = value.clone();
        }
    }
    let mut body = json!({ "settings": settings });
    if options.copy_aliases && !index.aliases.is_empty() {
        let mut aliases = serde_json::Map::new();
        for alias in &index.aliases {
            aliases.insert(alias.clone(), json!({}));
        }
        body["aliases"] = Value::Object(aliases);
    }
    ctx.client
        .shrink(source, &target, &body, options.common.timeout_override)
        .await?;
    info!(source = %source, target = %target, "shrink submitted");

    let target_owned = target.clone();
    waiter::wait_for("shrink: target health", &options.wait, || {
        let client = ctx.client.clone();
        let target = target_owned.clone();
        async move {
            let health = client.cluster_health(Some(&target)).await?;
            Ok(health.is_green())
        }
    })
    .await?;

    if let Some(post) = &options.post_allocation {
        let mut allocation = serde_json::Map::new();
        allocation.insert(
            format!(
                "index.routing.allocation.{}.{}",
                post.allocation_type, post.key
            ),
            json!(post.value),
        );
        ctx.client
            .put_index_settings(
                std::slice::from_ref(&target),
                &Value::Object(allocation),
                false,
                false,
                options.common.timeout_override,
            )
            .await?;
    }

    if options.delete_after {
        ctx.client
            .delete_indices(std::slice::from_ref(source), options.common.timeout_override)
            .await?;
        info!(source = %source, "deleted shrunk source index");
    } else {
        // Lift the write block and the allocation pin.
        let reset = json!({
            "index.blocks.write": Value::Null,
            "index.routing.allocation.require._name": Value::Null,
        });
        ctx.client
            .put_index_settings(
                std::slice::from_ref(source),
                &reset,
                false,
                false,
                options.common.timeout_override,
            )
            .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shard_factor() {
        assert!(shard_factor_ok(4, 2));
        assert!(shard_factor_ok(6, 3));
        assert!(shard_factor_ok(8, 1));
        assert!(!shard_factor_ok(4, 3));
        assert!(!shard_factor_ok(2, 2));
        assert!(!shard_factor_ok(1, 1));
        assert!(!shard_factor_ok(4, 0));
    }

    fn node(name: &str, roles: &[&str], available: u64) -> NodeInfo {
        NodeInfo {
            id: name.to_string(),
            name: name.to_string(),
            roles: roles.iter().map(|r| r.to_string()).collect(),
            available_bytes: available,
        }
    }

    #[test]
    fn test_select_node_most_free_space() {
        let nodes = vec![
            node("small", &["data"], 100),
            node("big", &["data"], 1000),
            node("master", &["master"], 5000),
        ];
        let chosen = select_node(&nodes, &NodeFilters::default(), 50).unwrap();
        assert_eq!(chosen.name, "big");
    }

    #[test]
    fn test_select_node_excludes_masters_by_default() {
        let nodes = vec![
            node("data1", &["data"], 100),
            node("master-data", &["master", "data"], 1000),
        ];
        let chosen = select_node(&nodes, &NodeFilters::default(), 50).unwrap();
        assert_eq!(chosen.name, "data1");

        let permissive = NodeFilters {
            permit_masters: true,
            exclude_nodes: vec![],
        };
        let chosen = select_node(&nodes, &permissive, 50).unwrap();
        assert_eq!(chosen.name, "master-data");
    }

    #[test]
    fn test_select_node_space_requirement() {
        let nodes = vec![node("data1", &["data"], 100)];
        assert!(select_node(&nodes, &NodeFilters::default(), 200).is_err());
    }

    #[test]
    fn test_select_node_exclusions() {
        let nodes = vec![
            node("a", &["data"], 1000),
            node("b", &["data"], 500),
        ];
        let filters = NodeFilters {
            permit_masters: false,
            exclude_nodes: vec!["a".to_string()],
        };
        assert_eq!(select_node(&nodes, &filters, 50).unwrap().name, "b");
    }

    #[test]
    fn test_target_name() {
        let options: ShrinkOptions = serde_yaml::from_str("{}").unwrap();
        assert_eq!(options.target_name("logs-1"), "logs-1-shrink");
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_identity_name() {
        let options: ShrinkOptions =
            serde_yaml::from_str("shrink_suffix: ''\n").unwrap();
        assert!(options.validate().is_err());
    }
}
