//! The action engine.
//!
//! Every action shares one contract: validate options before any cluster
//! call, materialize the actionable set through the filter engine, honor the
//! dry-run surface, and classify failures so the orchestrator can apply the
//! `continue_if_exception` / `ignore_empty_list` policy.

pub mod alias;
pub mod allocation;
pub mod cold2frozen;
pub mod create_index;
pub mod delete;
pub mod forcemerge;
pub mod index_settings;
pub mod open_close;
pub mod reindex;
pub mod rollover;
pub mod shrink;
pub mod snapshot;
pub mod waiter;

use serde::{Deserialize, Serialize};
use tracing::info;

use curator_client::{EsClient, IndexInfo, SnapshotInfo};

use crate::error::{Error, Result};
use crate::filter::{apply_to_indices, apply_to_snapshots, FilterSpec};

pub use waiter::WaitOptions;

/// Options every action accepts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommonOptions {
    /// Per-action override of the cluster request timeout, seconds
    #[serde(default)]
    pub timeout_override: Option<u64>,
    /// Swallow non-empty-list errors and continue with the next action
    #[serde(default)]
    pub continue_if_exception: bool,
    /// Skip this action entirely
    #[serde(default)]
    pub disable_action: bool,
    /// Treat an empty actionable list as success
    #[serde(default)]
    pub ignore_empty_list: bool,
    /// Allow ILM-managed indices into the actionable set
    #[serde(default)]
    pub allow_ilm_indices: bool,
    /// Allow hidden and data-stream backing indices into the actionable set
    #[serde(default)]
    pub include_hidden: bool,
}

/// What an action did (or would do).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed { affected: usize },
    DryRun { affected: usize },
    Skipped { reason: String },
}

/// Execution context handed to every action.
pub struct ActionContext<'a> {
    pub client: &'a EsClient,
    pub dry_run: bool,
    pub now_epoch: i64,
}

/// One numbered action from an action file. The `action` tag selects the
/// variant; `options` carry the flattened common options.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ActionSpec {
    DeleteIndices {
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        options: delete::DeleteIndicesOptions,
        #[serde(default)]
        filters: Vec<FilterSpec>,
    },
    Close {
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        options: open_close::CloseOptions,
        #[serde(default)]
        filters: Vec<FilterSpec>,
    },
    Open {
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        options: open_close::OpenOptions,
        #[serde(default)]
        filters: Vec<FilterSpec>,
    },
    Forcemerge {
        #[serde(default)]
        description: Option<String>,
        options: forcemerge::ForcemergeOptions,
        #[serde(default)]
        filters: Vec<FilterSpec>,
    },
    Allocation {
        #[serde(default)]
        description: Option<String>,
        options: allocation::AllocationOptions,
        #[serde(default)]
        filters: Vec<FilterSpec>,
    },
    ClusterRouting {
        #[serde(default)]
        description: Option<String>,
        options: allocation::ClusterRoutingOptions,
    },
    Replicas {
        #[serde(default)]
        description: Option<String>,
        options: allocation::ReplicasOptions,
        #[serde(default)]
        filters: Vec<FilterSpec>,
    },
    Rollover {
        #[serde(default)]
        description: Option<String>,
        options: rollover::RolloverOptions,
    },
    Snapshot {
        #[serde(default)]
        description: Option<String>,
        options: snapshot::SnapshotOptions,
        #[serde(default)]
        filters: Vec<FilterSpec>,
    },
    Restore {
        #[serde(default)]
        description: Option<String>,
        options: snapshot::RestoreOptions,
        #[serde(default)]
        filters: Vec<FilterSpec>,
    },
    DeleteSnapshots {
        #[serde(default)]
        description: Option<String>,
        options: snapshot::DeleteSnapshotsOptions,
        #[serde(default)]
        filters: Vec<FilterSpec>,
    },
    Shrink {
        #[serde(default)]
        description: Option<String>,
        options: shrink::ShrinkOptions,
        #[serde(default)]
        filters: Vec<FilterSpec>,
    },
    Reindex {
        #[serde(default)]
        description: Option<String>,
        options: reindex::ReindexOptions,
        #[serde(default)]
        filters: Vec<FilterSpec>,
    },
    Alias {
        #[serde(default)]
        description: Option<String>,
        options: alias::AliasOptions,
        #[serde(default)]
        add: Option<alias::AliasSide>,
        #[serde(default)]
        remove: Option<alias::AliasSide>,
    },
    CreateIndex {
        #[serde(default)]
        description: Option<String>,
        options: create_index::CreateIndexOptions,
    },
    IndexSettings {
        #[serde(default)]
        description: Option<String>,
        options: index_settings::IndexSettingsOptions,
        #[serde(default)]
        filters: Vec<FilterSpec>,
    },
    Cold2frozen {
        #[serde(default)]
        description: Option<String>,
        #[serde(default)]
        options: cold2frozen::Cold2FrozenOptions,
        #[serde(default)]
        filters: Vec<FilterSpec>,
    },
}

impl ActionSpec {
    pub fn name(&self) -> &'static str {
        match self {
            ActionSpec::DeleteIndices { .. } => "delete_indices",
            ActionSpec::Close { .. } => "close",
            ActionSpec::Open { .. } => "open",
            ActionSpec::Forcemerge { .. } => "forcemerge",
            ActionSpec::Allocation { .. } => "allocation",
            ActionSpec::ClusterRouting { .. } => "cluster_routing",
            ActionSpec::Replicas { .. } => "replicas",
            ActionSpec::Rollover { .. } => "rollover",
            ActionSpec::Snapshot { .. } => "snapshot",
            ActionSpec::Restore { .. } => "restore",
            ActionSpec::DeleteSnapshots { .. } => "delete_snapshots",
            ActionSpec::Shrink { .. } => "shrink",
            ActionSpec::Reindex { .. } => "reindex",
            ActionSpec::Alias { .. } => "alias",
            ActionSpec::CreateIndex { .. } => "create_index",
            ActionSpec::IndexSettings { .. } => "index_settings",
            ActionSpec::Cold2frozen { .. } => "cold2frozen",
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            ActionSpec::DeleteIndices { description, .. }
            | ActionSpec::Close { description, .. }
            | ActionSpec::Open { description, .. }
            | ActionSpec::Forcemerge { description, .. }
            | ActionSpec::Allocation { description, .. }
            | ActionSpec::ClusterRouting { description, .. }
            | ActionSpec::Replicas { description, .. }
            | ActionSpec::Rollover { description, .. }
            | ActionSpec::Snapshot { description, .. }
            | ActionSpec::Restore { description, .. }
            | ActionSpec::DeleteSnapshots { description, .. }
            | ActionSpec::Shrink { description, .. }
            | ActionSpec::Reindex { description, .. }
            | ActionSpec::Alias { description, .. }
            | ActionSpec::CreateIndex { description, .. }
            | ActionSpec::IndexSettings { description, .. }
            | ActionSpec::Cold2frozen { description, .. } => description.as_deref(),
        }
    }

    pub fn common(&self) -> &CommonOptions {
        match self {
            ActionSpec::DeleteIndices { options, .. } => &options.common,
            ActionSpec::Close { options, .. } => &options.common,
            ActionSpec::Open { options, .. } => &options.common,
            ActionSpec::Forcemerge { options, .. } => &options.common,
            ActionSpec::Allocation { options, .. } => &options.common,
            ActionSpec::ClusterRouting { options, .. } => &options.common,
            ActionSpec::Replicas { options, .. } => &options.common,
            ActionSpec::Rollover { options, .. } => &options.common,
            ActionSpec::Snapshot { options, .. } => &options.common,
            ActionSpec::Restore { options, .. } => &options.common,
            ActionSpec::DeleteSnapshots { options, .. } => &options.common,
            ActionSpec::Shrink { options, .. } => &options.common,
            ActionSpec::Reindex { options, .. } => &options.common,
            ActionSpec::Alias { options, .. } => &options.common,
            ActionSpec::CreateIndex { options, .. } => &options.common,
            ActionSpec::IndexSettings { options, .. } => &options.common,
            ActionSpec::Cold2frozen { options, .. } => &options.common,
        }
    }

    /// Schema-level validation, before any cluster call.
    pub fn validate(&self) -> Result<()> {
        match self {
            ActionSpec::Forcemerge { options, .. } => options.validate(),
            ActionSpec::Allocation { options, .. } => options.validate(),
            ActionSpec::ClusterRouting { options, .. } => options.validate(),
            ActionSpec::Replicas { options, .. } => options.validate(),
            ActionSpec::Rollover { options, .. } => options.validate(),
            ActionSpec::Snapshot { options, .. } => options.validate(),
            ActionSpec::Restore { options, .. } => options.validate(),
            ActionSpec::DeleteSnapshots { options, .. } => options.validate(),
            ActionSpec::Shrink { options, .. } => options.validate(),
            ActionSpec::Reindex { options, .. } => options.validate(),
            ActionSpec::Alias {
                options, add, remove, ..
            } => options.validate(add, remove),
            ActionSpec::CreateIndex { options, .. } => options.validate(),
            ActionSpec::IndexSettings { options, .. } => options.validate(),
            _ => Ok(()),
        }
    }

    /// Build and execute (or dry-run) this action.
    pub async fn run(&self, ctx: &ActionContext<'_>) -> Result<ActionOutcome> {
        self.validate()?;
        match self {
            ActionSpec::DeleteIndices { options, filters, .. } => {
                delete::run(options, filters, ctx).await
            }
            ActionSpec::Close { options, filters, .. } => {
                open_close::run_close(options, filters, ctx).await
            }
            ActionSpec::Open { options, filters, .. } => {
                open_close::run_open(options, filters, ctx).await
            }
            ActionSpec::Forcemerge { options, filters, .. } => {
                forcemerge::run(options, filters, ctx).await
            }
            ActionSpec::Allocation { options, filters, .. } => {
                allocation::run_allocation(options, filters, ctx).await
            }
            ActionSpec::ClusterRouting { options, .. } => {
                allocation::run_cluster_routing(options, ctx).await
            }
            ActionSpec::Replicas { options, filters, .. } => {
                allocation::run_replicas(options, filters, ctx).await
            }
            ActionSpec::Rollover { options, .. } => rollover::run(options, ctx).await,
            ActionSpec::Snapshot { options, filters, .. } => {
                snapshot::run_snapshot(options, filters, ctx).await
            }
            ActionSpec::Restore { options, filters, .. } => {
                snapshot::run_restore(options, filters, ctx).await
            }
            ActionSpec::DeleteSnapshots { options, filters, .. } => {
                snapshot::run_delete_snapshots(options, filters, ctx).await
            }
            ActionSpec::Shrink { options, filters, .. } => {
                shrink::run(options, filters, ctx).await
            }
            ActionSpec::Reindex { options, filters, .. } => {
                reindex::run(options, filters, ctx).await
            }
            ActionSpec::Alias { options, add, remove, .. } => {
                alias::run(options, add.as_ref(), remove.as_ref(), ctx).await
            }
            ActionSpec::CreateIndex { options, .. } => create_index::run(options, ctx).await,
            ActionSpec::IndexSettings { options, filters, .. } => {
                index_settings::run(options, filters, ctx).await
            }
            ActionSpec::Cold2frozen { options, filters, .. } => {
                cold2frozen::run(options, filters, ctx).await
            }
        }
    }
}

/// Materialize the actionable index set: inventory, ILM/hidden pre-filters,
/// then the user chain.
pub async fn build_index_list(
    ctx: &ActionContext<'_>,
    common: &CommonOptions,
    chain: &[FilterSpec],
) -> Result<Vec<IndexInfo>> {
    let mut list = ctx.client.inventory().await?;

    if !common.include_hidden {
        list.retain(|index| !index.hidden && index.data_stream.is_none());
    }
    if !common.allow_ilm_indices {
        list.retain(|index| index.ilm_policy.is_none());
    }

    if chain.iter().any(FilterSpec::needs_segment_counts) {
        load_segment_counts(ctx.client, &mut list).await?;
    }

    apply_to_indices(list, chain, ctx.client, ctx.now_epoch).await
}

/// Materialize the actionable snapshot set for a repository.
pub async fn build_snapshot_list(
    ctx: &ActionContext<'_>,
    repository: &str,
    chain: &[FilterSpec],
) -> Result<Vec<SnapshotInfo>> {
    let list = ctx.client.get_snapshots(repository).await?;
    apply_to_snapshots(list, chain, ctx.now_epoch)
}

/// Populate `segment_count` on every open index in the list.
pub async fn load_segment_counts(client: &EsClient, list: &mut [IndexInfo]) -> Result<()> {
    let open_names: Vec<String> = list
        .iter()
        .filter(|index| index.is_open())
        .map(|index| index.name.clone())
        .collect();
    if open_names.is_empty() {
        return Ok(());
    }
    let counts = client.segment_counts(&open_names).await?;
    for index in list {
        if let Some(count) = counts.get(&index.name) {
            index.segment_count = Some(*count);
        }
    }
    Ok(())
}

/// Empty-list policy: `Ok(None)` means proceed, `Ok(Some(outcome))` means
/// the action is done (ignored empty list), `Err` surfaces the condition.
pub fn check_empty<T>(
    list: &[T],
    common: &CommonOptions,
    action: &str,
) -> Result<Option<ActionOutcome>> {
    if !list.is_empty() {
        return Ok(None);
    }
    if common.ignore_empty_list {
        info!(action, "no entities matched the filters; ignoring per ignore_empty_list");
        return Ok(Some(ActionOutcome::Skipped {
            reason: "empty actionable list".to_string(),
        }));
    }
    Err(Error::EmptyList(format!(
        "no entities matched the filters for action {}",
        action
    )))
}

/// Dry-run helper: log what would happen to each entity.
pub fn log_dry_run(action: &str, verb: &str, names: &[String]) -> ActionOutcome {
    for name in names {
        info!(action, "DRY-RUN: would {} {}", verb, name);
    }
    ActionOutcome::DryRun {
        affected: names.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_spec_yaml_parsing() {
        let yaml = r#"
action: delete_indices
description: prune old logs
options:
  ignore_empty_list: true
  timeout_override: 300
filters:
  - filtertype: pattern
    kind: prefix
    value: logstash-
"#;
        let spec: ActionSpec = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(spec.name(), "delete_indices");
        assert_eq!(spec.description(), Some("prune old logs"));
        assert!(spec.common().ignore_empty_list);
        assert_eq!(spec.common().timeout_override, Some(300));
        assert!(!spec.common().continue_if_exception);
    }

    #[test]
    fn test_unknown_action_rejected() {
        let yaml = "action: explode\noptions: {}\n";
        assert!(serde_yaml::from_str::<ActionSpec>(yaml).is_err());
    }

    #[test]
    fn test_check_empty_policies() {
        let ignore = CommonOptions {
            ignore_empty_list: true,
            ..Default::default()
        };
        let strict = CommonOptions::default();
        let empty: Vec<String> = Vec::new();
        let full = vec!["x".to_string()];

        assert!(check_empty(&full, &strict, "a").unwrap().is_none());
        assert!(matches!(
            check_empty(&empty, &ignore, "a").unwrap(),
            Some(ActionOutcome::Skipped { .. })
        ));
        assert!(check_empty(&empty, &strict, "a").unwrap_err().is_empty_list());
    }
}
