//! The cold2frozen action.
//!
//! Migrates a non-ILM mounted cold-tier searchable snapshot to the frozen
//! tier (shared-cache mount), carrying its aliases over. ILM-managed
//! indices are refused outright: ILM owns their tier transitions, and
//! mounting behind its back corrupts its bookkeeping.

use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use curator_client::IndexInfo;

use crate::actions::{
    build_index_list, check_empty, ActionContext, ActionOutcome, CommonOptions,
};
use crate::error::{Error, Result};
use crate::filter::FilterSpec;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cold2FrozenOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
}

/// Preflight one index: mounted cold searchable snapshot, not ILM-managed.
pub fn check_eligible(index: &IndexInfo) -> Result<()> {
    if index.ilm_policy.is_some() {
        return Err(Error::Precondition(format!(
            "{} is ILM-managed; cold2frozen refuses ILM indices",
            index.name
        )));
    }
    let Some(snapshot) = &index.store_snapshot else {
        return Err(Error::Precondition(format!(
            "{} is not a mounted searchable snapshot",
            index.name
        )));
    };
    if snapshot.partial {
        return Err(Error::Precondition(format!(
            "{} is already a frozen-tier (partial) mount",
            index.name
        )));
    }
    Ok(())
}

pub async fn run(
    options: &Cold2FrozenOptions,
    filters: &[FilterSpec],
    ctx: &ActionContext<'_>,
) -> Result<ActionOutcome> {
    let list = build_index_list(ctx, &options.common, filters).await?;
    if let Some(outcome) = check_empty(&list, &options.common, "cold2frozen")? {
        return Ok(outcome);
    }

    for index in &list {
        check_eligible(index)?;
    }

    if ctx.dry_run {
        for index in &list {
            info!("DRY-RUN: would remount {} on the frozen tier", index.name);
        }
        return Ok(ActionOutcome::DryRun {
            affected: list.len(),
        });
    }

    for index in &list {
        // check_eligible verified presence above.
        let Some(snapshot) = &index.store_snapshot else {
            continue;
        };
        let original = snapshot.index_name.as_deref().unwrap_or(&index.name);

        let mounted = ctx
            .client
            .mount_searchable_snapshot(
                &snapshot.repository,
                &snapshot.snapshot,
                original,
                None,
                true,
            )
            .await?;
        info!(cold = %index.name, frozen = %mounted, "mounted on frozen tier");

        ctx.client
            .delete_indices(
                std::slice::from_ref(&index.name),
                options.common.timeout_override,
            )
            .await?;

        if !index.aliases.is_empty() {
            let actions = index
                .aliases
                .iter()
                .map(|alias| json!({ "add": { "index": mounted, "alias": alias } }))
                .collect();
            ctx.client.update_aliases(actions).await?;
        }
    }
    Ok(ActionOutcome::Completed {
        affected: list.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use curator_client::{IndexState, StoreSnapshot};
    use std::collections::{BTreeMap, BTreeSet};

    fn mounted(name: &str, partial: bool, ilm: Option<&str>) -> IndexInfo {
        IndexInfo {
            name: name.to_string(),
            state: IndexState::Open,
            creation_date_ms: 0,
            docs_count: 0,
            size_bytes: 0,
            aliases: BTreeSet::new(),
            routing_allocation: BTreeMap::new(),
            hidden: false,
            ilm_policy: ilm.map(str::to_string),
            number_of_shards: 1,
            data_stream: None,
            is_write_index: false,
            store_snapshot: Some(StoreSnapshot {
                repository: "repo".to_string(),
                snapshot: "snap".to_string(),
                index_name: Some(name.trim_start_matches("restored-").to_string()),
                partial,
            }),
            segment_count: None,
        }
    }

    #[test]
    fn test_eligibility() {
        assert!(check_eligible(&mounted("restored-logs", false, None)).is_ok());
        // Already frozen.
        assert!(check_eligible(&mounted("partial-logs", true, None)).is_err());
        // ILM-managed, always refused.
        assert!(check_eligible(&mounted("restored-logs", false, Some("policy"))).is_err());
    }

    #[test]
    fn test_plain_index_rejected() {
        let mut index = mounted("plain", false, None);
        index.store_snapshot = None;
        assert!(check_eligible(&index).is_err());
    }
}
