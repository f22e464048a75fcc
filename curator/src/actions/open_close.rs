//! The open and close actions.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::actions::{
    build_index_list, check_empty, log_dry_run, ActionContext, ActionOutcome, CommonOptions,
};
use crate::error::Result;
use crate::filter::FilterSpec;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CloseOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    /// Skip the flush that normally precedes a close
    #[serde(default)]
    pub skip_flush: bool,
    /// Strip all aliases before closing
    #[serde(default)]
    pub delete_aliases: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpenOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
}

pub async fn run_close(
    options: &CloseOptions,
    filters: &[FilterSpec],
    ctx: &ActionContext<'_>,
) -> Result<ActionOutcome> {
    let list = build_index_list(ctx, &options.common, filters).await?;
    if let Some(outcome) = check_empty(&list, &options.common, "close")? {
        return Ok(outcome);
    }

    // Closing a closed index is a no-op; don't send it to the cluster.
    let names: Vec<String> = list
        .iter()
        .filter(|index| index.is_open())
        .map(|index| index.name.clone())
        .collect();
    if ctx.dry_run {
        return Ok(log_dry_run("close", "close index", &names));
    }
    if names.is_empty() {
        return Ok(ActionOutcome::Completed { affected: 0 });
    }

    if options.delete_aliases {
        ctx.client.delete_all_aliases(&names).await?;
    }
    if !options.skip_flush {
        ctx.client.flush_indices(&names).await?;
    }
    ctx.client
        .close_indices(&names, options.common.timeout_override)
        .await?;
    info!(count = names.len(), "closed indices");
    Ok(ActionOutcome::Completed {
        affected: names.len(),
    })
}

pub async fn run_open(
    options: &OpenOptions,
    filters: &[FilterSpec],
    ctx: &ActionContext<'_>,
) -> Result<ActionOutcome> {
    let list = build_index_list(ctx, &options.common, filters).await?;
    if let Some(outcome) = check_empty(&list, &options.common, "open")? {
        return Ok(outcome);
    }

    let names: Vec<String> = list.iter().map(|index| index.name.clone()).collect();
    if ctx.dry_run {
        return Ok(log_dry_run("open", "open index", &names));
    }

    ctx.client
        .open_indices(&names, options.common.timeout_override)
        .await?;
    info!(count = names.len(), "opened indices");
    Ok(ActionOutcome::Completed {
        affected: names.len(),
    })
}
