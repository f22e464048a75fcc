//! The delete_indices action.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::actions::{
    build_index_list, check_empty, log_dry_run, ActionContext, ActionOutcome, CommonOptions,
};
use crate::error::{Error, Result};
use crate::filter::FilterSpec;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeleteIndicesOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
}

pub async fn run(
    options: &DeleteIndicesOptions,
    filters: &[FilterSpec],
    ctx: &ActionContext<'_>,
) -> Result<ActionOutcome> {
    let list = build_index_list(ctx, &options.common, filters).await?;
    if let Some(outcome) = check_empty(&list, &options.common, "delete_indices")? {
        return Ok(outcome);
    }

    // Deleting the write index would break its data stream.
    if let Some(write_index) = list.iter().find(|index| index.is_write_index) {
        return Err(Error::Precondition(format!(
            "{} is the write index of data stream {}; refusing to delete",
            write_index.name,
            write_index.data_stream.as_deref().unwrap_or("<unknown>")
        )));
    }

    let names: Vec<String> = list.iter().map(|index| index.name.clone()).collect();
    if ctx.dry_run {
        return Ok(log_dry_run("delete_indices", "delete index", &names));
    }

    ctx.client
        .delete_indices(&names, options.common.timeout_override)
        .await?;
    info!(count = names.len(), "deleted indices");
    Ok(ActionOutcome::Completed {
        affected: names.len(),
    })
}
