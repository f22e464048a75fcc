//! The forcemerge action.
//!
//! Merges each actionable index down to `max_num_segments`, skipping
//! indices that are already merged that far, with an optional delay between
//! indices to spread out the I/O load. Indices receiving writes must not be
//! forcemerged; keeping them out of the filter chain is caller discipline.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::actions::{
    build_index_list, check_empty, load_segment_counts, log_dry_run, ActionContext,
    ActionOutcome, CommonOptions,
};
use crate::error::{Error, Result};
use crate::filter::FilterSpec;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForcemergeOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    pub max_num_segments: u32,
    /// Seconds to pause between successive indices
    #[serde(default)]
    pub delay: u64,
}

impl ForcemergeOptions {
    pub fn validate(&self) -> Result<()> {
        if self.max_num_segments == 0 {
            return Err(Error::Config(
                "max_num_segments must be at least 1".to_string(),
            ));
        }
        if self.delay > 3600 {
            return Err(Error::Config(format!(
                "delay must be at most 3600 seconds, got {}",
                self.delay
            )));
        }
        Ok(())
    }
}

pub async fn run(
    options: &ForcemergeOptions,
    filters: &[FilterSpec],
    ctx: &ActionContext<'_>,
) -> Result<ActionOutcome> {
    let mut list = build_index_list(ctx, &options.common, filters).await?;
    if let Some(outcome) = check_empty(&list, &options.common, "forcemerge")? {
        return Ok(outcome);
    }

    // Closed indices cannot be merged, and indices already at or below the
    // segment target are skipped.
    list.retain(|index| index.is_open());
    load_segment_counts(ctx.client, &mut list).await?;
    list.retain(|index| match index.segments_per_shard() {
        Some(per_shard) if per_shard <= u64::from(options.max_num_segments) => {
            debug!(index = %index.name, per_shard, "already forcemerged; skipping");
            false
        }
        _ => true,
    });

    let names: Vec<String> = list.iter().map(|index| index.name.clone()).collect();
    if ctx.dry_run {
        return Ok(log_dry_run("forcemerge", "forcemerge index", &names));
    }

    let total = names.len();
    for (position, name) in names.iter().enumerate() {
        info!(index = %name, max_num_segments = options.max_num_segments, "forcemerging");
        ctx.client
            .forcemerge(name, options.max_num_segments, options.common.timeout_override)
            .await?;
        if options.delay > 0 && position + 1 < total {
            tokio::time::sleep(Duration::from_secs(options.delay)).await;
        }
    }
    Ok(ActionOutcome::Completed { affected: total })
}
