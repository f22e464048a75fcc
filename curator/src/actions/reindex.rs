//! The reindex action.
//!
//! Mostly a passthrough of the reindex API `request_body`, with three lifts:
//! `source.index: REINDEX_SELECTION` substitutes the filter-derived index
//! list (local or remote), `dest.index: MIGRATION` fans out one reindex per
//! source index with `migration_prefix`/`migration_suffix`, and execution
//! goes through the task API so `wait_interval`/`max_wait` behave like every
//! other action.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use curator_client::{ConnectionConfig, EsClient};

use crate::actions::waiter::{self, WaitOptions};
use crate::actions::{
    build_index_list, check_empty, ActionContext, ActionOutcome, CommonOptions,
};
use crate::error::{Error, Result};
use crate::filter::{apply_to_indices, FilterSpec, NoFieldStats};

/// Sentinel for the filter-derived source list.
pub const REINDEX_SELECTION: &str = "REINDEX_SELECTION";
/// Sentinel for one-reindex-per-source migration.
pub const MIGRATION: &str = "MIGRATION";

const MAX_SLICES: u32 = 500;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReindexOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    pub request_body: Value,
    #[serde(default)]
    pub slices: Option<u32>,
    #[serde(default)]
    pub requests_per_second: Option<f64>,
    #[serde(default)]
    pub migration_prefix: String,
    #[serde(default)]
    pub migration_suffix: String,
    /// Filters evaluated against the remote cluster when the request body
    /// carries `source.remote`
    #[serde(default)]
    pub remote_filters: Vec<FilterSpec>,
    #[serde(flatten)]
    pub wait: WaitOptions,
}

impl ReindexOptions {
    pub fn validate(&self) -> Result<()> {
        if self.request_body.pointer("/source").is_none()
            || self.request_body.pointer("/dest").is_none()
        {
            return Err(Error::Config(
                "reindex request_body requires source and dest".to_string(),
            ));
        }
        if let Some(slices) = self.slices {
            if slices == 0 || slices > MAX_SLICES {
                return Err(Error::Config(format!(
                    "slices must be between 1 and {}, got {}",
                    MAX_SLICES, slices
                )));
            }
        }
        if self.dest_index()? == MIGRATION
            && self.migration_prefix.is_empty()
            && self.migration_suffix.is_empty()
        {
            return Err(Error::Config(
                "MIGRATION requires migration_prefix or migration_suffix".to_string(),
            ));
        }
        Ok(())
    }

    fn dest_index(&self) -> Result<&str> {
        self.request_body
            .pointer("/dest/index")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::Config("request_body dest.index is required".to_string()))
    }

    fn source_index(&self) -> Result<Vec<String>> {
        match self.request_body.pointer("/source/index") {
            Some(Value::String(s)) => Ok(vec![s.clone()]),
            Some(Value::Array(arr)) => Ok(arr
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()),
            _ => Err(Error::Config(
                "request_body source.index is required".to_string(),
            )),
        }
    }

    fn is_remote(&self) -> bool {
        self.request_body.pointer("/source/remote/host").is_some()
    }
}

/// Build a client for the remote cluster named in `source.remote`.
fn remote_client(request_body: &Value) -> Result<EsClient> {
    let host = request_body
        .pointer("/source/remote/host")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Config("source.remote.host is required".to_string()))?;
    let config = ConnectionConfig {
        hosts: vec![host.to_string()],
        username: request_body
            .pointer("/source/remote/username")
            .and_then(Value::as_str)
            .map(str::to_string),
        password: request_body
            .pointer("/source/remote/password")
            .and_then(Value::as_str)
            .map(str::to_string),
        ..Default::default()
    };
    Ok(EsClient::new(&config)?)
}

pub async fn run(
    options: &ReindexOptions,
    filters: &[FilterSpec],
    ctx: &ActionContext<'_>,
) -> Result<ActionOutcome> {
    // Resolve the source list.
    let configured = options.source_index()?;
    let sources: Vec<String> = if configured == [REINDEX_SELECTION.to_string()] {
        if options.is_remote() {
            let remote = remote_client(&options.request_body)?;
            let inventory = remote.inventory().await?;
            let filtered = apply_to_indices(
                inventory,
                &options.remote_filters,
                &NoFieldStats,
                ctx.now_epoch,
            )
            .await?;
            filtered.into_iter().map(|index| index.name).collect()
        } else {
            let list = build_index_list(ctx, &options.common, filters).await?;
            list.into_iter().map(|index| index.name).collect()
        }
    } else {
        configured
    };
    if let Some(outcome) = check_empty(&sources, &options.common, "reindex")? {
        return Ok(outcome);
    }

    let dest = options.dest_index()?.to_string();

    // MIGRATION fans out one reindex per source; anything else is a single
    // request with the resolved source list.
    let requests: Vec<(Vec<String>, String)> = if dest == MIGRATION {
        sources
            .iter()
            .map(|source| {
                (
                    vec![source.clone()],
                    format!(
                        "{}{}{}",
                        options.migration_prefix, source, options.migration_suffix
                    ),
                )
            })
            .collect()
    } else {
        vec![(sources.clone(), dest)]
    };

    if ctx.dry_run {
        for (from, to) in &requests {
            info!("DRY-RUN: would reindex {} into {}", from.join(","), to);
        }
        return Ok(ActionOutcome::DryRun {
            affected: sources.len(),
        });
    }

    for (from, to) in &requests {
        let mut body = options.request_body.clone();
        body["source"]["index"] = Value::Array(
            from.iter().map(|name| Value::String(name.clone())).collect(),
        );
        body["dest"]["index"] = Value::String(to.clone());

        let task = ctx
            .client
            .start_reindex(
                &body,
                options.slices,
                options.requests_per_second,
                options.common.timeout_override,
            )
            .await?;
        info!(task = %task, dest = %to, "reindex submitted");

        if options.wait.waits(true) {
            waiter::wait_for("reindex", &options.wait, || {
                let client = ctx.client.clone();
                let task = task.clone();
                async move {
                    let status = client.task_status(&task).await?;
                    if status.completed && !status.failures.is_empty() {
                        return Err(Error::Cluster(curator_client::EsError::Api {
                            status: 500,
                            reason: format!(
                                "reindex task {} failed: {}",
                                task,
                                status.failures.join("; ")
                            ),
                        }));
                    }
                    Ok(status.completed)
                }
            })
            .await?;
        }
    }
    Ok(ActionOutcome::Completed {
        affected: sources.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn options(body: Value) -> ReindexOptions {
        ReindexOptions {
            common: CommonOptions::default(),
            request_body: body,
            slices: None,
            requests_per_second: None,
            migration_prefix: String::new(),
            migration_suffix: String::new(),
            remote_filters: vec![],
            wait: WaitOptions::default(),
        }
    }

    #[test]
    fn test_validate_requires_source_and_dest() {
        assert!(options(json!({ "source": { "index": "a" } })).validate().is_err());
        assert!(options(json!({
            "source": { "index": "a" },
            "dest": { "index": "b" }
        }))
        .validate()
        .is_ok());
    }

    #[test]
    fn test_slices_cap() {
        let mut o = options(json!({
            "source": { "index": "a" },
            "dest": { "index": "b" }
        }));
        o.slices = Some(500);
        assert!(o.validate().is_ok());
        o.slices = Some(501);
        assert!(o.validate().is_err());
        o.slices = Some(0);
        assert!(o.validate().is_err());
    }

    #[test]
    fn test_migration_requires_affix() {
        let mut o = options(json!({
            "source": { "index": REINDEX_SELECTION },
            "dest": { "index": MIGRATION }
        }));
        assert!(o.validate().is_err());
        o.migration_suffix = "-v2".to_string();
        assert!(o.validate().is_ok());
    }

    #[test]
    fn test_source_index_shapes() {
        let single = options(json!({
            "source": { "index": "one" },
            "dest": { "index": "d" }
        }));
        assert_eq!(single.source_index().unwrap(), vec!["one"]);

        let multi = options(json!({
            "source": { "index": ["a", "b"] },
            "dest": { "index": "d" }
        }));
        assert_eq!(multi.source_index().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn test_remote_detection() {
        let remote = options(json!({
            "source": {
                "index": REINDEX_SELECTION,
                "remote": { "host": "http://othercluster:9200" }
            },
            "dest": { "index": "d" }
        }));
        assert!(remote.is_remote());
    }
}
