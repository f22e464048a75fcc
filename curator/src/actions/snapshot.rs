//! Snapshot actions: snapshot, restore, delete_snapshots.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use curator_client::{SnapshotInfo, SnapshotState};

use crate::actions::waiter::{self, WaitOptions};
use crate::actions::{
    build_index_list, build_snapshot_list, check_empty, log_dry_run, ActionContext,
    ActionOutcome, CommonOptions,
};
use crate::error::{Error, Result};
use crate::filter::timestring::render_timestring;
use crate::filter::FilterSpec;

const DEFAULT_SNAPSHOT_NAME: &str = "curator-%Y%m%d%H%M%S";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    pub repository: String,
    #[serde(default = "default_snapshot_name")]
    pub name: String,
    #[serde(default)]
    pub ignore_unavailable: bool,
    #[serde(default = "default_true")]
    pub include_global_state: bool,
    #[serde(default)]
    pub partial: bool,
    #[serde(default)]
    pub skip_repo_fs_check: bool,
    #[serde(flatten)]
    pub wait: WaitOptions,
}

fn default_snapshot_name() -> String {
    DEFAULT_SNAPSHOT_NAME.to_string()
}

fn default_true() -> bool {
    true
}

impl SnapshotOptions {
    pub fn validate(&self) -> Result<()> {
        if self.repository.is_empty() {
            return Err(Error::Config("snapshot requires a repository".to_string()));
        }
        self.wait.validate()
    }
}

pub async fn run_snapshot(
    options: &SnapshotOptions,
    filters: &[FilterSpec],
    ctx: &ActionContext<'_>,
) -> Result<ActionOutcome> {
    let list = build_index_list(ctx, &options.common, filters).await?;
    if let Some(outcome) = check_empty(&list, &options.common, "snapshot")? {
        return Ok(outcome);
    }

    if !ctx.client.repository_exists(&options.repository).await? {
        return Err(Error::Precondition(format!(
            "repository {} is not registered",
            options.repository
        )));
    }
    if !options.skip_repo_fs_check && !ctx.dry_run {
        ctx.client.verify_repository(&options.repository).await?;
    }

    let now = Utc
        .timestamp_opt(ctx.now_epoch, 0)
        .single()
        .ok_or_else(|| Error::Fatal("invalid context epoch".to_string()))?;
    let snapshot_name = render_timestring(&options.name, now)?;
    let names: Vec<String> = list.iter().map(|index| index.name.clone()).collect();

    if ctx.dry_run {
        info!(
            repository = %options.repository,
            snapshot = %snapshot_name,
            indices = names.len(),
            "DRY-RUN: would create snapshot"
        );
        return Ok(ActionOutcome::DryRun {
            affected: names.len(),
        });
    }

    let body = json!({
        "indices": names.join(","),
        "ignore_unavailable": options.ignore_unavailable,
        "include_global_state": options.include_global_state,
        "partial": options.partial,
    });
    ctx.client
        .create_snapshot(
            &options.repository,
            &snapshot_name,
            &body,
            options.common.timeout_override,
        )
        .await?;
    info!(repository = %options.repository, snapshot = %snapshot_name, "snapshot started");

    if options.wait.waits(true) {
        let allow_partial = options.partial;
        waiter::wait_for("snapshot", &options.wait, || {
            let client = ctx.client.clone();
            let repository = options.repository.clone();
            let snapshot = snapshot_name.clone();
            async move {
                match client.snapshot_state(&repository, &snapshot).await? {
                    SnapshotState::InProgress => Ok(false),
                    SnapshotState::Success => Ok(true),
                    SnapshotState::Partial if allow_partial => Ok(true),
                    state => Err(Error::Cluster(curator_client::EsError::Api {
                        status: 500,
                        reason: format!("snapshot {} finished in state {}", snapshot, state),
                    })),
                }
            }
        })
        .await?;
    }
    Ok(ActionOutcome::Completed {
        affected: names.len(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RestoreOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    pub repository: String,
    /// Restore a specific snapshot; default is the most recent successful
    /// one in the filtered set
    #[serde(default)]
    pub name: Option<String>,
    /// Subset of indices to restore; default is all indices in the snapshot
    #[serde(default)]
    pub indices: Vec<String>,
    #[serde(default)]
    pub rename_pattern: Option<String>,
    #[serde(default)]
    pub rename_replacement: Option<String>,
    #[serde(default)]
    pub include_aliases: bool,
    #[serde(default)]
    pub ignore_unavailable: bool,
    #[serde(default)]
    pub include_global_state: bool,
    #[serde(default)]
    pub extra_settings: Option<Value>,
    #[serde(flatten)]
    pub wait: WaitOptions,
}

impl RestoreOptions {
    pub fn validate(&self) -> Result<()> {
        if self.repository.is_empty() {
            return Err(Error::Config("restore requires a repository".to_string()));
        }
        if self.rename_pattern.is_some() != self.rename_replacement.is_some() {
            return Err(Error::Config(
                "rename_pattern and rename_replacement must be used together".to_string(),
            ));
        }
        if let Some(pattern) = &self.rename_pattern {
            Regex::new(pattern)
                .map_err(|e| Error::Config(format!("invalid rename_pattern: {}", e)))?;
        }
        self.wait.validate()
    }
}

/// Pick the snapshot to restore: the named one, or the most recent
/// successful snapshot in the filtered set.
pub fn select_snapshot<'a>(
    list: &'a [SnapshotInfo],
    name: Option<&str>,
) -> Result<&'a SnapshotInfo> {
    if let Some(name) = name {
        return list
            .iter()
            .find(|snapshot| snapshot.name == name)
            .ok_or_else(|| {
                Error::Precondition(format!("snapshot {} not in the filtered set", name))
            });
    }
    list.iter()
        .filter(|snapshot| snapshot.state == SnapshotState::Success)
        .max_by_key(|snapshot| snapshot.start_time_ms)
        .ok_or_else(|| {
            Error::Precondition("no successful snapshot in the filtered set".to_string())
        })
}

/// Expected post-restore index names, with the rename applied.
pub fn expected_indices(
    snapshot_indices: &[String],
    subset: &[String],
    rename_pattern: Option<&str>,
    rename_replacement: Option<&str>,
) -> Result<Vec<String>> {
    let selected: Vec<&String> = if subset.is_empty() {
        snapshot_indices.iter().collect()
    } else {
        snapshot_indices
            .iter()
            .filter(|name| subset.contains(name))
            .collect()
    };

    match (rename_pattern, rename_replacement) {
        (Some(pattern), Some(replacement)) => {
            let regex = Regex::new(pattern)
                .map_err(|e| Error::Config(format!("invalid rename_pattern: {}", e)))?;
            Ok(selected
                .into_iter()
                .map(|name| regex.replace_all(name, replacement).into_owned())
                .collect())
        }
        _ => Ok(selected.into_iter().cloned().collect()),
    }
}

pub async fn run_restore(
    options: &RestoreOptions,
    filters: &[FilterSpec],
    ctx: &ActionContext<'_>,
) -> Result<ActionOutcome> {
    let list = build_snapshot_list(ctx, &options.repository, filters).await?;
    if let Some(outcome) = check_empty(&list, &options.common, "restore")? {
        return Ok(outcome);
    }

    let snapshot = select_snapshot(&list, options.name.as_deref())?;
    let targets = expected_indices(
        &snapshot.indices,
        &options.indices,
        options.rename_pattern.as_deref(),
        options.rename_replacement.as_deref(),
    )?;

    if ctx.dry_run {
        info!(
            repository = %options.repository,
            snapshot = %snapshot.name,
            "DRY-RUN: would restore {} indices",
            targets.len()
        );
        return Ok(ActionOutcome::DryRun {
            affected: targets.len(),
        });
    }

    let mut body = serde_json::Map::new();
    if !options.indices.is_empty() {
        body.insert("indices".to_string(), json!(options.indices.join(",")));
    }
    if let (Some(pattern), Some(replacement)) = (
        options.rename_pattern.as_deref(),
        options.rename_replacement.as_deref(),
    ) {
        body.insert("rename_pattern".to_string(), json!(pattern));
        body.insert("rename_replacement".to_string(), json!(replacement));
    }
    body.insert(
        "include_aliases".to_string(),
        json!(options.include_aliases),
    );
    body.insert(
        "ignore_unavailable".to_string(),
        json!(options.ignore_unavailable),
    );
    body.insert(
        "include_global_state".to_string(),
        json!(options.include_global_state),
    );
    if let Some(extra) = &options.extra_settings {
        body.insert("index_settings".to_string(), extra.clone());
    }

    ctx.client
        .restore_snapshot(
            &options.repository,
            &snapshot.name,
            &Value::Object(body),
            options.common.timeout_override,
        )
        .await?;
    info!(repository = %options.repository, snapshot = %snapshot.name, "restore started");

    if options.wait.waits(true) {
        waiter::wait_for("restore", &options.wait, || {
            let client = ctx.client.clone();
            let targets = targets.clone();
            async move { Ok(client.recovery_done(&targets).await?) }
        })
        .await?;
    }
    Ok(ActionOutcome::Completed {
        affected: targets.len(),
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteSnapshotsOptions {
    #[serde(flatten)]
    pub common: CommonOptions,
    pub repository: String,
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    /// Seconds between retries when another snapshot operation is running
    #[serde(default = "default_retry_interval")]
    pub retry_interval: u64,
}

fn default_retry_count() -> u32 {
    3
}

fn default_retry_interval() -> u64 {
    120
}

impl DeleteSnapshotsOptions {
    pub fn validate(&self) -> Result<()> {
        if self.repository.is_empty() {
            return Err(Error::Config(
                "delete_snapshots requires a repository".to_string(),
            ));
        }
        Ok(())
    }
}

pub async fn run_delete_snapshots(
    options: &DeleteSnapshotsOptions,
    filters: &[FilterSpec],
    ctx: &ActionContext<'_>,
) -> Result<ActionOutcome> {
    let list = build_snapshot_list(ctx, &options.repository, filters).await?;
    if let Some(outcome) = check_empty(&list, &options.common, "delete_snapshots")? {
        return Ok(outcome);
    }

    let names: Vec<String> = list.iter().map(|snapshot| snapshot.name.clone()).collect();
    if ctx.dry_run {
        return Ok(log_dry_run("delete_snapshots", "delete snapshot", &names));
    }

    for name in &names {
        delete_with_retry(options, ctx, name).await?;
    }
    info!(repository = %options.repository, count = names.len(), "deleted snapshots");
    Ok(ActionOutcome::Completed {
        affected: names.len(),
    })
}

async fn delete_with_retry(
    options: &DeleteSnapshotsOptions,
    ctx: &ActionContext<'_>,
    name: &str,
) -> Result<()> {
    let mut attempt = 0;
    loop {
        match ctx.client.delete_snapshot(&options.repository, name).await {
            Ok(()) => return Ok(()),
            Err(e)
                if (e.is_conflict() || e.reason_contains("snapshot_in_progress"))
                    && attempt < options.retry_count =>
            {
                attempt += 1;
                warn!(
                    snapshot = name,
                    attempt,
                    "snapshot operation in progress; retrying in {}s",
                    options.retry_interval
                );
                tokio::time::sleep(Duration::from_secs(options.retry_interval)).await;
            }
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(name: &str, state: SnapshotState, start: i64) -> SnapshotInfo {
        SnapshotInfo {
            repository: "repo".to_string(),
            name: name.to_string(),
            state,
            start_time_ms: start,
            indices: vec!["idx-1".to_string(), "idx-2".to_string()],
        }
    }

    #[test]
    fn test_select_most_recent_successful() {
        let list = vec![
            snap("old", SnapshotState::Success, 100),
            snap("failed", SnapshotState::Failed, 300),
            snap("newer", SnapshotState::Success, 200),
        ];
        assert_eq!(select_snapshot(&list, None).unwrap().name, "newer");
        assert_eq!(select_snapshot(&list, Some("old")).unwrap().name, "old");
        assert!(select_snapshot(&list, Some("missing")).is_err());
    }

    #[test]
    fn test_select_with_no_success_fails() {
        let list = vec![snap("failed", SnapshotState::Failed, 100)];
        assert!(select_snapshot(&list, None).is_err());
    }

    #[test]
    fn test_expected_indices_rename() {
        let indices = vec!["logs-1".to_string(), "logs-2".to_string()];
        let renamed =
            expected_indices(&indices, &[], Some("logs-(.+)"), Some("restored-logs-$1")).unwrap();
        assert_eq!(renamed, vec!["restored-logs-1", "restored-logs-2"]);
    }

    #[test]
    fn test_expected_indices_subset() {
        let indices = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let subset = vec!["b".to_string()];
        assert_eq!(
            expected_indices(&indices, &subset, None, None).unwrap(),
            vec!["b"]
        );
    }

    #[test]
    fn test_rename_options_must_pair() {
        let mut options = RestoreOptions {
            common: CommonOptions::default(),
            repository: "repo".to_string(),
            name: None,
            indices: vec![],
            rename_pattern: Some("(.*)".to_string()),
            rename_replacement: None,
            include_aliases: false,
            ignore_unavailable: false,
            include_global_state: false,
            extra_settings: None,
            wait: WaitOptions::default(),
        };
        assert!(options.validate().is_err());
        options.rename_replacement = Some("x-$1".to_string());
        assert!(options.validate().is_ok());
    }

    #[test]
    fn test_default_snapshot_name_is_timestamped() {
        let options: SnapshotOptions =
            serde_yaml::from_str("repository: repo\n").unwrap();
        assert_eq!(options.name, DEFAULT_SNAPSHOT_NAME);
        assert!(options.include_global_state);
        assert!(!options.partial);
    }
}
