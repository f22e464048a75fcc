//! Snapshot and repository operations.

use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;

use crate::client::EsClient;
use crate::error::{EsError, Result};
use crate::types::{RepositoryInfo, SnapshotInfo, SnapshotState};

impl EsClient {
    /// List registered snapshot repositories.
    pub async fn get_repositories(&self) -> Result<Vec<RepositoryInfo>> {
        let value: Value = self.get("_snapshot/_all", &[]).await?;
        let mut repos = Vec::new();
        if let Some(map) = value.as_object() {
            for (name, entry) in map {
                repos.push(RepositoryInfo {
                    name: name.clone(),
                    kind: entry
                        .get("type")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                    bucket: entry
                        .pointer("/settings/bucket")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                    base_path: entry
                        .pointer("/settings/base_path")
                        .and_then(Value::as_str)
                        .map(str::to_string),
                });
            }
        }
        Ok(repos)
    }

    /// Check whether a repository is registered.
    pub async fn repository_exists(&self, name: &str) -> Result<bool> {
        let result: Result<Value> = self.get(&format!("_snapshot/{}", name), &[]).await;
        match result {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Register (or re-register) an S3 repository.
    ///
    /// Registration is idempotent: re-registering with identical settings is
    /// a no-op on the cluster side.
    pub async fn put_s3_repository(
        &self,
        name: &str,
        bucket: &str,
        base_path: &str,
        extra_settings: Option<&Value>,
    ) -> Result<()> {
        let mut settings = json!({
            "bucket": bucket,
            "base_path": base_path,
        });
        if let Some(extra) = extra_settings.and_then(Value::as_object) {
            for (k, v) in extra {
                settings[k] = v.clone();
            }
        }
        let body = json!({ "type": "s3", "settings": settings });
        let _: Value = self
            .request(
                Method::PUT,
                &format!("_snapshot/{}", name),
                &[],
                Some(&body),
                None,
            )
            .await?;
        debug!(repository = name, bucket, base_path, "registered repository");
        Ok(())
    }

    /// Unregister a repository. The snapshots it holds are untouched.
    pub async fn delete_repository(&self, name: &str) -> Result<()> {
        let result: Result<Value> = self
            .request(
                Method::DELETE,
                &format!("_snapshot/{}", name),
                &[],
                None,
                None,
            )
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e),
        }
    }

    /// Verify repository access from all data nodes.
    pub async fn verify_repository(&self, name: &str) -> Result<()> {
        let _: Value = self
            .request(
                Method::POST,
                &format!("_snapshot/{}/_verify", name),
                &[],
                None,
                None,
            )
            .await?;
        Ok(())
    }

    /// List the snapshots of a repository.
    pub async fn get_snapshots(&self, repository: &str) -> Result<Vec<SnapshotInfo>> {
        let value: Value = self
            .get(&format!("_snapshot/{}/_all", repository), &[])
            .await?;
        let mut snapshots = Vec::new();
        if let Some(entries) = value.get("snapshots").and_then(Value::as_array) {
            for entry in entries {
                let Some(name) = entry.get("snapshot").and_then(Value::as_str) else {
                    continue;
                };
                let state = entry
                    .get("state")
                    .and_then(Value::as_str)
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(SnapshotState::InProgress);
                snapshots.push(SnapshotInfo {
                    repository: repository.to_string(),
                    name: name.to_string(),
                    state,
                    start_time_ms: entry
                        .get("start_time_in_millis")
                        .and_then(Value::as_i64)
                        .unwrap_or(0),
                    indices: entry
                        .get("indices")
                        .and_then(Value::as_array)
                        .map(|arr| {
                            arr.iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default(),
                });
            }
        }
        Ok(snapshots)
    }

    /// State of one snapshot, for poll loops.
    pub async fn snapshot_state(&self, repository: &str, name: &str) -> Result<SnapshotState> {
        let value: Value = self
            .get(&format!("_snapshot/{}/{}", repository, name), &[])
            .await?;
        value
            .get("snapshots")
            .and_then(Value::as_array)
            .and_then(|arr| arr.first())
            .and_then(|s| s.get("state"))
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .ok_or_else(|| EsError::NotFound(format!("{}/{}", repository, name)))
    }

    /// Whether any snapshot is currently running in the repository (or any
    /// repository, with `None`).
    pub async fn snapshot_in_progress(&self, repository: Option<&str>) -> Result<bool> {
        let path = match repository {
            Some(repo) => format!("_snapshot/{}/_status", repo),
            None => "_snapshot/_status".to_string(),
        };
        let value: Value = self.get(&path, &[]).await?;
        Ok(value
            .get("snapshots")
            .and_then(Value::as_array)
            .map(|arr| !arr.is_empty())
            .unwrap_or(false))
    }

    /// Start a snapshot without holding the connection open.
    pub async fn create_snapshot(
        &self,
        repository: &str,
        name: &str,
        body: &Value,
        timeout_override: Option<u64>,
    ) -> Result<()> {
        let _: Value = self
            .request(
                Method::PUT,
                &format!("_snapshot/{}/{}", repository, name),
                &[("wait_for_completion", "false".to_string())],
                Some(body),
                timeout_override,
            )
            .await?;
        Ok(())
    }

    /// Delete one snapshot.
    pub async fn delete_snapshot(&self, repository: &str, name: &str) -> Result<()> {
        let _: Value = self
            .request(
                Method::DELETE,
                &format!("_snapshot/{}/{}", repository, name),
                &[],
                None,
                None,
            )
            .await?;
        Ok(())
    }

    /// Start a restore without holding the connection open.
    pub async fn restore_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        body: &Value,
        timeout_override: Option<u64>,
    ) -> Result<()> {
        let _: Value = self
            .request(
                Method::POST,
                &format!("_snapshot/{}/{}/_restore", repository, snapshot),
                &[("wait_for_completion", "false".to_string())],
                Some(body),
                timeout_override,
            )
            .await?;
        Ok(())
    }

    /// Mount an index from a snapshot as a searchable snapshot.
    ///
    /// Returns the mounted index name as reported by the cluster; the
    /// `partial-`/`restored-` prefix convention varies by version, so the
    /// response is authoritative.
    pub async fn mount_searchable_snapshot(
        &self,
        repository: &str,
        snapshot: &str,
        index: &str,
        renamed_index: Option<&str>,
        shared_cache: bool,
    ) -> Result<String> {
        let mut body = json!({ "index": index });
        if let Some(renamed) = renamed_index {
            body["renamed_index"] = json!(renamed);
        }
        let storage = if shared_cache { "shared_cache" } else { "full_copy" };
        let value: Value = self
            .request(
                Method::POST,
                &format!("_snapshot/{}/{}/_mount", repository, snapshot),
                &[
                    ("storage", storage.to_string()),
                    ("wait_for_completion", "true".to_string()),
                ],
                Some(&body),
                None,
            )
            .await?;
        // The mounted name comes back in the response's indices list.
        let mounted = value
            .pointer("/snapshot/indices/0")
            .and_then(Value::as_str)
            .map(str::to_string)
            .or_else(|| renamed_index.map(str::to_string))
            .unwrap_or_else(|| index.to_string());
        Ok(mounted)
    }
}
