//! Thaw workflows: create, check-status, list.
//!
//! Creating a thaw issues one object-store restore request per archived
//! object and records a thaw request. Check-status heads every object (a
//! bounded parallel fan-out); once a repository's objects are all restored
//! it is mounted, its overlapping indices come back as searchable
//! snapshots, and the request completes when every repository is mounted.

use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use regex::Regex;
use serde_json::json;
use tracing::{debug, info, warn};

use curator_client::IlmPolicy;
use curator_storage::{RestoreStatus, RetrievalTier};

use crate::deepfreeze::index_stamp_ms;
use crate::deepfreeze::lock::RepositoryLock;
use crate::deepfreeze::types::{RepositoryRecord, RequestStatus, ThawRequest, ThawState};
use crate::deepfreeze::Deepfreeze;
use crate::error::{Error, Result};

/// Concurrency cap for per-object restore-status heads.
const HEAD_WORKERS: usize = 15;

/// Inputs to a thaw creation.
#[derive(Debug, Clone)]
pub struct ThawParams {
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub duration_days: u32,
    pub retrieval_tier: RetrievalTier,
    /// Poll check-status until the request is terminal
    pub sync: bool,
    pub poll_interval_secs: u64,
}

impl ThawParams {
    pub fn new(start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Self {
        Self {
            start_date,
            end_date,
            duration_days: 7,
            retrieval_tier: RetrievalTier::Standard,
            sync: false,
            poll_interval_secs: 30,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=90).contains(&self.duration_days) {
            return Err(Error::Config(format!(
                "duration_days must be between 1 and 90, got {}",
                self.duration_days
            )));
        }
        if self.start_date > self.end_date {
            return Err(Error::Config(
                "start_date must not be after end_date".to_string(),
            ));
        }
        Ok(())
    }
}

/// Restore progress of one repository inside a request.
#[derive(Debug, Clone)]
pub struct RepoThawProgress {
    pub name: String,
    pub bucket: String,
    pub base_path: String,
    pub state: ThawState,
    pub mounted: bool,
    pub restored: usize,
    pub total: usize,
}

impl RepoThawProgress {
    pub fn complete(&self) -> bool {
        self.restored == self.total
    }
}

/// Structured status of one thaw request.
#[derive(Debug, Clone)]
pub struct ThawStatusReport {
    pub request: ThawRequest,
    pub repos: Vec<RepoThawProgress>,
}

impl ThawStatusReport {
    /// Tab-separated machine-readable serialization.
    pub fn porcelain(&self) -> String {
        let mut lines = vec![format!(
            "REQUEST\t{}\t{}\t{}\t{}\t{}",
            self.request.request_id,
            self.request.status,
            self.request.created_at.to_rfc3339(),
            self.request.start_date.to_rfc3339(),
            self.request.end_date.to_rfc3339(),
        )];
        for repo in &self.repos {
            lines.push(format!(
                "REPO\t{}\t{}\t{}\t{}\t{}\t{}/{}",
                repo.name,
                repo.bucket,
                repo.base_path,
                repo.state,
                repo.mounted,
                repo.restored,
                repo.total,
            ));
        }
        lines.join("\n")
    }
}

impl Deepfreeze {
    /// Create a thaw: issue restores for every frozen repository whose data
    /// window overlaps `[start_date, end_date]`.
    pub async fn thaw_create(
        &self,
        params: ThawParams,
        dry_run: bool,
    ) -> Result<ThawStatusReport> {
        params.validate()?;
        let status = self.status();
        status.ensure().await?;
        status.require_settings().await?;

        let start_ms = params.start_date.timestamp_millis();
        let end_ms = params.end_date.timestamp_millis();

        let mut candidates: Vec<RepositoryRecord> = status
            .list_repos()
            .await?
            .into_iter()
            .filter(|record| {
                record.thaw_state == ThawState::Frozen && record.overlaps(start_ms, end_ms)
            })
            .collect();
        if candidates.is_empty() {
            return Err(Error::EmptyList(
                "no frozen repositories overlap the requested window".to_string(),
            ));
        }

        let request = ThawRequest::new(
            candidates.iter().map(|r| r.name.clone()).collect(),
            params.start_date,
            params.end_date,
            params.duration_days,
            params.retrieval_tier,
            Utc::now(),
        );

        if dry_run {
            let mut repos = Vec::new();
            for record in &candidates {
                let total = self
                    .store
                    .list_objects(&record.bucket, &record.base_path)
                    .await?
                    .len();
                info!(
                    repository = %record.name,
                    objects = total,
                    "DRY-RUN: would request restore ({} days, {} tier)",
                    params.duration_days,
                    params.retrieval_tier
                );
                repos.push(progress_for(record, 0, total));
            }
            return Ok(ThawStatusReport { request, repos });
        }

        let owner = Self::lock_owner("thaw");
        let mut repos = Vec::new();
        for record in &mut candidates {
            let lock = RepositoryLock::acquire(&self.es, &record.name, &owner).await?;
            let result = self.start_repository_thaw(record, &params).await;
            lock.release().await?;
            let total = result?;
            status.save_repo(record).await?;
            repos.push(progress_for(record, 0, total));
        }

        status.save_request(&request).await?;
        info!(
            request_id = %request.request_id,
            repositories = request.repos.len(),
            "thaw request created"
        );

        if !params.sync {
            return Ok(ThawStatusReport { request, repos });
        }

        // Synchronous mode: poll check-status until the request is terminal.
        let request_id = request.request_id.clone();
        loop {
            let mut reports = self.thaw_status(Some(&request_id)).await?;
            let report = reports
                .pop()
                .ok_or_else(|| Error::Fatal("thaw request vanished mid-poll".to_string()))?;
            if report.request.status.is_terminal() {
                return Ok(report);
            }
            tokio::time::sleep(Duration::from_secs(params.poll_interval_secs)).await;
        }
    }

    /// Issue restore requests for every object of one repository.
    ///
    /// Returns the object count.
    async fn start_repository_thaw(
        &self,
        record: &mut RepositoryRecord,
        params: &ThawParams,
    ) -> Result<usize> {
        let objects = self
            .store
            .list_objects(&record.bucket, &record.base_path)
            .await?;
        for object in &objects {
            self.store
                .request_restore(
                    &record.bucket,
                    &object.key,
                    params.duration_days,
                    params.retrieval_tier,
                )
                .await?;
        }
        record.thaw_state = ThawState::Thawing;
        record.is_mounted = false;
        record.expires_at =
            Some(Utc::now() + chrono::Duration::days(i64::from(params.duration_days)));
        info!(
            repository = %record.name,
            objects = objects.len(),
            "restore requests issued"
        );
        Ok(objects.len())
    }

    /// Check-status mode: probe restore progress for one request (or every
    /// non-terminal request), mounting repositories as they complete.
    pub async fn thaw_status(&self, request_id: Option<&str>) -> Result<Vec<ThawStatusReport>> {
        let status = self.status();
        status.ensure().await?;

        let requests: Vec<ThawRequest> = match request_id {
            Some(id) => {
                let request = status.get_request(id).await?.ok_or_else(|| {
                    Error::Precondition(format!("no thaw request with id {}", id))
                })?;
                vec![request]
            }
            None => status.list_requests(false).await?,
        };

        let mut reports = Vec::new();
        for mut request in requests {
            let mut repos = Vec::new();
            let mut all_mounted = true;

            for name in request.repos.clone() {
                let Some(mut record) = status.get_repo(&name).await? else {
                    warn!(repository = %name, "thaw request references an unknown repository");
                    all_mounted = false;
                    continue;
                };

                if record.is_mounted {
                    let total = record.indices.len().max(1);
                    repos.push(progress_for(&record, total, total));
                    continue;
                }
                if request.status.is_terminal() {
                    repos.push(progress_for(&record, 0, 0));
                    continue;
                }

                let (restored, total) = self.check_repository_restore(&record).await?;
                if restored == total {
                    // All objects back (an empty repository completes
                    // immediately): mount and expose the thawed window.
                    self.mount_thawed_repository(&mut record, &request).await?;
                    status.save_repo(&record).await?;
                    repos.push(progress_for(&record, restored, total));
                } else {
                    debug!(
                        repository = %record.name,
                        restored,
                        total,
                        "restore still in progress"
                    );
                    all_mounted = false;
                    repos.push(progress_for(&record, restored, total));
                }
            }

            if all_mounted && request.status == RequestStatus::InProgress {
                request.status = RequestStatus::Completed;
                status.save_request(&request).await?;
                info!(request_id = %request.request_id, "thaw request completed");
            }

            reports.push(ThawStatusReport { request, repos });
        }
        Ok(reports)
    }

    /// List thaw requests.
    pub async fn thaw_list(&self, include_terminal: bool) -> Result<Vec<ThawRequest>> {
        let status = self.status();
        status.ensure().await?;
        status.list_requests(include_terminal).await
    }

    /// Count restored objects in a repository, heading each object with a
    /// bounded fan-out. A failed head counts as not-restored; the next poll
    /// retries it.
    pub(crate) async fn check_repository_restore(
        &self,
        record: &RepositoryRecord,
    ) -> Result<(usize, usize)> {
        let objects = self
            .store
            .list_objects(&record.bucket, &record.base_path)
            .await?;
        let total = objects.len();

        let restored = stream::iter(objects.into_iter().map(|object| {
            let store = self.store.clone();
            let bucket = record.bucket.clone();
            async move {
                match store.restore_status(&bucket, &object.key).await {
                    Ok(RestoreStatus::Restored) => true,
                    Ok(_) => false,
                    Err(e) => {
                        debug!(key = %object.key, error = %e, "restore head failed");
                        false
                    }
                }
            }
        }))
        .buffer_unordered(HEAD_WORKERS)
        .filter(|restored| futures::future::ready(*restored))
        .count()
        .await;

        Ok((restored, total))
    }

    /// Mount a fully-restored repository and its overlapping indices.
    async fn mount_thawed_repository(
        &self,
        record: &mut RepositoryRecord,
        request: &ThawRequest,
    ) -> Result<()> {
        self.es
            .put_s3_repository(&record.name, &record.bucket, &record.base_path, None)
            .await?;
        self.rescan_repo(record).await?;

        // A per-request policy expires the thawed mounts with the window.
        let policy = IlmPolicy {
            name: request.ilm_policy_name(),
            policy: json!({
                "phases": {
                    "hot": { "min_age": "0ms", "actions": {} },
                    "delete": {
                        "min_age": format!("{}d", request.duration_days),
                        "actions": { "delete": {} }
                    }
                }
            }),
        };
        self.es.put_ilm_policy(&policy).await?;

        let start_ms = request.start_date.timestamp_millis();
        let end_ms = request.end_date.timestamp_millis();
        let snapshots = self.es.get_snapshots(&record.name).await?;

        let mut mounted_originals: Vec<String> = Vec::new();
        let mut mounted_names: Vec<String> = Vec::new();
        for snapshot in &snapshots {
            for index in &snapshot.indices {
                if mounted_originals.iter().any(|seen| seen == index) {
                    continue;
                }
                let Some(stamp) = index_stamp_ms(index) else {
                    continue;
                };
                if stamp < start_ms || stamp > end_ms {
                    continue;
                }
                match self
                    .es
                    .mount_searchable_snapshot(&record.name, &snapshot.name, index, None, true)
                    .await
                {
                    Ok(mounted) => {
                        info!(index = %index, mounted = %mounted, "mounted searchable snapshot");
                        mounted_originals.push(index.clone());
                        if let Some(data_stream) = data_stream_of(index) {
                            if let Err(e) =
                                self.es.add_backing_index(&data_stream, &mounted).await
                            {
                                debug!(
                                    index = %mounted,
                                    data_stream = %data_stream,
                                    error = %e,
                                    "could not attach to data stream"
                                );
                            }
                        }
                        mounted_names.push(mounted);
                    }
                    Err(e) if e.reason_contains("resource_already_exists") => {
                        debug!(index = %index, "already mounted");
                        mounted_originals.push(index.clone());
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }

        if !mounted_names.is_empty() {
            let settings = json!({ "index.lifecycle.name": policy.name });
            self.es
                .put_index_settings(&mounted_names, &settings, false, true, None)
                .await?;
        }

        record.thaw_state = ThawState::Thawed;
        record.is_mounted = true;
        info!(
            repository = %record.name,
            mounted = mounted_names.len(),
            "repository thawed and mounted"
        );
        Ok(())
    }
}

fn progress_for(record: &RepositoryRecord, restored: usize, total: usize) -> RepoThawProgress {
    RepoThawProgress {
        name: record.name.clone(),
        bucket: record.bucket.clone(),
        base_path: record.base_path.clone(),
        state: record.thaw_state,
        mounted: record.is_mounted,
        restored,
        total,
    }
}

/// Data-stream name of a backing index (`.ds-<stream>-<date>-<generation>`).
fn data_stream_of(index: &str) -> Option<String> {
    let pattern = Regex::new(r"^\.ds-(.+)-\d{4}\.\d{2}\.\d{2}-\d{6}$").ok()?;
    pattern
        .captures(index)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use curator_storage::ObjectStoreClient;

    #[test]
    fn test_params_validation() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();

        let mut params = ThawParams::new(start, end);
        assert!(params.validate().is_ok());
        assert_eq!(params.duration_days, 7);

        params.duration_days = 0;
        assert!(params.validate().is_err());
        params.duration_days = 91;
        assert!(params.validate().is_err());
        params.duration_days = 90;
        assert!(params.validate().is_ok());

        let inverted = ThawParams::new(end, start);
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_porcelain_format() {
        let start = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap();
        let request = ThawRequest::new(
            vec!["deepfreeze-000002".to_string()],
            start,
            end,
            7,
            RetrievalTier::Standard,
            start,
        );
        let report = ThawStatusReport {
            request: request.clone(),
            repos: vec![RepoThawProgress {
                name: "deepfreeze-000002".to_string(),
                bucket: "deepfreeze".to_string(),
                base_path: "snapshots-000002".to_string(),
                state: ThawState::Thawing,
                mounted: false,
                restored: 3,
                total: 10,
            }],
        };

        let porcelain = report.porcelain();
        let lines: Vec<&str> = porcelain.lines().collect();
        assert_eq!(lines.len(), 2);

        let request_fields: Vec<&str> = lines[0].split('\t').collect();
        assert_eq!(request_fields[0], "REQUEST");
        assert_eq!(request_fields[1], request.request_id);
        assert_eq!(request_fields[2], "in_progress");

        let repo_fields: Vec<&str> = lines[1].split('\t').collect();
        assert_eq!(
            repo_fields,
            vec![
                "REPO",
                "deepfreeze-000002",
                "deepfreeze",
                "snapshots-000002",
                "thawing",
                "false",
                "3/10"
            ]
        );
    }

    fn record(bucket: &str, base_path: &str) -> RepositoryRecord {
        RepositoryRecord {
            name: "deepfreeze-000002".to_string(),
            bucket: bucket.to_string(),
            base_path: base_path.to_string(),
            suffix: "000002".to_string(),
            is_mounted: false,
            thaw_state: ThawState::Thawing,
            earliest_ms: None,
            latest_ms: None,
            indices: vec![],
            expires_at: None,
        }
    }

    fn offline_deepfreeze(
        store: std::sync::Arc<curator_storage::MemoryObjectStore>,
    ) -> Deepfreeze {
        // Points at a closed port; these tests never touch the cluster.
        let es = curator_client::EsClient::for_url("http://127.0.0.1:1").unwrap();
        Deepfreeze::new(es, store)
    }

    #[tokio::test]
    async fn test_empty_repository_completes_immediately() {
        let store = std::sync::Arc::new(curator_storage::MemoryObjectStore::new());
        store.ensure_bucket("deepfreeze").await.unwrap();
        let deepfreeze = offline_deepfreeze(store);

        let (restored, total) = deepfreeze
            .check_repository_restore(&record("deepfreeze", "snapshots-000002"))
            .await
            .unwrap();
        assert_eq!((restored, total), (0, 0));
    }

    #[tokio::test]
    async fn test_restore_progress_counting() {
        use curator_storage::{ObjectStoreClient, StorageClass};

        let store = std::sync::Arc::new(curator_storage::MemoryObjectStore::new());
        for n in 0..10 {
            store.seed_object(
                "deepfreeze",
                &format!("snapshots-000002/blob-{}", n),
                100,
                StorageClass::Glacier,
            );
        }
        // Half the objects have a restore running.
        for n in 0..5 {
            store
                .request_restore(
                    "deepfreeze",
                    &format!("snapshots-000002/blob-{}", n),
                    7,
                    RetrievalTier::Standard,
                )
                .await
                .unwrap();
        }
        let deepfreeze = offline_deepfreeze(store.clone());
        let target = record("deepfreeze", "snapshots-000002");

        let (restored, total) = deepfreeze.check_repository_restore(&target).await.unwrap();
        assert_eq!((restored, total), (0, 10));

        store.complete_restores();
        let (restored, total) = deepfreeze.check_repository_restore(&target).await.unwrap();
        assert_eq!((restored, total), (5, 10));
    }

    #[test]
    fn test_data_stream_extraction() {
        assert_eq!(
            data_stream_of(".ds-logs-app-2025.01.15-000004"),
            Some("logs-app".to_string())
        );
        assert_eq!(data_stream_of("logs-2025.01.15"), None);
    }
}
