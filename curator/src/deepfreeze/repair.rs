//! Metadata repair: reconcile status-index records against the cluster.
//!
//! The cluster is the authority of record; the status index is a cache.
//! Repair rescans registered repositories, creates records the index is
//! missing, fixes `is_mounted` flags that drifted, and refreshes data
//! windows.

use tracing::{info, warn};

use crate::deepfreeze::lock::sweep_expired_locks;
use crate::deepfreeze::suffix::suffix_of;
use crate::deepfreeze::types::{RepositoryRecord, ThawState};
use crate::deepfreeze::Deepfreeze;
use crate::error::Result;

/// What repair changed.
#[derive(Debug, Clone, Default)]
pub struct RepairReport {
    pub records_created: Vec<String>,
    pub records_fixed: Vec<String>,
    pub records_rescanned: Vec<String>,
}

impl Deepfreeze {
    pub async fn repair_metadata(&self, dry_run: bool) -> Result<RepairReport> {
        let status = self.status();
        status.ensure().await?;
        if !dry_run {
            sweep_expired_locks(&self.es).await?;
        }
        let settings = status.require_settings().await?;

        let registered = self.es.get_repositories().await?;
        let mut report = RepairReport::default();
        let prefix = format!("{}-", settings.repo_name_prefix);

        // Registered repositories the status index has no record of.
        for repo in &registered {
            if !repo.name.starts_with(&prefix) {
                continue;
            }
            if status.get_repo(&repo.name).await?.is_some() {
                continue;
            }
            let Some(suffix) = suffix_of(&repo.name) else {
                warn!(repository = %repo.name, "registered repository has no rotation suffix");
                continue;
            };
            if dry_run {
                info!(repository = %repo.name, "DRY-RUN: would create missing record");
                continue;
            }
            let mut record = RepositoryRecord {
                name: repo.name.clone(),
                bucket: repo.bucket.clone().unwrap_or_default(),
                base_path: repo.base_path.clone().unwrap_or_default(),
                suffix: suffix.to_string(),
                is_mounted: true,
                thaw_state: ThawState::Active,
                earliest_ms: None,
                latest_ms: None,
                indices: Vec::new(),
                expires_at: None,
            };
            self.rescan_repo(&mut record).await?;
            status.save_repo(&record).await?;
            report.records_created.push(repo.name.clone());
        }

        // Existing records: fix mount flags and refresh windows.
        for mut record in status.list_repos().await? {
            let mounted = registered.iter().any(|repo| repo.name == record.name);
            let mut changed = false;

            if record.is_mounted != mounted {
                record.is_mounted = mounted;
                // Re-establish the state/mount invariant from the cluster's
                // point of view.
                record.thaw_state = match (mounted, record.thaw_state) {
                    (true, ThawState::Thawed) => ThawState::Thawed,
                    (true, _) => ThawState::Active,
                    (false, ThawState::Thawing) => ThawState::Thawing,
                    (false, _) => ThawState::Frozen,
                };
                changed = true;
            }

            if mounted {
                if dry_run {
                    info!(repository = %record.name, "DRY-RUN: would rescan repository");
                } else {
                    self.rescan_repo(&mut record).await?;
                    report.records_rescanned.push(record.name.clone());
                }
            }

            if changed {
                if dry_run {
                    info!(repository = %record.name, "DRY-RUN: would fix mount state");
                } else {
                    report.records_fixed.push(record.name.clone());
                }
            }
            if !dry_run && (changed || mounted) {
                status.save_repo(&record).await?;
            }
        }

        info!(
            created = report.records_created.len(),
            fixed = report.records_fixed.len(),
            rescanned = report.records_rescanned.len(),
            dry_run,
            "metadata repair complete"
        );
        Ok(report)
    }
}
