//! Periodic deepfreeze maintenance.
//!
//! Refreezes repositories whose thaw window has lapsed, prunes old terminal
//! thaw requests, and removes orphaned per-request ILM policies. The
//! object store expires restored copies on its own after `duration_days`;
//! the explicit storage-class transition here means nothing depends on
//! that.

use chrono::Utc;
use tracing::{info, warn};

use crate::deepfreeze::types::{RequestStatus, ThawState};
use crate::deepfreeze::Deepfreeze;
use crate::error::Result;

/// Inputs to a cleanup pass.
#[derive(Debug, Clone)]
pub struct CleanupParams {
    /// Terminal thaw requests older than this many days are deleted
    pub request_retention_days: u32,
}

impl Default for CleanupParams {
    fn default() -> Self {
        Self {
            request_retention_days: 30,
        }
    }
}

/// What a cleanup pass did.
#[derive(Debug, Clone, Default)]
pub struct CleanupReport {
    pub repositories_refrozen: Vec<String>,
    pub requests_deleted: Vec<String>,
    pub policies_deleted: Vec<String>,
}

impl Deepfreeze {
    pub async fn cleanup(&self, params: CleanupParams, dry_run: bool) -> Result<CleanupReport> {
        let status = self.status();
        status.ensure().await?;
        let now = Utc::now();
        let mut report = CleanupReport::default();

        // Lapsed thaw windows are refrozen; their requests follow.
        let records = status.list_repos().await?;
        for record in records {
            let lapsed = record.thaw_state == ThawState::Thawed
                && record.expires_at.is_some_and(|expires| expires <= now);
            if !lapsed {
                continue;
            }
            if dry_run {
                info!(repository = %record.name, "DRY-RUN: would refreeze expired repository");
                continue;
            }

            let refreeze_failed = self.refreeze_repository(&record.name).await.is_err();
            if refreeze_failed {
                warn!(repository = %record.name, "refreeze of expired repository failed");
            } else {
                report.repositories_refrozen.push(record.name.clone());
            }

            // Flip every request that referenced this repository.
            for mut request in status.list_requests(false).await? {
                if !request.repos.contains(&record.name) {
                    continue;
                }
                request.status = if refreeze_failed {
                    RequestStatus::Failed
                } else {
                    RequestStatus::Refrozen
                };
                status.save_request(&request).await?;
            }
        }

        // Old terminal requests age out.
        let cutoff = now - chrono::Duration::days(i64::from(params.request_retention_days));
        for request in status.list_requests(true).await? {
            if request.status.is_terminal() && request.created_at <= cutoff {
                if dry_run {
                    info!(request_id = %request.request_id, "DRY-RUN: would delete old request");
                    continue;
                }
                status.delete_request(&request.request_id).await?;
                report.requests_deleted.push(request.request_id);
            }
        }

        // Per-request policies whose request is gone or terminal.
        let live: Vec<String> = status
            .list_requests(false)
            .await?
            .iter()
            .map(|request| request.ilm_policy_name())
            .collect();
        let policies = self.es.get_ilm_policies().await?;
        let orphans: Vec<&String> = policies
            .keys()
            .filter(|name| name.starts_with("deepfreeze-thaw-") && !live.contains(*name))
            .collect();
        if !orphans.is_empty() {
            let inventory = if dry_run {
                Vec::new()
            } else {
                self.es.inventory().await?
            };
            for name in orphans {
                if dry_run {
                    info!(policy = %name, "DRY-RUN: would delete orphaned thaw policy");
                    continue;
                }
                let referenced = inventory
                    .iter()
                    .any(|index| index.ilm_policy.as_deref() == Some(name.as_str()));
                if referenced {
                    continue;
                }
                self.es.delete_ilm_policy(name).await?;
                report.policies_deleted.push(name.clone());
            }
        }

        if !dry_run {
            info!(
                refrozen = report.repositories_refrozen.len(),
                requests_deleted = report.requests_deleted.len(),
                policies_deleted = report.policies_deleted.len(),
                "cleanup pass complete"
            );
        }
        Ok(report)
    }
}
