//! Refreeze: the inverse of thaw.

use tracing::{info, warn};

use crate::deepfreeze::lock::RepositoryLock;
use crate::deepfreeze::types::{RequestStatus, ThawRequest};
use crate::deepfreeze::Deepfreeze;
use crate::error::{Error, Result};

/// What a refreeze did.
#[derive(Debug, Clone, Default)]
pub struct RefreezeReport {
    pub requests_refrozen: Vec<String>,
    pub repositories_refrozen: Vec<String>,
    pub indices_deleted: Vec<String>,
}

impl Deepfreeze {
    /// Refreeze one request by id, or every non-terminal request.
    pub async fn refreeze(
        &self,
        request_id: Option<&str>,
        dry_run: bool,
    ) -> Result<RefreezeReport> {
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
        if requests.is_empty() {
            return Err(Error::EmptyList(
                "no thaw requests to refreeze".to_string(),
            ));
        }

        let all_requests = status.list_requests(false).await?;
        let mut report = RefreezeReport::default();

        for mut request in requests {
            if request.status.is_terminal() && request.status != RequestStatus::Completed {
                warn!(
                    request_id = %request.request_id,
                    status = %request.status,
                    "request is already terminal; skipping"
                );
                continue;
            }

            for repo in request.repos.clone() {
                // A repository shared with another live request stays up.
                let shared = all_requests.iter().any(|other| {
                    other.request_id != request.request_id
                        && !other.status.is_terminal()
                        && other.repos.contains(&repo)
                });
                if shared {
                    info!(
                        repository = %repo,
                        "still referenced by another thaw request; not refreezing"
                    );
                    continue;
                }
                if dry_run {
                    info!(repository = %repo, "DRY-RUN: would refreeze repository");
                    continue;
                }
                let deleted = self.refreeze_repository(&repo).await?;
                report.indices_deleted.extend(deleted);
                report.repositories_refrozen.push(repo);
            }

            if !dry_run {
                request.status = RequestStatus::Refrozen;
                status.save_request(&request).await?;
            }
            report.requests_refrozen.push(request.request_id.clone());
        }
        Ok(report)
    }

    /// Refreeze one repository: delete its mounted indices, unregister it,
    /// return its objects to the configured cold class.
    pub(crate) async fn refreeze_repository(&self, name: &str) -> Result<Vec<String>> {
        let status = self.status();
        let settings = status.require_settings().await?;
        let Some(mut record) = status.get_repo(name).await? else {
            return Err(Error::Precondition(format!(
                "no repository record for {}",
                name
            )));
        };

        let owner = Self::lock_owner("refreeze");
        let lock = RepositoryLock::acquire(&self.es, name, &owner).await?;
        let result = async {
            // Every index mounted out of this repository goes away.
            let inventory = self.es.inventory().await?;
            let mounted: Vec<String> = inventory
                .iter()
                .filter(|index| {
                    index
                        .store_snapshot
                        .as_ref()
                        .is_some_and(|snapshot| snapshot.repository == name)
                })
                .map(|index| index.name.clone())
                .collect();
            if !mounted.is_empty() {
                self.es.delete_indices(&mounted, None).await?;
                info!(repository = %name, count = mounted.len(), "deleted thawed indices");
            }

            self.unmount_repository(&mut record, &settings.storage_class)
                .await?;
            status.save_repo(&record).await?;
            Ok::<Vec<String>, Error>(mounted)
        }
        .await;
        lock.release().await?;
        result
    }
}
