//! Repository rotation.
//!
//! Rotation never mutates an ILM policy in place: every policy referencing
//! the active repository gets a new versioned copy (`{base}-{new_suffix}`)
//! pointing at the new repository, and templates are retargeted to the new
//! copies. Existing indices keep their old policies aimed at old
//! repositories, so no in-flight ILM transition is disrupted.

use chrono::Utc;
use tracing::{debug, info, warn};

use curator_client::IlmPolicy;

use crate::deepfreeze::lock::RepositoryLock;
use crate::deepfreeze::suffix::{next_suffix, strip_suffix, suffix_of};
use crate::deepfreeze::types::{RepositoryRecord, ThawState};
use crate::deepfreeze::Deepfreeze;
use crate::error::{Error, Result};

/// Inputs to one rotation.
#[derive(Debug, Clone, Default)]
pub struct RotateParams {
    /// Only meaningful with `style=date`
    pub year: Option<i32>,
    /// Only meaningful with `style=date`
    pub month: Option<u32>,
    /// Override the configured number of repositories to keep mounted
    pub keep: Option<u32>,
}

/// What a rotation did (or would do).
#[derive(Debug, Clone, Default)]
pub struct RotateReport {
    pub new_suffix: String,
    pub new_repository: String,
    pub policies_created: Vec<String>,
    pub templates_updated: Vec<String>,
    pub unmounted: Vec<String>,
}

impl Deepfreeze {
    pub async fn rotate(&self, params: RotateParams, dry_run: bool) -> Result<RotateReport> {
        let status = self.status();
        status.ensure().await?;
        let mut settings = status.require_settings().await?;
        let keep = params.keep.unwrap_or(settings.keep).max(1);

        let active_repo = settings.repo_name(&settings.last_suffix);
        let new_suffix = next_suffix(
            settings.style,
            &settings.last_suffix,
            params.year,
            params.month,
            Utc::now(),
        )?;
        let new_repo = settings.repo_name(&new_suffix);
        let (bucket, base_path) = settings.location(&new_suffix);

        // At least one ILM policy must target the active repository, else
        // nothing snapshots into the new one and rotation is a mistake.
        let policies = self.es.get_ilm_policies().await?;
        let referencing: Vec<&IlmPolicy> = policies
            .values()
            .filter(|policy| {
                policy
                    .referenced_repositories()
                    .iter()
                    .any(|repo| repo == &active_repo)
            })
            .collect();
        if referencing.is_empty() {
            return Err(Error::Precondition(format!(
                "no ILM policy references the active repository {}",
                active_repo
            )));
        }

        let mut report = RotateReport {
            new_suffix: new_suffix.clone(),
            new_repository: new_repo.clone(),
            ..Default::default()
        };

        if dry_run {
            info!(
                new_repository = %new_repo,
                policies = referencing.len(),
                "DRY-RUN: would rotate deepfreeze repositories"
            );
            for policy in &referencing {
                report
                    .policies_created
                    .push(format!("{}-{}", strip_suffix(&policy.name), new_suffix));
            }
            return Ok(report);
        }

        // 1-2. New bucket/path and repository.
        self.store.ensure_bucket(&bucket).await?;
        self.es
            .put_s3_repository(&new_repo, &bucket, &base_path, None)
            .await?;

        // 3. Versioned policy copies.
        let mut renames: Vec<(String, String)> = Vec::new();
        for policy in &referencing {
            if policy.deletes_searchable_snapshot() {
                warn!(
                    policy = %policy.name,
                    "delete phase has delete_searchable_snapshot=true; rotated-out snapshots will be removed by ILM"
                );
            }
            let new_name = format!("{}-{}", strip_suffix(&policy.name), new_suffix);
            let copy = policy.with_repository(new_name.clone(), &new_repo);
            self.es.put_ilm_policy(&copy).await?;
            report.policies_created.push(new_name.clone());
            renames.push((policy.name.clone(), new_name));
        }

        // 4. Retarget templates at the new policy versions.
        let mut templates = self.es.get_index_templates().await?;
        templates.extend(self.es.get_legacy_templates().await?);
        for template in &templates {
            let Some(current) = template.lifecycle_policy() else {
                continue;
            };
            if let Some((_, new_name)) = renames.iter().find(|(old, _)| old == current) {
                self.es
                    .put_template(&template.with_lifecycle_policy(new_name))
                    .await?;
                report.templates_updated.push(template.name.clone());
            }
        }

        // 5. Refresh every mounted repository record from its snapshots.
        let mut records = status.list_repos().await?;
        for record in &mut records {
            if record.is_mounted {
                if let Err(e) = self.rescan_repo(record).await {
                    debug!(repository = %record.name, error = %e, "rescan failed");
                } else {
                    status.save_repo(record).await?;
                }
            }
        }

        // New repository record joins the set before the keep-count cut.
        let new_record = RepositoryRecord {
            name: new_repo.clone(),
            bucket,
            base_path,
            suffix: new_suffix.clone(),
            is_mounted: true,
            thaw_state: ThawState::Active,
            earliest_ms: None,
            latest_ms: None,
            indices: Vec::new(),
            expires_at: None,
        };
        status.save_repo(&new_record).await?;
        records.push(new_record);

        // 6. Unmount everything beyond the newest `keep`.
        records.sort_by(|a, b| b.suffix.cmp(&a.suffix));
        let owner = Self::lock_owner("rotate");
        for record in records.iter_mut().skip(keep as usize) {
            if !record.rotation_may_unmount() {
                info!(
                    repository = %record.name,
                    thaw_state = %record.thaw_state,
                    "skipping unmount of repository that is mid-thaw"
                );
                continue;
            }
            if !record.is_mounted && record.thaw_state == ThawState::Frozen {
                continue;
            }

            let lock = RepositoryLock::acquire(&self.es, &record.name, &owner).await?;
            let result = self.unmount_repository(record, &settings.storage_class).await;
            lock.release().await?;
            result?;
            status.save_repo(record).await?;
            report.unmounted.push(record.name.clone());

            self.delete_unreferenced_policies(&record.suffix).await?;
        }

        // 7. Persist the new suffix.
        settings.last_suffix = new_suffix;
        status.save_settings(&settings).await?;

        // 8. Routine maintenance piggybacks on every rotation.
        self.cleanup(Default::default(), false).await?;

        info!(
            new_repository = %report.new_repository,
            policies = report.policies_created.len(),
            unmounted = report.unmounted.len(),
            "rotation complete"
        );
        Ok(report)
    }

    /// Unregister a repository and push its objects to cold storage.
    pub(crate) async fn unmount_repository(
        &self,
        record: &mut RepositoryRecord,
        storage_class: &curator_storage::StorageClass,
    ) -> Result<()> {
        self.es.delete_repository(&record.name).await?;
        let objects = self
            .store
            .list_objects(&record.bucket, &record.base_path)
            .await?;
        for object in &objects {
            self.store
                .set_storage_class(&record.bucket, &object.key, *storage_class)
                .await?;
        }
        record.is_mounted = false;
        record.thaw_state = ThawState::Frozen;
        record.expires_at = None;
        info!(
            repository = %record.name,
            objects = objects.len(),
            class = %storage_class,
            "unmounted repository and transitioned objects to cold storage"
        );
        Ok(())
    }

    /// Delete versioned policies carrying a suffix, unless an index, data
    /// stream or template still references them.
    async fn delete_unreferenced_policies(&self, suffix: &str) -> Result<()> {
        let policies = self.es.get_ilm_policies().await?;
        let candidates: Vec<String> = policies
            .keys()
            .filter(|name| suffix_of(name) == Some(suffix))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Ok(());
        }

        let inventory = self.es.inventory().await?;
        for name in candidates {
            let index_referenced = inventory
                .iter()
                .any(|index| index.ilm_policy.as_deref() == Some(&name));
            if index_referenced {
                debug!(policy = %name, "kept: still attached to indices");
                continue;
            }
            if self.es.template_references_policy(&name).await? {
                debug!(policy = %name, "kept: still referenced by a template");
                continue;
            }
            self.es.delete_ilm_policy(&name).await?;
            info!(policy = %name, "deleted unreferenced versioned policy");
        }
        Ok(())
    }
}
