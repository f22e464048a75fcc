//! One-shot deepfreeze initialization.

use chrono::Utc;
use tracing::info;

use crate::deepfreeze::lock::sweep_expired_locks;
use crate::deepfreeze::suffix::initial_suffix;
use crate::deepfreeze::types::{RepositoryRecord, Settings, ThawState};
use crate::deepfreeze::Deepfreeze;
use crate::error::{Error, Result};

/// What setup created (or would create).
#[derive(Debug, Clone)]
pub struct SetupReport {
    pub repository: String,
    pub bucket: String,
    pub base_path: String,
    pub suffix: String,
}

impl Deepfreeze {
    /// Initialize deepfreeze: first bucket/path, first repository, settings
    /// document. Refuses to run twice.
    pub async fn setup(&self, settings: Settings, dry_run: bool) -> Result<SetupReport> {
        let status = self.status();
        status.ensure().await?;
        sweep_expired_locks(&self.es).await?;

        if status.load_settings().await?.is_some() {
            return Err(Error::Precondition(
                "deepfreeze is already set up; use rotate to advance".to_string(),
            ));
        }

        let suffix = initial_suffix(settings.style, Utc::now());
        let (bucket, base_path) = settings.location(&suffix);
        let repository = settings.repo_name(&suffix);

        let report = SetupReport {
            repository: repository.clone(),
            bucket: bucket.clone(),
            base_path: base_path.clone(),
            suffix: suffix.clone(),
        };

        if dry_run {
            info!(
                repository = %repository,
                bucket = %bucket,
                base_path = %base_path,
                "DRY-RUN: would initialize deepfreeze"
            );
            return Ok(report);
        }

        self.store.ensure_bucket(&bucket).await?;
        self.es
            .put_s3_repository(&repository, &bucket, &base_path, None)
            .await?;

        let mut persisted = settings;
        persisted.last_suffix = suffix.clone();
        status.save_settings(&persisted).await?;

        status
            .save_repo(&RepositoryRecord {
                name: repository.clone(),
                bucket,
                base_path,
                suffix,
                is_mounted: true,
                thaw_state: ThawState::Active,
                earliest_ms: None,
                latest_ms: None,
                indices: Vec::new(),
                expires_at: None,
            })
            .await?;

        info!(repository = %report.repository, "deepfreeze initialized");
        Ok(report)
    }
}
