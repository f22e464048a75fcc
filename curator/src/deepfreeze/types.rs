//! Deepfreeze data model: settings, repository records, thaw requests.
//!
//! These documents live in the hidden status index; the cluster and the
//! object store remain the authority of record, and `repair-metadata`
//! reconciles these records against them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use curator_storage::{RetrievalTier, StorageClass};

/// Repository suffix style.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Style {
    /// Monotonic counter: `000001`, `000002`, …
    #[default]
    Oneup,
    /// Calendar tag: `2025.01`
    Date,
}

/// Whether rotation creates a new bucket or a new base path per suffix.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotateBy {
    Bucket,
    #[default]
    Path,
}

/// The singleton settings document (id `deepfreeze-settings`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_repo_prefix")]
    pub repo_name_prefix: String,
    #[serde(default = "default_bucket_prefix")]
    pub bucket_name_prefix: String,
    #[serde(default = "default_base_path_prefix")]
    pub base_path_prefix: String,
    #[serde(default = "default_storage_class")]
    pub storage_class: StorageClass,
    #[serde(default)]
    pub rotate_by: RotateBy,
    #[serde(default)]
    pub last_suffix: String,
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default)]
    pub style: Style,
    #[serde(default = "default_keep")]
    pub keep: u32,
}

fn default_repo_prefix() -> String {
    "deepfreeze".to_string()
}

fn default_bucket_prefix() -> String {
    "deepfreeze".to_string()
}

fn default_base_path_prefix() -> String {
    "snapshots".to_string()
}

fn default_storage_class() -> StorageClass {
    StorageClass::Glacier
}

fn default_provider() -> String {
    "aws".to_string()
}

fn default_keep() -> u32 {
    6
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            repo_name_prefix: default_repo_prefix(),
            bucket_name_prefix: default_bucket_prefix(),
            base_path_prefix: default_base_path_prefix(),
            storage_class: default_storage_class(),
            rotate_by: RotateBy::default(),
            last_suffix: String::new(),
            provider: default_provider(),
            style: Style::default(),
            keep: default_keep(),
        }
    }
}

impl Settings {
    pub fn repo_name(&self, suffix: &str) -> String {
        format!("{}-{}", self.repo_name_prefix, suffix)
    }

    /// `(bucket, base_path)` for a suffix, per the rotation axis.
    pub fn location(&self, suffix: &str) -> (String, String) {
        match self.rotate_by {
            RotateBy::Bucket => (
                format!("{}-{}", self.bucket_name_prefix, suffix),
                self.base_path_prefix.clone(),
            ),
            RotateBy::Path => (
                self.bucket_name_prefix.clone(),
                format!("{}-{}", self.base_path_prefix, suffix),
            ),
        }
    }
}

/// Thaw state of one repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThawState {
    /// Live repository, actively snapshotted into
    Active,
    /// Objects in cold storage, repository unregistered
    Frozen,
    /// Restore requests issued, objects coming back
    Thawing,
    /// Restored and mounted for the duration of a thaw window
    Thawed,
    /// Restored copies lapsed without a refreeze
    Expired,
}

impl std::fmt::Display for ThawState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ThawState::Active => "active",
            ThawState::Frozen => "frozen",
            ThawState::Thawing => "thawing",
            ThawState::Thawed => "thawed",
            ThawState::Expired => "expired",
        };
        write!(f, "{}", s)
    }
}

/// One document per repository (id = repository name).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryRecord {
    pub name: String,
    pub bucket: String,
    pub base_path: String,
    pub suffix: String,
    pub is_mounted: bool,
    pub thaw_state: ThawState,
    /// Oldest index timestamp found in the repository's snapshots, epoch ms
    #[serde(default)]
    pub earliest_ms: Option<i64>,
    /// Newest index timestamp found in the repository's snapshots, epoch ms
    #[serde(default)]
    pub latest_ms: Option<i64>,
    /// Index names observed in the repository's snapshots
    #[serde(default)]
    pub indices: Vec<String>,
    /// When the restored copies lapse, for thawing/thawed repositories
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

impl RepositoryRecord {
    /// `is_mounted ⇔ thaw_state ∈ {active, thawed}`.
    pub fn invariant_holds(&self) -> bool {
        self.is_mounted == matches!(self.thaw_state, ThawState::Active | ThawState::Thawed)
    }

    /// Rotation must leave repositories that are mid-thaw alone.
    pub fn rotation_may_unmount(&self) -> bool {
        !matches!(self.thaw_state, ThawState::Thawing | ThawState::Thawed)
    }

    /// Whether the recorded `[earliest, latest]` window overlaps a query
    /// window. Records without a known window never match.
    pub fn overlaps(&self, start_ms: i64, end_ms: i64) -> bool {
        match (self.earliest_ms, self.latest_ms) {
            (Some(earliest), Some(latest)) => earliest <= end_ms && latest >= start_ms,
            _ => false,
        }
    }
}

/// Lifecycle status of one thaw request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    InProgress,
    Completed,
    Failed,
    Refrozen,
}

impl RequestStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, RequestStatus::InProgress)
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RequestStatus::InProgress => "in_progress",
            RequestStatus::Completed => "completed",
            RequestStatus::Failed => "failed",
            RequestStatus::Refrozen => "refrozen",
        };
        write!(f, "{}", s)
    }
}

/// One document per thaw request (id = UUID).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThawRequest {
    pub request_id: String,
    pub repos: Vec<String>,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub duration_days: u32,
    pub retrieval_tier: RetrievalTier,
}

impl ThawRequest {
    pub fn new(
        repos: Vec<String>,
        start_date: DateTime<Utc>,
        end_date: DateTime<Utc>,
        duration_days: u32,
        retrieval_tier: RetrievalTier,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            repos,
            status: RequestStatus::InProgress,
            created_at,
            start_date,
            end_date,
            duration_days,
            retrieval_tier,
        }
    }

    /// Name of the per-request ILM policy attached to thawed mounts.
    pub fn ilm_policy_name(&self) -> String {
        format!("deepfreeze-thaw-{}", self.request_id)
    }
}
