//! The deepfreeze subsystem: S3/Glacier repository lifecycle management.
//!
//! Deepfreeze owns snapshot *repositories*, not snapshots. ILM keeps
//! snapshotting into the active repository; deepfreeze rotates new
//! repositories in (re-versioning the ILM policies that point at them),
//! retires old ones to cold storage, and coordinates the multi-hour
//! thaw/refreeze workflows that bring archived repositories back for a
//! window of time.

pub mod cleanup;
pub mod lock;
pub mod refreeze;
pub mod repair;
pub mod rotate;
pub mod setup;
pub mod status;
pub mod suffix;
pub mod thaw;
pub mod types;

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use curator_client::EsClient;
use curator_storage::ObjectStoreClient;

use crate::error::Result;
use crate::filter::timestring::parse_name_timestamp;

pub use status::StatusIndex;
pub use types::{
    RepositoryRecord, RequestStatus, RotateBy, Settings, Style, ThawRequest, ThawState,
};

/// Deepfreeze operations against one cluster and one object store.
pub struct Deepfreeze {
    pub(crate) es: EsClient,
    pub(crate) store: Arc<dyn ObjectStoreClient>,
}

impl Deepfreeze {
    pub fn new(es: EsClient, store: Arc<dyn ObjectStoreClient>) -> Self {
        Self { es, store }
    }

    pub(crate) fn status(&self) -> StatusIndex<'_> {
        StatusIndex::new(&self.es)
    }

    /// A unique lock-owner identity for this process invocation.
    pub(crate) fn lock_owner(operation: &str) -> String {
        format!("curator-{}-{}", operation, Uuid::new_v4())
    }

    /// Everything the status subcommand shows: repository records and thaw
    /// requests (terminal ones included).
    pub async fn status_overview(
        &self,
    ) -> Result<(Vec<RepositoryRecord>, Vec<ThawRequest>)> {
        let status = self.status();
        status.ensure().await?;
        let mut repos = status.list_repos().await?;
        repos.sort_by(|a, b| b.suffix.cmp(&a.suffix));
        let requests = status.list_requests(true).await?;
        Ok((repos, requests))
    }

    /// Rescan a mounted repository's snapshots, refreshing the record's
    /// index list and `[earliest, latest]` window.
    pub(crate) async fn rescan_repo(&self, record: &mut RepositoryRecord) -> Result<()> {
        let snapshots = self.es.get_snapshots(&record.name).await?;
        let mut indices: BTreeSet<String> = BTreeSet::new();
        let mut earliest: Option<i64> = None;
        let mut latest: Option<i64> = None;

        for snapshot in &snapshots {
            for index in &snapshot.indices {
                indices.insert(index.clone());
                if let Some(stamp) = index_stamp_ms(index) {
                    earliest = Some(earliest.map_or(stamp, |e: i64| e.min(stamp)));
                    latest = Some(latest.map_or(stamp, |l: i64| l.max(stamp)));
                }
            }
        }

        record.indices = indices.into_iter().collect();
        record.earliest_ms = earliest;
        record.latest_ms = latest;
        debug!(
            repository = %record.name,
            indices = record.indices.len(),
            "rescanned repository snapshots"
        );
        Ok(())
    }
}

/// Epoch milliseconds derived from a trailing date stamp in an index name.
///
/// Daily stamps are tried before monthly ones so `logs-2025.01.15` resolves
/// to the day, not the month. Indices without a parsable stamp contribute
/// nothing to a repository's window.
pub(crate) fn index_stamp_ms(name: &str) -> Option<i64> {
    for timestring in ["%Y.%m.%d", "%Y-%m-%d", "%Y.%m"] {
        if let Ok(Some(epoch)) = parse_name_timestamp(name, timestring) {
            return Some(epoch * 1000);
        }
    }
    None
}
