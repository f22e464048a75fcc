//! The object-store seam between deepfreeze and the cloud provider.

use async_trait::async_trait;

use crate::error::Result;
use crate::types::{RestoreStatus, RetrievalTier, StorageClass, StoredObject};

/// Operations deepfreeze performs against an object store.
///
/// Implemented for AWS S3 in [`crate::s3::S3ObjectStore`] and for tests in
/// [`crate::memory::MemoryObjectStore`].
#[async_trait]
pub trait ObjectStoreClient: Send + Sync {
    /// Create a bucket unless it already exists (owned by us).
    async fn ensure_bucket(&self, bucket: &str) -> Result<()>;

    /// List all objects under a prefix.
    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<StoredObject>>;

    /// Write a small object (path markers, probes).
    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()>;

    /// Restore state of one archived object.
    async fn restore_status(&self, bucket: &str, key: &str) -> Result<RestoreStatus>;

    /// Request a temporary restore of an archived object.
    ///
    /// Requesting a restore that is already running is a no-op.
    async fn request_restore(
        &self,
        bucket: &str,
        key: &str,
        days: u32,
        tier: RetrievalTier,
    ) -> Result<()>;

    /// Transition one object to a storage class via an in-place copy.
    ///
    /// A no-op when the object already sits in the target class.
    async fn set_storage_class(
        &self,
        bucket: &str,
        key: &str,
        class: StorageClass,
    ) -> Result<()>;

    /// Provider name, for logs.
    fn provider(&self) -> &'static str;
}
