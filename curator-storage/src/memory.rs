//! In-memory object store for tests.
//!
//! Behaves like the S3 adapter from the caller's point of view, with knobs
//! to drive restores forward: a requested restore stays `InProgress` until
//! the test calls [`MemoryObjectStore::complete_restores`].

use std::collections::BTreeMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Result, StorageError};
use crate::traits::ObjectStoreClient;
use crate::types::{RestoreStatus, RetrievalTier, StorageClass, StoredObject};

#[derive(Debug, Clone)]
struct MockObject {
    size: u64,
    storage_class: StorageClass,
    restore: Option<RestoreState>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RestoreState {
    ongoing: bool,
}

#[derive(Debug, Default)]
struct Inner {
    buckets: BTreeMap<String, BTreeMap<String, MockObject>>,
    restore_requests: Vec<(String, String, u32, RetrievalTier)>,
}

/// In-memory [`ObjectStoreClient`] implementation.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    inner: Mutex<Inner>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object with a size and storage class.
    pub fn seed_object(&self, bucket: &str, key: &str, size: u64, class: StorageClass) {
        let mut inner = self.inner.lock();
        inner
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(
                key.to_string(),
                MockObject {
                    size,
                    storage_class: class,
                    restore: None,
                },
            );
    }

    /// Flip every in-progress restore to completed.
    pub fn complete_restores(&self) {
        let mut inner = self.inner.lock();
        for bucket in inner.buckets.values_mut() {
            for object in bucket.values_mut() {
                if let Some(restore) = &mut object.restore {
                    restore.ongoing = false;
                }
            }
        }
    }

    /// Drop restored copies, as S3 does after `days` elapse.
    pub fn expire_restores(&self) {
        let mut inner = self.inner.lock();
        for bucket in inner.buckets.values_mut() {
            for object in bucket.values_mut() {
                object.restore = None;
            }
        }
    }

    /// Every restore request issued so far: `(bucket, key, days, tier)`.
    pub fn restore_requests(&self) -> Vec<(String, String, u32, RetrievalTier)> {
        self.inner.lock().restore_requests.clone()
    }

    /// Storage class of a seeded object.
    pub fn storage_class_of(&self, bucket: &str, key: &str) -> Option<StorageClass> {
        self.inner
            .lock()
            .buckets
            .get(bucket)
            .and_then(|b| b.get(key))
            .map(|o| o.storage_class)
    }

    pub fn bucket_exists(&self, bucket: &str) -> bool {
        self.inner.lock().buckets.contains_key(bucket)
    }
}

#[async_trait]
impl ObjectStoreClient for MemoryObjectStore {
    async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
        self.inner
            .lock()
            .buckets
            .entry(bucket.to_string())
            .or_default();
        Ok(())
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<StoredObject>> {
        let inner = self.inner.lock();
        let Some(objects) = inner.buckets.get(bucket) else {
            return Ok(Vec::new());
        };
        Ok(objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| StoredObject {
                key: key.clone(),
                size: object.size,
                storage_class: object.storage_class,
            })
            .collect())
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        let mut inner = self.inner.lock();
        inner
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(
                key.to_string(),
                MockObject {
                    size: body.len() as u64,
                    storage_class: StorageClass::Standard,
                    restore: None,
                },
            );
        Ok(())
    }

    async fn restore_status(&self, bucket: &str, key: &str) -> Result<RestoreStatus> {
        let inner = self.inner.lock();
        let object = inner
            .buckets
            .get(bucket)
            .and_then(|b| b.get(key))
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}", bucket, key)))?;
        if !object.storage_class.is_cold() {
            return Ok(RestoreStatus::Restored);
        }
        Ok(match &object.restore {
            None => RestoreStatus::NotRestored,
            Some(state) if state.ongoing => RestoreStatus::InProgress,
            Some(_) => RestoreStatus::Restored,
        })
    }

    async fn request_restore(
        &self,
        bucket: &str,
        key: &str,
        days: u32,
        tier: RetrievalTier,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        inner
            .restore_requests
            .push((bucket.to_string(), key.to_string(), days, tier));
        let object = inner
            .buckets
            .get_mut(bucket)
            .and_then(|b| b.get_mut(key))
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}", bucket, key)))?;
        if object.restore.is_none() {
            object.restore = Some(RestoreState { ongoing: true });
        }
        Ok(())
    }

    async fn set_storage_class(
        &self,
        bucket: &str,
        key: &str,
        class: StorageClass,
    ) -> Result<()> {
        let mut inner = self.inner.lock();
        let object = inner
            .buckets
            .get_mut(bucket)
            .and_then(|b| b.get_mut(key))
            .ok_or_else(|| StorageError::NotFound(format!("{}/{}", bucket, key)))?;
        if object.storage_class != class {
            object.storage_class = class;
            object.restore = None;
        }
        Ok(())
    }

    fn provider(&self) -> &'static str {
        "memory"
    }
}
