//! AWS S3 implementation of the object-store seam.
//!
//! Built on the official SDK because deepfreeze needs the Glacier surface:
//! `RestoreObject`, the `Restore` response header, and storage-class
//! transitions via in-place copies.

use async_trait::async_trait;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::types::{
    GlacierJobParameters, MetadataDirective, RestoreRequest, StorageClass as S3StorageClass, Tier,
};
use aws_sdk_s3::Client;
use tracing::{debug, instrument};

use crate::error::{Result, StorageError};
use crate::traits::ObjectStoreClient;
use crate::types::{RestoreStatus, RetrievalTier, StorageClass, StoredObject};

/// Configuration for the S3 adapter.
#[derive(Debug, Clone)]
pub struct S3Config {
    /// AWS region
    pub region: String,
    /// Optional custom endpoint (MinIO, localstack)
    pub endpoint: Option<String>,
    /// Use path-style requests (required for MinIO)
    pub force_path_style: bool,
    /// Optional explicit credentials (else the default provider chain)
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
}

impl S3Config {
    /// Standard AWS configuration for a region.
    pub fn aws(region: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            endpoint: None,
            force_path_style: false,
            access_key_id: None,
            secret_access_key: None,
        }
    }

    /// Configuration for an S3-compatible endpoint.
    pub fn compatible(region: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            region: region.into(),
            endpoint: Some(endpoint.into()),
            force_path_style: true,
            access_key_id: None,
            secret_access_key: None,
        }
    }

    /// Set explicit credentials.
    pub fn with_credentials(
        mut self,
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }
}

/// AWS S3 object-store client.
#[derive(Clone)]
pub struct S3ObjectStore {
    client: Client,
}

impl std::fmt::Debug for S3ObjectStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3ObjectStore").finish()
    }
}

impl S3ObjectStore {
    /// Build a client from configuration plus the ambient credential chain.
    pub async fn new(config: S3Config) -> Result<Self> {
        let mut loader = aws_config::defaults(aws_config::BehaviorVersion::latest());
        if !config.region.is_empty() {
            loader = loader.region(aws_config::Region::new(config.region.clone()));
        }
        let shared = loader.load().await;

        let mut builder = aws_sdk_s3::config::Builder::from(&shared);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }
        if config.force_path_style {
            builder = builder.force_path_style(true);
        }
        if let (Some(key_id), Some(secret)) =
            (&config.access_key_id, &config.secret_access_key)
        {
            builder = builder.credentials_provider(aws_sdk_s3::config::Credentials::new(
                key_id.clone(),
                secret.clone(),
                None,
                None,
                "curator-config",
            ));
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
        })
    }

    /// Wrap an already-built SDK client.
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStoreClient for S3ObjectStore {
    #[instrument(skip(self))]
    async fn ensure_bucket(&self, bucket: &str) -> Result<()> {
        match self.client.create_bucket().bucket(bucket).send().await {
            Ok(_) => {
                debug!(bucket, "created bucket");
                Ok(())
            }
            Err(e) => {
                let service = e.into_service_error();
                if service.is_bucket_already_owned_by_you() || service.is_bucket_already_exists()
                {
                    Ok(())
                } else {
                    Err(StorageError::Request(service.to_string()))
                }
            }
        }
    }

    async fn list_objects(&self, bucket: &str, prefix: &str) -> Result<Vec<StoredObject>> {
        let mut objects = Vec::new();
        let mut pages = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .into_paginator()
            .send();

        while let Some(page) = pages.next().await {
            let page = page.map_err(|e| StorageError::Request(e.to_string()))?;
            for entry in page.contents() {
                let Some(key) = entry.key() else { continue };
                let class = entry
                    .storage_class()
                    .map(|c| c.as_str())
                    .unwrap_or("STANDARD")
                    .parse()
                    .unwrap_or(StorageClass::Standard);
                objects.push(StoredObject {
                    key: key.to_string(),
                    size: entry.size().unwrap_or(0).max(0) as u64,
                    storage_class: class,
                });
            }
        }
        Ok(objects)
    }

    async fn put_object(&self, bucket: &str, key: &str, body: Vec<u8>) -> Result<()> {
        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body.into())
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        Ok(())
    }

    async fn restore_status(&self, bucket: &str, key: &str) -> Result<RestoreStatus> {
        match self
            .client
            .head_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
        {
            Ok(head) => {
                let class = head
                    .storage_class()
                    .map(|c| c.as_str())
                    .unwrap_or("STANDARD")
                    .parse()
                    .unwrap_or(StorageClass::Standard);
                if !class.is_cold() {
                    // Already instantly accessible; nothing to restore.
                    return Ok(RestoreStatus::Restored);
                }
                Ok(RestoreStatus::from_header(head.restore()))
            }
            Err(e) => {
                let service = e.into_service_error();
                if service.is_not_found() {
                    Err(StorageError::NotFound(format!("{}/{}", bucket, key)))
                } else {
                    Err(StorageError::Request(service.to_string()))
                }
            }
        }
    }

    #[instrument(skip(self), fields(tier = %tier))]
    async fn request_restore(
        &self,
        bucket: &str,
        key: &str,
        days: u32,
        tier: RetrievalTier,
    ) -> Result<()> {
        let glacier = GlacierJobParameters::builder()
            .tier(Tier::from(tier.as_str()))
            .build()
            .map_err(|e| StorageError::Config(e.to_string()))?;
        let request = RestoreRequest::builder()
            .days(days as i32)
            .glacier_job_parameters(glacier)
            .build();

        match self
            .client
            .restore_object()
            .bucket(bucket)
            .key(key)
            .restore_request(request)
            .send()
            .await
        {
            Ok(_) => Ok(()),
            Err(e) => match e.code() {
                // A restore for this object is already running.
                Some("RestoreAlreadyInProgress") => Ok(()),
                // Not archived; readable as-is.
                Some("InvalidObjectState") => Ok(()),
                _ => Err(StorageError::Request(e.to_string())),
            },
        }
    }

    #[instrument(skip(self), fields(class = %class))]
    async fn set_storage_class(
        &self,
        bucket: &str,
        key: &str,
        class: StorageClass,
    ) -> Result<()> {
        // Skip the copy when the object is already where it should be.
        if let Ok(head) = self.client.head_object().bucket(bucket).key(key).send().await {
            let current = head
                .storage_class()
                .map(|c| c.as_str())
                .unwrap_or("STANDARD")
                .parse()
                .unwrap_or(StorageClass::Standard);
            if current == class {
                return Ok(());
            }
        }

        self.client
            .copy_object()
            .bucket(bucket)
            .key(key)
            .copy_source(format!("{}/{}", bucket, key))
            .storage_class(S3StorageClass::from(class.as_str()))
            .metadata_directive(MetadataDirective::Copy)
            .send()
            .await
            .map_err(|e| StorageError::Request(e.to_string()))?;
        debug!(bucket, key, class = class.as_str(), "transitioned storage class");
        Ok(())
    }

    fn provider(&self) -> &'static str {
        "aws"
    }
}
