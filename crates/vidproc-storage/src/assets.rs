//! Remote asset capability.

use std::path::Path;

use async_trait::async_trait;
use aws_sdk_s3::Client;
use vidproc_models::{PROCESSED_BUCKET, RAW_BUCKET};

use crate::client::{content_type_for, BucketClient};
use crate::error::StorageResult;

/// Moves video objects between the object store and local disk.
#[async_trait]
pub trait RemoteAssets: Send + Sync {
    /// Download the raw object `key` to `destination`.
    async fn fetch(&self, key: &str, destination: &Path) -> StorageResult<()>;

    /// Upload `source` as the processed object `key` and make it publicly readable.
    ///
    /// A failure at any point fails the whole call.
    async fn publish(&self, source: &Path, key: &str) -> StorageResult<()>;

    /// Verify the backing store is reachable.
    async fn check_connectivity(&self) -> StorageResult<()>;
}

/// `RemoteAssets` over a raw-intake bucket and a processed-output bucket.
#[derive(Clone, Debug)]
pub struct BucketAssets {
    raw: BucketClient,
    processed: BucketClient,
}

impl BucketAssets {
    pub fn new(raw: BucketClient, processed: BucketClient) -> Self {
        Self { raw, processed }
    }

    /// Use the deployment's fixed bucket names.
    pub fn with_default_buckets(client: Client) -> Self {
        Self::new(
            BucketClient::new(client.clone(), RAW_BUCKET),
            BucketClient::new(client, PROCESSED_BUCKET),
        )
    }
}

#[async_trait]
impl RemoteAssets for BucketAssets {
    async fn fetch(&self, key: &str, destination: &Path) -> StorageResult<()> {
        self.raw.download_file(key, destination).await
    }

    async fn publish(&self, source: &Path, key: &str) -> StorageResult<()> {
        self.processed
            .upload_file(source, key, content_type_for(key))
            .await?;
        self.processed.make_public(key).await
    }

    async fn check_connectivity(&self) -> StorageResult<()> {
        self.raw.check_connectivity().await?;
        self.processed.check_connectivity().await
    }
}
