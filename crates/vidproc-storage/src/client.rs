//! Bucket client implementation.

use std::path::Path;

use aws_config::{BehaviorVersion, SdkConfig};
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::types::ObjectCannedAcl;
use aws_sdk_s3::Client;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::error::{StorageError, StorageResult};

/// Connection settings for the object store.
#[derive(Debug, Clone, Default)]
pub struct StorageConfig {
    /// Custom S3 API endpoint; the default AWS endpoint is used when unset
    pub endpoint_url: Option<String>,
    /// Static access key ID; the default credential chain is used when unset
    pub access_key_id: Option<String>,
    /// Static secret access key
    pub secret_access_key: Option<String>,
    /// Region; falls back to the SDK region, then to "auto" for custom endpoints
    pub region: Option<String>,
    /// Address buckets by path instead of virtual host
    pub force_path_style: bool,
}

impl StorageConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        let access_key_id = std::env::var("STORAGE_ACCESS_KEY_ID").ok();
        let secret_access_key = std::env::var("STORAGE_SECRET_ACCESS_KEY").ok();

        if access_key_id.is_some() != secret_access_key.is_some() {
            return Err(StorageError::config_error(
                "STORAGE_ACCESS_KEY_ID and STORAGE_SECRET_ACCESS_KEY must be set together",
            ));
        }

        let endpoint_url = std::env::var("STORAGE_ENDPOINT_URL").ok();

        Ok(Self {
            force_path_style: std::env::var("STORAGE_FORCE_PATH_STYLE")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(endpoint_url.is_some()),
            endpoint_url,
            access_key_id,
            secret_access_key,
            region: std::env::var("STORAGE_REGION").ok(),
        })
    }

    /// Build an S3 client for this configuration.
    pub async fn connect(&self) -> Client {
        let sdk_config = aws_config::defaults(BehaviorVersion::latest()).load().await;
        Client::from_conf(self.client_config(&sdk_config))
    }

    /// S3 client settings layered over the shared SDK settings.
    pub fn client_config(&self, sdk_config: &SdkConfig) -> aws_sdk_s3::Config {
        let mut builder = Builder::from(sdk_config).force_path_style(self.force_path_style);

        if let Some(endpoint) = &self.endpoint_url {
            builder = builder.endpoint_url(endpoint);
        }
        if let Some(region) = self.resolve_region(sdk_config.region()) {
            builder = builder.region(region);
        }
        if let (Some(key), Some(secret)) = (&self.access_key_id, &self.secret_access_key) {
            builder =
                builder.credentials_provider(Credentials::new(key, secret, None, None, "static"));
        }

        builder.build()
    }

    /// Configured region, else the SDK's, else "auto" when a custom endpoint is set.
    fn resolve_region(&self, sdk_region: Option<&Region>) -> Option<Region> {
        match (&self.region, sdk_region) {
            (Some(region), _) => Some(Region::new(region.clone())),
            (None, Some(region)) => Some(region.clone()),
            (None, None) if self.endpoint_url.is_some() => Some(Region::new("auto")),
            (None, None) => None,
        }
    }
}

/// Client scoped to one bucket.
#[derive(Clone, Debug)]
pub struct BucketClient {
    client: Client,
    bucket: String,
}

impl BucketClient {
    pub fn new(client: Client, bucket: impl Into<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
        }
    }

    /// Download an object to a local file, streaming the body to disk.
    pub async fn download_file(&self, key: &str, path: impl AsRef<Path>) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("Downloading {}/{} to {}", self.bucket, key, path.display());

        let response = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StorageError::not_found(format!("{}/{}", self.bucket, key))
                } else {
                    StorageError::download_failed(e.to_string())
                }
            })?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(path).await?;
        let body = response.body.into_async_read();
        tokio::pin!(body);
        tokio::io::copy(&mut body, &mut file)
            .await
            .map_err(|e| StorageError::download_failed(format!("Failed to write file: {}", e)))?;
        file.flush().await?;

        info!("{}/{} downloaded to {}", self.bucket, key, path.display());
        Ok(())
    }

    /// Upload a local file.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("Uploading {} to {}/{}", path.display(), self.bucket, key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        info!("{} uploaded to {}/{}", path.display(), self.bucket, key);
        Ok(())
    }

    /// Grant anonymous read access to an object.
    pub async fn make_public(&self, key: &str) -> StorageResult<()> {
        self.client
            .put_object_acl()
            .bucket(&self.bucket)
            .key(key)
            .acl(ObjectCannedAcl::PublicRead)
            .send()
            .await
            .map_err(|e| StorageError::AclFailed(e.to_string()))?;

        debug!("{}/{} is now publicly readable", self.bucket, key);
        Ok(())
    }

    /// Check connectivity by performing a head bucket operation.
    pub async fn check_connectivity(&self) -> StorageResult<()> {
        self.client
            .head_bucket()
            .bucket(&self.bucket)
            .send()
            .await
            .map_err(|e| {
                StorageError::AwsSdk(format!("Connectivity check for {} failed: {}", self.bucket, e))
            })?;
        Ok(())
    }
}

/// Content type for an object key, by extension.
pub fn content_type_for(key: &str) -> &'static str {
    let ext = Path::new(key)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);

    match ext.as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("mov") => "video/quicktime",
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("avi") => "video/x-msvideo",
        _ => "application/octet-stream",
    }
}
