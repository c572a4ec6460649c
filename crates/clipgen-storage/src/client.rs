//! S3 client implementation.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::store::{content_type_for, origin_key, AssetStore};

/// Configuration for the S3 client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    /// Custom S3 API endpoint (MinIO, R2, localstack)
    pub endpoint_url: Option<String>,
    /// Region
    pub region: String,
    /// Static access key; the default provider chain is used when absent
    pub access_key_id: Option<String>,
    /// Static secret key
    pub secret_access_key: Option<String>,
    /// Bucket holding raw recordings
    pub origin_bucket: String,
    /// Key prefix of recordings inside the origin bucket
    pub origin_prefix: String,
    /// Bucket clips and thumbnails are published to
    pub destination_bucket: String,
}

impl S3Config {
    /// Create config from environment variables.
    pub fn from_env() -> StorageResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> StorageResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| StorageError::config_error(format!("{} not set", name)))
        };

        Ok(Self {
            endpoint_url: lookup("S3_ENDPOINT_URL").filter(|v| !v.is_empty()),
            region: lookup("S3_REGION").unwrap_or_else(|| "us-east-1".to_string()),
            access_key_id: lookup("S3_ACCESS_KEY_ID").filter(|v| !v.is_empty()),
            secret_access_key: lookup("S3_SECRET_ACCESS_KEY").filter(|v| !v.is_empty()),
            origin_bucket: required("S3_BUCKET_ORIGIN")?,
            origin_prefix: lookup("S3_BUCKET_ORIGIN_DIR").unwrap_or_default(),
            destination_bucket: required("S3_BUCKET_DESTINATION")?,
        })
    }
}

/// S3 asset store reading recordings from the origin bucket and
/// publishing assets to the destination bucket.
#[derive(Clone)]
pub struct S3Client {
    client: Client,
    origin_bucket: String,
    origin_prefix: String,
    destination_bucket: String,
}

impl S3Client {
    /// Create a new S3 client from configuration.
    pub async fn new(config: S3Config) -> StorageResult<Self> {
        let mut builder = match (&config.access_key_id, &config.secret_access_key) {
            (Some(access_key_id), Some(secret_access_key)) => {
                let credentials =
                    Credentials::new(access_key_id, secret_access_key, None, None, "static");
                Builder::new()
                    .behavior_version(BehaviorVersion::latest())
                    .region(Region::new(config.region.clone()))
                    .credentials_provider(credentials)
            }
            (None, None) => {
                let sdk_config = aws_config::defaults(BehaviorVersion::latest())
                    .region(Region::new(config.region.clone()))
                    .load()
                    .await;
                Builder::from(&sdk_config)
            }
            _ => {
                return Err(StorageError::config_error(
                    "S3_ACCESS_KEY_ID and S3_SECRET_ACCESS_KEY must be set together",
                ))
            }
        };

        if let Some(endpoint_url) = &config.endpoint_url {
            builder = builder.endpoint_url(endpoint_url).force_path_style(true);
        }

        Ok(Self {
            client: Client::from_conf(builder.build()),
            origin_bucket: config.origin_bucket,
            origin_prefix: config.origin_prefix,
            destination_bucket: config.destination_bucket,
        })
    }

    /// Create from environment variables.
    pub async fn from_env() -> StorageResult<Self> {
        let config = S3Config::from_env()?;
        Self::new(config).await
    }

    /// Destination bucket name, as advertised in clip metadata.
    pub fn destination_bucket(&self) -> &str {
        &self.destination_bucket
    }

    /// Stream an object to a local file.
    pub async fn download_file(
        &self,
        bucket: &str,
        key: &str,
        path: impl AsRef<Path>,
    ) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("Downloading s3://{}/{} to {}", bucket, key, path.display());

        let response = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| {
                let service_error = e.into_service_error();
                if service_error.is_no_such_key() {
                    StorageError::not_found(key)
                } else {
                    StorageError::download_failed(service_error.to_string())
                }
            })?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut file = tokio::fs::File::create(path).await?;
        let mut body = response.body.into_async_read();
        if let Err(e) = tokio::io::copy(&mut body, &mut file).await {
            drop(file);
            if let Err(cleanup) = tokio::fs::remove_file(path).await {
                warn!("Failed to remove partial download {}: {}", path.display(), cleanup);
            }
            return Err(StorageError::download_failed(format!(
                "Failed to write {}: {}",
                path.display(),
                e
            )));
        }

        info!("Downloaded s3://{}/{} to {}", bucket, key, path.display());
        Ok(())
    }

    /// Upload a local file.
    pub async fn upload_file(
        &self,
        bucket: &str,
        path: impl AsRef<Path>,
        key: &str,
        content_type: &str,
    ) -> StorageResult<()> {
        let path = path.as_ref();
        debug!("Uploading {} to s3://{}/{}", path.display(), bucket, key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| StorageError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| StorageError::upload_failed(e.into_service_error().to_string()))?;

        info!("Uploaded {} to s3://{}/{}", path.display(), bucket, key);
        Ok(())
    }
}

#[async_trait]
impl AssetStore for S3Client {
    async fn download_segment(&self, segment: &str, dest: &Path) -> StorageResult<PathBuf> {
        let key = origin_key(&self.origin_prefix, segment);
        self.download_file(&self.origin_bucket, &key, dest).await?;
        Ok(dest.to_path_buf())
    }

    async fn upload_asset(&self, path: &Path, key: &str) -> StorageResult<()> {
        self.upload_file(&self.destination_bucket, path, key, content_type_for(path))
            .await
    }
}
