//! Camera directory REST client.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use clipgen_models::{segment_name_from_url, ClipMetadata};

use crate::error::{DirectoryError, DirectoryResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, RetryConfig};

/// Camera directory lookups and clip-status publication.
#[async_trait]
pub trait CameraDirectory: Send + Sync {
    /// Resolve the recording alias of a camera.
    async fn resolve_alias(&self, camera_id: &str) -> DirectoryResult<String>;

    /// Segment identifiers recorded by `alias` overlapping the window,
    /// most recent first. An empty list means nothing was found.
    async fn list_segments(
        &self,
        alias: &str,
        window_start_ms: i64,
        window_end_ms: i64,
    ) -> DirectoryResult<Vec<String>>;

    /// Upsert the clip's metadata, keyed by clip id.
    async fn publish_metadata(&self, metadata: &ClipMetadata) -> DirectoryResult<()>;
}

/// Directory client configuration.
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Camera services base URL (aliases, clip records)
    pub cam_services_url: String,
    /// Recordings service base URL
    pub recordings_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
}

impl DirectoryConfig {
    pub fn new(cam_services_url: impl Into<String>, recordings_url: impl Into<String>) -> Self {
        Self {
            cam_services_url: cam_services_url.into(),
            recordings_url: recordings_url.into(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            retry: RetryConfig::default(),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> DirectoryResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> DirectoryResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| DirectoryError::config_error(format!("{} not set", name)))
        };

        let timeout_secs: u64 = lookup("DIRECTORY_TIMEOUT_SECS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(30);

        let mut config = Self::new(required("CAM_SERVICES_URL")?, required("RECORDINGS_URL")?);
        config.timeout = Duration::from_secs(timeout_secs);
        Ok(config)
    }
}

#[derive(Debug, Deserialize)]
struct CameraResponse {
    alias: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordingEntry {
    recording_url: Option<String>,
}

/// HTTP client for the camera services and recordings APIs.
#[derive(Clone)]
pub struct DirectoryClient {
    http: Client,
    config: DirectoryConfig,
}

impl DirectoryClient {
    /// Create a new directory client.
    pub fn new(config: DirectoryConfig) -> DirectoryResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(concat!("clipgen-directory/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { http, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> DirectoryResult<Self> {
        Self::new(DirectoryConfig::from_env()?)
    }

    /// Append percent-encoded path segments to a base URL.
    fn endpoint(base: &str, segments: &[&str]) -> DirectoryResult<Url> {
        let mut url = Url::parse(base)
            .map_err(|e| DirectoryError::config_error(format!("invalid base URL '{}': {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| DirectoryError::config_error(format!("base URL '{}' cannot take a path", base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn error_from_response(url: &str, response: reqwest::Response) -> DirectoryError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        DirectoryError::from_http_status(status, format!("{} failed: {}", url, body))
    }

    async fn fetch_alias(&self, url: &str) -> DirectoryResult<String> {
        let started = Instant::now();
        let response = self.http.get(url).send().await?;
        let status = response.status();
        record_request("resolve_alias", status.as_u16(), started.elapsed().as_secs_f64());

        if !status.is_success() {
            return Err(Self::error_from_response(url, response).await);
        }

        let camera: CameraResponse = response
            .json()
            .await
            .map_err(|e| DirectoryError::invalid_response(format!("{}: {}", url, e)))?;

        camera
            .alias
            .filter(|alias| !alias.is_empty())
            .ok_or_else(|| DirectoryError::invalid_response(format!("{} returned no alias", url)))
    }

    async fn fetch_recordings(&self, url: &str) -> DirectoryResult<Vec<String>> {
        let started = Instant::now();
        let response = self.http.get(url).send().await?;
        let status = response.status();
        record_request("list_segments", status.as_u16(), started.elapsed().as_secs_f64());

        if status == StatusCode::NOT_FOUND || status == StatusCode::NO_CONTENT {
            return Ok(Vec::new());
        }
        if !status.is_success() {
            return Err(Self::error_from_response(url, response).await);
        }

        let body = response.text().await?;
        if body.trim().is_empty() {
            return Ok(Vec::new());
        }

        let entries: Option<Vec<RecordingEntry>> = serde_json::from_str(&body)
            .map_err(|e| DirectoryError::invalid_response(format!("{}: {}", url, e)))?;

        let segments = entries
            .unwrap_or_default()
            .into_iter()
            .filter_map(|entry| match entry.recording_url {
                Some(recording_url) => Some(segment_name_from_url(&recording_url)),
                None => {
                    warn!("{} returned an entry without recordingUrl", url);
                    None
                }
            })
            .filter(|name| !name.is_empty())
            .collect();

        Ok(segments)
    }

    async fn put_metadata(&self, url: &str, metadata: &ClipMetadata) -> DirectoryResult<()> {
        let started = Instant::now();
        let response = self.http.put(url).json(metadata).send().await?;
        let status = response.status();
        record_request("publish_metadata", status.as_u16(), started.elapsed().as_secs_f64());

        if !status.is_success() {
            return Err(Self::error_from_response(url, response).await);
        }
        Ok(())
    }
}

#[async_trait]
impl CameraDirectory for DirectoryClient {
    async fn resolve_alias(&self, camera_id: &str) -> DirectoryResult<String> {
        let url = Self::endpoint(&self.config.cam_services_url, &["cameras", camera_id])?;

        let alias =
            with_retry(&self.config.retry, "resolve_alias", || self.fetch_alias(url.as_str())).await?;
        debug!(camera_id = %camera_id, alias = %alias, "Camera alias resolved");
        Ok(alias)
    }

    async fn list_segments(
        &self,
        alias: &str,
        window_start_ms: i64,
        window_end_ms: i64,
    ) -> DirectoryResult<Vec<String>> {
        let mut url = Self::endpoint(&self.config.recordings_url, &["cameras", "recording", alias])?;
        url.query_pairs_mut()
            .append_pair("startDate", &window_start_ms.to_string())
            .append_pair("endDate", &window_end_ms.to_string())
            .append_pair("allowPartialMatch", "true");

        let segments = with_retry(&self.config.retry, "list_segments", || {
            self.fetch_recordings(url.as_str())
        })
        .await?;

        if segments.is_empty() {
            info!(alias = %alias, "No recordings found for window");
        } else {
            info!(alias = %alias, count = segments.len(), "Retrieved recordings: {:?}", segments);
        }
        Ok(segments)
    }

    async fn publish_metadata(&self, metadata: &ClipMetadata) -> DirectoryResult<()> {
        let url = Self::endpoint(&self.config.cam_services_url, &["clips", &metadata.clip_id])?;

        with_retry(&self.config.retry, "publish_metadata", || {
            self.put_metadata(url.as_str(), metadata)
        })
        .await?;

        info!(clip_id = %metadata.clip_id, status = %metadata.status, "Clip metadata published");
        Ok(())
    }
}
