//! Worker configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use url::Url;

use clipgen_models::DEFAULT_TIMESTAMP_FORMAT;

use crate::error::{WorkerError, WorkerResult};
use crate::lifecycle::RetryPolicy;

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Local working storage, emptied before every request
    pub work_dir: PathBuf,
    /// strftime pattern of the timestamp embedded in segment names
    pub timestamp_format: String,
    /// Delay before a pending request is retried (seconds)
    pub retry_timeout_secs: u64,
    /// Age past which missing footage is reported as not available (seconds)
    pub retry_limit_secs: u64,
    /// Age past which missing footage is reported as out of range (seconds)
    pub out_of_range_secs: u64,
    /// Longest window that will be assembled (seconds)
    pub max_clip_len_secs: u64,
    /// Thumbnail widths produced for every clip
    pub thumbnail_sizes: Vec<u32>,
    /// Public base URL of the destination bucket
    pub clip_base_url: Url,
    /// Explicit ffmpeg binary; resolved from PATH when absent
    pub ffmpeg_path: Option<PathBuf>,
    /// Redis pub/sub channel clip metadata is announced on
    pub notify_channel: String,
    /// Prometheus listener; metrics are not exported when absent
    pub metrics_addr: Option<SocketAddr>,
    /// How often delayed retries are promoted and stale deliveries reclaimed
    pub claim_interval: Duration,
    /// How long one stream read blocks waiting for a request
    pub poll_block: Duration,
}

impl WorkerConfig {
    /// Configuration with defaults for everything but the clip URL.
    pub fn new(clip_base_url: Url) -> Self {
        Self {
            work_dir: PathBuf::from("/tmp/clipgen"),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
            retry_timeout_secs: 300,
            retry_limit_secs: 900,
            out_of_range_secs: 259_200, // 3 days
            max_clip_len_secs: 300,
            thumbnail_sizes: vec![320, 640],
            clip_base_url,
            ffmpeg_path: None,
            notify_channel: "clipgen:clips".to_string(),
            metrics_addr: None,
            claim_interval: Duration::from_secs(30),
            poll_block: Duration::from_secs(5),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> WorkerResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> WorkerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let secs = |name: &str, default: u64| -> WorkerResult<u64> {
            match var(name) {
                Some(raw) => raw.trim().parse().map_err(|_| {
                    WorkerError::config(format!("{} must be a number of seconds, got '{}'", name, raw))
                }),
                None => Ok(default),
            }
        };

        let clip_url = var("CLIP_URL").ok_or_else(|| WorkerError::config("CLIP_URL not set"))?;
        let clip_base_url = Url::parse(&clip_url)
            .map_err(|e| WorkerError::config(format!("CLIP_URL '{}' is invalid: {}", clip_url, e)))?;

        let defaults = Self::new(clip_base_url);

        let thumbnail_sizes = match var("THUMBNAIL_SIZES") {
            Some(raw) => parse_sizes(&raw)?,
            None => defaults.thumbnail_sizes.clone(),
        };

        let metrics_addr = match var("METRICS_ADDR") {
            Some(raw) => Some(raw.parse().map_err(|_| {
                WorkerError::config(format!("METRICS_ADDR '{}' is not a socket address", raw))
            })?),
            None => None,
        };

        let config = Self {
            work_dir: var("CLIP_DOWNLOAD_DEST")
                .map(PathBuf::from)
                .unwrap_or_else(|| defaults.work_dir.clone()),
            timestamp_format: var("TIMESTAMP_FORMAT")
                .unwrap_or_else(|| defaults.timestamp_format.clone()),
            retry_timeout_secs: secs("SQS_TIMEOUT", defaults.retry_timeout_secs)?,
            retry_limit_secs: secs("SQS_RETRY_LIMIT", defaults.retry_limit_secs)?,
            out_of_range_secs: secs("OUT_OF_RANGE_LIMIT", defaults.out_of_range_secs)?,
            max_clip_len_secs: secs("VIDEO_MAX_LEN", defaults.max_clip_len_secs)?,
            thumbnail_sizes,
            ffmpeg_path: var("FFMPEG_PATH").map(PathBuf::from),
            notify_channel: var("NOTIFY_CHANNEL").unwrap_or_else(|| defaults.notify_channel.clone()),
            metrics_addr,
            claim_interval: Duration::from_secs(secs(
                "WORKER_CLAIM_INTERVAL",
                defaults.claim_interval.as_secs(),
            )?),
            poll_block: Duration::from_secs(secs("WORKER_POLL_BLOCK", defaults.poll_block.as_secs())?),
            clip_base_url: defaults.clip_base_url,
        };

        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the lifecycle rules cannot work with.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.work_dir.as_os_str().is_empty() {
            return Err(WorkerError::config("work directory must not be empty"));
        }
        if self.retry_timeout_secs == 0 {
            return Err(WorkerError::config("SQS_TIMEOUT must be greater than zero"));
        }
        if self.retry_limit_secs > self.out_of_range_secs {
            return Err(WorkerError::config(format!(
                "SQS_RETRY_LIMIT ({}) exceeds OUT_OF_RANGE_LIMIT ({})",
                self.retry_limit_secs, self.out_of_range_secs
            )));
        }
        if self.thumbnail_sizes.contains(&0) {
            return Err(WorkerError::config("thumbnail widths must be positive"));
        }
        if self.claim_interval.is_zero() {
            return Err(WorkerError::config("claim interval must be positive"));
        }
        Ok(())
    }

    /// Lifecycle thresholds derived from this configuration.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            retry_timeout_secs: self.retry_timeout_secs,
            retry_limit_secs: self.retry_limit_secs,
            out_of_range_secs: self.out_of_range_secs,
            max_clip_len_secs: self.max_clip_len_secs,
        }
    }
}

/// Widths separated by spaces or commas.
fn parse_sizes(raw: &str) -> WorkerResult<Vec<u32>> {
    raw.split(|c: char| c.is_whitespace() || c == ',')
        .filter(|token| !token.is_empty())
        .map(|token| {
            token.parse::<u32>().map_err(|_| {
                WorkerError::config(format!("THUMBNAIL_SIZES entry '{}' is not a width", token))
            })
        })
        .collect()
}
