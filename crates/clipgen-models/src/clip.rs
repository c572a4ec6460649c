//! Clip lifecycle status and published metadata.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::request::ClipRequest;

/// Lifecycle status of a clip, as published downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClipStatus {
    /// Footage not available yet; the request was re-enqueued
    #[serde(rename = "CLIP_PENDING")]
    Pending,
    /// Clip assembled and uploaded
    #[serde(rename = "CLIP_AVAILABLE")]
    Available,
    /// Requested window exceeds the maximum clip length
    #[serde(rename = "CLIP_TOO_LONG")]
    TooLong,
    /// Footage window passed without any recording showing up
    #[serde(rename = "CLIP_NOT_AVAILABLE")]
    NotAvailable,
    /// Window is too old to ever be served
    #[serde(rename = "CLIP_OUT_OF_RANGE")]
    OutOfRange,
    /// Retry budget exhausted
    #[serde(rename = "CLIP_RETRY_TIMEOUT")]
    RetryTimeout,
    /// Footage existed but could not be processed
    #[serde(rename = "FATAL_ERROR")]
    FatalError,
}

impl ClipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipStatus::Pending => "CLIP_PENDING",
            ClipStatus::Available => "CLIP_AVAILABLE",
            ClipStatus::TooLong => "CLIP_TOO_LONG",
            ClipStatus::NotAvailable => "CLIP_NOT_AVAILABLE",
            ClipStatus::OutOfRange => "CLIP_OUT_OF_RANGE",
            ClipStatus::RetryTimeout => "CLIP_RETRY_TIMEOUT",
            ClipStatus::FatalError => "FATAL_ERROR",
        }
    }

    /// Everything except `Pending` ends the current attempt.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, ClipStatus::Pending)
    }
}

impl std::fmt::Display for ClipStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a clip could not be produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    TooLong,
    NotAvailable,
    OutOfRange,
    RetryTimeout,
    FatalError,
}

impl FailureReason {
    pub fn status(&self) -> ClipStatus {
        match self {
            FailureReason::TooLong => ClipStatus::TooLong,
            FailureReason::NotAvailable => ClipStatus::NotAvailable,
            FailureReason::OutOfRange => ClipStatus::OutOfRange,
            FailureReason::RetryTimeout => ClipStatus::RetryTimeout,
            FailureReason::FatalError => ClipStatus::FatalError,
        }
    }
}

/// Storage key plus public URL of an uploaded asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetRef {
    pub key: String,
    pub url: String,
}

/// Thumbnail location template (`{size}` placeholder) and produced widths.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThumbnailRef {
    pub key: String,
    pub url: String,
    pub sizes: Vec<u32>,
}

/// Addresses of a published clip and its thumbnails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClipAssets {
    pub bucket: String,
    pub clip: AssetRef,
    pub thumbnail: ThumbnailRef,
}

impl ClipAssets {
    /// Locate the assets of `clip_id` under `camera_id`.
    ///
    /// Keys are absolute paths, so they replace any path on `base_url`.
    pub fn locate(
        bucket: impl Into<String>,
        base_url: &Url,
        camera_id: &str,
        clip_id: &str,
        thumbnail_sizes: Vec<u32>,
    ) -> Self {
        let clip_key = format!("/{}/{}.mp4", camera_id, clip_id);
        let thumbnail_key = format!("/{}/{}_{{size}}.jpg", camera_id, clip_id);

        Self {
            bucket: bucket.into(),
            clip: AssetRef {
                url: join_absolute(base_url, &clip_key),
                key: clip_key,
            },
            thumbnail: ThumbnailRef {
                url: join_absolute(base_url, &thumbnail_key),
                key: thumbnail_key,
                sizes: thumbnail_sizes,
            },
        }
    }
}

fn join_absolute(base: &Url, key: &str) -> String {
    format!("{}{}", base.origin().ascii_serialization(), key)
}

/// Outcome of one attempt, built once and never partially torn down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipRecord {
    /// Re-enqueued; nothing addressable exists yet
    Pending,
    /// Clip published at the given addresses
    Available(ClipAssets),
    /// Terminal failure; carries no asset addresses
    Failed(FailureReason),
}

impl ClipRecord {
    pub fn status(&self) -> ClipStatus {
        match self {
            ClipRecord::Pending => ClipStatus::Pending,
            ClipRecord::Available(_) => ClipStatus::Available,
            ClipRecord::Failed(reason) => reason.status(),
        }
    }
}

/// Metadata document published to the camera directory and notification topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipMetadata {
    pub clip_id: String,
    pub camera_id: String,
    pub start_timestamp_in_ms: i64,
    pub end_timestamp_in_ms: i64,
    pub status: ClipStatus,
    pub retry_timestamps: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub clip: Option<AssetRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<ThumbnailRef>,
}

impl ClipMetadata {
    /// Build the published document for `request` and its outcome.
    pub fn new(request: &ClipRequest, retry_timestamps: Vec<i64>, record: &ClipRecord) -> Self {
        let (bucket, clip, thumbnail) = match record {
            ClipRecord::Available(assets) => (
                Some(assets.bucket.clone()),
                Some(assets.clip.clone()),
                Some(assets.thumbnail.clone()),
            ),
            ClipRecord::Pending | ClipRecord::Failed(_) => (None, None, None),
        };

        Self {
            clip_id: request.clip_id.clone(),
            camera_id: request.camera_id.clone(),
            start_timestamp_in_ms: request.start_timestamp_ms,
            end_timestamp_in_ms: request.end_timestamp_ms,
            status: record.status(),
            retry_timestamps,
            bucket,
            clip,
            thumbnail,
        }
    }

    /// Whether the document advertises any asset address.
    pub fn has_assets(&self) -> bool {
        self.bucket.is_some() || self.clip.is_some() || self.thumbnail.is_some()
    }
}
