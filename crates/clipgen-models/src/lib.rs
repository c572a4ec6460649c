//! Shared data models for the clip generator.
//!
//! This crate provides:
//! - Validated clip requests parsed from queue payloads
//! - Segment identifiers and their embedded timestamps
//! - Trim-offset and duration arithmetic
//! - Clip lifecycle status and the published metadata record

pub mod clip;
pub mod error;
pub mod request;
pub mod segment;
pub mod timestamp;

pub use clip::{AssetRef, ClipAssets, ClipMetadata, ClipRecord, ClipStatus, FailureReason, ThumbnailRef};
pub use error::{ModelError, ModelResult};
pub use request::{ClipRequest, RequestBody, TriggerEvent};
pub use segment::{segment_name_from_url, SegmentRef};
pub use timestamp::{
    distance_ms, epoch_to_timestamp, humanize_duration, parse_segment_timestamp, window_duration_secs,
    TrimWindow, DEFAULT_TIMESTAMP_FORMAT,
};
