//! Recording segment references.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ModelResult;
use crate::timestamp::parse_segment_timestamp;

/// A resolved source recording and the epoch time it starts at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentRef {
    /// Opaque segment identifier (file name in the origin store)
    pub name: String,
    /// Recording start, epoch milliseconds
    pub epoch_ms: i64,
}

impl SegmentRef {
    /// Parse a segment identifier using the configured timestamp pattern.
    pub fn parse(name: impl Into<String>, timestamp_format: &str) -> ModelResult<Self> {
        let name = name.into();
        let epoch_ms = parse_segment_timestamp(&name, timestamp_format)?;
        Ok(Self { name, epoch_ms })
    }
}

/// Derive a segment identifier from a recording URL or path (its basename).
///
/// # Examples
/// ```
/// use clipgen_models::segment_name_from_url;
/// assert_eq!(
///     segment_name_from_url("https://rec.example.com/a/cam.20180815T140019.mp4?sig=1"),
///     "cam.20180815T140019.mp4"
/// );
/// assert_eq!(segment_name_from_url("a/b/cam.mp4"), "cam.mp4");
/// ```
pub fn segment_name_from_url(recording_url: &str) -> String {
    let path = match Url::parse(recording_url) {
        Ok(url) => url.path().to_string(),
        Err(_) => recording_url
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_string(),
    };

    path.rsplit('/').next().unwrap_or_default().to_string()
}
