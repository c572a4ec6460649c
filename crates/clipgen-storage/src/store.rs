//! Asset store seam.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::StorageResult;

/// Where recordings come from and where finished assets go.
///
/// Any error here is a transfer failure and aborts the current step.
#[async_trait]
pub trait AssetStore: Send + Sync {
    /// Fetch recording `segment` from the origin into `dest`.
    async fn download_segment(&self, segment: &str, dest: &Path) -> StorageResult<PathBuf>;

    /// Publish a local file under `key` in the destination.
    async fn upload_asset(&self, path: &Path, key: &str) -> StorageResult<()>;
}

/// Origin key of a recording under the configured prefix.
///
/// # Examples
/// ```
/// use clipgen_storage::origin_key;
/// assert_eq!(origin_key("raw/", "cam.1.mp4"), "raw/cam.1.mp4");
/// assert_eq!(origin_key("", "cam.1.mp4"), "cam.1.mp4");
/// ```
pub fn origin_key(prefix: &str, segment: &str) -> String {
    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        segment.to_string()
    } else {
        format!("{}/{}", prefix, segment)
    }
}

/// Destination key of an asset: `{camera_id}/{file name}`.
pub fn destination_key(camera_id: &str, path: &Path) -> String {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_default();
    format!("{}/{}", camera_id, file_name)
}

/// Content type by file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("mp4") => "video/mp4",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "application/octet-stream",
    }
}
