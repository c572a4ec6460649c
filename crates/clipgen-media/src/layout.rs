//! Local working-storage layout for one clip.

use std::path::PathBuf;

/// File locations used while assembling a single clip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkLayout {
    root: PathBuf,
    clip_id: String,
}

impl WorkLayout {
    pub fn new(root: impl Into<PathBuf>, clip_id: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            clip_id: clip_id.into(),
        }
    }

    /// Downloaded source segment.
    pub fn source(&self, segment: &str) -> PathBuf {
        self.root.join(segment)
    }

    /// Trimmed intermediate of a segment.
    pub fn trimmed(&self, segment: &str) -> PathBuf {
        self.root.join(format!("tmp_{}", segment))
    }

    /// Final clip artifact.
    pub fn clip(&self) -> PathBuf {
        self.root.join(format!("{}.mp4", self.clip_id))
    }

    /// Concat manifest listing the trimmed parts.
    pub fn manifest(&self) -> PathBuf {
        self.root.join(format!("{}_concat.txt", self.clip_id))
    }

    /// Full-resolution frame the thumbnails are resized from.
    pub fn thumbnail_original(&self) -> PathBuf {
        self.root.join(format!("{}_original.jpg", self.clip_id))
    }

    /// Resized thumbnail of the given width.
    pub fn thumbnail(&self, width: u32) -> PathBuf {
        self.root.join(format!("{}_{}.jpg", self.clip_id, width))
    }
}
