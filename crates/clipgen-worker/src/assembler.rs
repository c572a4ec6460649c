//! Clip assembly.
//!
//! Segments are handled strictly one after another: download, trim,
//! delete the source, move on. Local disk only ever holds one source
//! segment plus the trimmed parts produced so far. Multi-segment clips
//! are then concatenated from a manifest and the parts removed.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use clipgen_media::{write_concat_manifest, TrimPlan, VideoProcessor, WorkLayout};
use clipgen_storage::AssetStore;

use crate::error::AssemblyError;
use crate::logging::ClipLogger;
use crate::metrics::record_thumbnail_skipped;

/// A finished clip on local disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledClip {
    /// Path of the final artifact
    pub path: PathBuf,
    /// Seek position of the representative frame
    pub thumbnail_offset: String,
    /// Number of segments the clip was built from
    pub segment_count: usize,
}

/// Thumbnails produced for a clip. Widths that failed are absent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Thumbnails {
    pub original: Option<PathBuf>,
    pub resized: Vec<(u32, PathBuf)>,
}

impl Thumbnails {
    /// Widths that were produced.
    pub fn sizes(&self) -> Vec<u32> {
        self.resized.iter().map(|(width, _)| *width).collect()
    }

    /// Every local thumbnail file, original first.
    pub fn files(&self) -> Vec<&Path> {
        self.original
            .iter()
            .map(PathBuf::as_path)
            .chain(self.resized.iter().map(|(_, path)| path.as_path()))
            .collect()
    }
}

/// Builds clip artifacts from trim plans.
#[derive(Clone)]
pub struct ClipAssembler {
    store: Arc<dyn AssetStore>,
    processor: Arc<dyn VideoProcessor>,
}

impl ClipAssembler {
    pub fn new(store: Arc<dyn AssetStore>, processor: Arc<dyn VideoProcessor>) -> Self {
        Self { store, processor }
    }

    /// Assemble the clip described by `plans` (chronological order).
    ///
    /// On failure every intermediate created so far is removed; nothing
    /// partial is left for publication.
    pub async fn assemble(
        &self,
        plans: &[TrimPlan],
        layout: &WorkLayout,
        logger: &ClipLogger,
    ) -> Result<AssembledClip, AssemblyError> {
        let last = plans.last().ok_or(AssemblyError::NoPlans)?;
        let thumbnail_offset = last.window.thumbnail_offset();

        let mut parts: Vec<PathBuf> = Vec::with_capacity(plans.len());
        for (index, plan) in plans.iter().enumerate() {
            if let Err(e) = self.trim_segment(plan).await {
                remove_all(&parts).await;
                remove_best_effort(&plan.output_path).await;
                return Err(e);
            }
            parts.push(plan.output_path.clone());
            logger.log_progress(&format!(
                "segment {}/{} ready: {}",
                index + 1,
                plans.len(),
                plan.segment.name
            ));
        }

        // A lone segment is trimmed straight to the clip path.
        if plans.len() == 1 {
            return Ok(AssembledClip {
                path: last.output_path.clone(),
                thumbnail_offset,
                segment_count: 1,
            });
        }

        let clip_path = layout.clip();
        let manifest = layout.manifest();
        let result = match write_concat_manifest(&manifest, &parts).await {
            Ok(()) => self.processor.concat(&manifest, &clip_path).await,
            Err(e) => Err(e),
        };

        remove_all(&parts).await;
        remove_best_effort(&manifest).await;

        if let Err(source) = result {
            remove_best_effort(&clip_path).await;
            return Err(AssemblyError::Concat { source });
        }

        Ok(AssembledClip {
            path: clip_path,
            thumbnail_offset,
            segment_count: plans.len(),
        })
    }

    /// Download (unless already resident), trim, and delete the source.
    async fn trim_segment(&self, plan: &TrimPlan) -> Result<(), AssemblyError> {
        let segment_id = plan.segment.name.clone();

        if is_resident(&plan.input_path).await {
            debug!(segment = %segment_id, "Source already resident, skipping download");
        } else {
            self.store
                .download_segment(&segment_id, &plan.input_path)
                .await
                .map_err(|source| AssemblyError::Download {
                    segment_id: segment_id.clone(),
                    source,
                })?;
        }

        let trimmed = self.processor.trim(plan).await;
        remove_best_effort(&plan.input_path).await;

        trimmed.map_err(|source| AssemblyError::Trim { segment_id, source })
    }

    /// Extract the representative frame and resize it to each width.
    ///
    /// Never fails: a missing frame yields no thumbnails, a failed resize
    /// drops only that width.
    pub async fn create_thumbnails(
        &self,
        clip: &AssembledClip,
        layout: &WorkLayout,
        widths: &[u32],
        logger: &ClipLogger,
    ) -> Thumbnails {
        let original = layout.thumbnail_original();
        if let Err(e) = self
            .processor
            .extract_frame(&clip.path, &clip.thumbnail_offset, &original)
            .await
        {
            logger.log_warning(&format!(
                "frame extraction at {} failed, publishing without thumbnails: {}",
                clip.thumbnail_offset, e
            ));
            widths.iter().for_each(|w| record_thumbnail_skipped(*w));
            return Thumbnails::default();
        }

        let mut resized = Vec::with_capacity(widths.len());
        for &width in widths {
            let output = layout.thumbnail(width);
            match self.processor.scale(&original, width, &output).await {
                Ok(()) => resized.push((width, output)),
                Err(e) => {
                    logger.log_warning(&format!("thumbnail {} skipped: {}", width, e));
                    record_thumbnail_skipped(width);
                }
            }
        }

        Thumbnails {
            original: Some(original),
            resized,
        }
    }
}

async fn is_resident(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

pub(crate) async fn remove_best_effort(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

async fn remove_all(paths: &[PathBuf]) {
    for path in paths {
        remove_best_effort(path).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use clipgen_media::{plan_segments, MediaError, MediaResult};
    use clipgen_models::SegmentRef;
    use clipgen_storage::{StorageError, StorageResult};

    #[derive(Default)]
    struct DiskStore {
        downloads: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl AssetStore for DiskStore {
        async fn download_segment(&self, segment: &str, dest: &Path) -> StorageResult<PathBuf> {
            if self.fail_on.as_deref() == Some(segment) {
                return Err(StorageError::not_found(segment));
            }
            self.downloads.lock().unwrap().push(segment.to_string());
            tokio::fs::write(dest, segment.as_bytes()).await?;
            Ok(dest.to_path_buf())
        }

        async fn upload_asset(&self, _path: &Path, _key: &str) -> StorageResult<()> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct CopyProcessor {
        manifests: Mutex<Vec<String>>,
        fail_trim: Option<String>,
        fail_concat: bool,
        fail_scale: Option<u32>,
        fail_frame: bool,
    }

    #[async_trait]
    impl VideoProcessor for CopyProcessor {
        async fn trim(&self, plan: &TrimPlan) -> MediaResult<()> {
            tokio::fs::copy(&plan.input_path, &plan.output_path).await?;
            if self.fail_trim.as_deref() == Some(plan.segment.name.as_str()) {
                return Err(MediaError::ffmpeg_failed("trim failed", None, Some(1)));
            }
            Ok(())
        }

        async fn concat(&self, manifest: &Path, output: &Path) -> MediaResult<()> {
            let listing = tokio::fs::read_to_string(manifest).await?;
            self.manifests.lock().unwrap().push(listing);
            tokio::fs::write(output, b"clip").await?;
            if self.fail_concat {
                return Err(MediaError::ffmpeg_failed("concat failed", None, Some(1)));
            }
            Ok(())
        }

        async fn extract_frame(&self, _clip: &Path, _offset: &str, output: &Path) -> MediaResult<()> {
            if self.fail_frame {
                return Err(MediaError::ffmpeg_failed("no frame", None, Some(1)));
            }
            tokio::fs::write(output, b"jpg").await?;
            Ok(())
        }

        async fn scale(&self, _image: &Path, width: u32, output: &Path) -> MediaResult<()> {
            if self.fail_scale == Some(width) {
                return Err(MediaError::ffmpeg_failed("scale failed", None, Some(1)));
            }
            tokio::fs::write(output, b"jpg").await?;
            Ok(())
        }
    }

    fn segments() -> Vec<SegmentRef> {
        vec![
            SegmentRef { name: "cam.3.mp4".to_string(), epoch_ms: 20_000 },
            SegmentRef { name: "cam.2.mp4".to_string(), epoch_ms: 10_000 },
            SegmentRef { name: "cam.1.mp4".to_string(), epoch_ms: 0 },
        ]
    }

    fn logger() -> ClipLogger {
        ClipLogger::new("clip", "cam", "assemble")
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(dir)
            .unwrap()
            .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[tokio::test]
    async fn test_multi_segment_assembly_cleans_intermediates() {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkLayout::new(dir.path(), "clip");
        let plans = plan_segments(&segments(), 5_000, 25_000, &layout).unwrap();

        let store = Arc::new(DiskStore::default());
        let processor = Arc::new(CopyProcessor::default());
        let assembler = ClipAssembler::new(store.clone(), processor.clone());

        let clip = assembler.assemble(&plans, &layout, &logger()).await.unwrap();

        assert_eq!(clip.path, layout.clip());
        assert_eq!(clip.segment_count, 3);
        assert_eq!(*store.downloads.lock().unwrap(), vec!["cam.1.mp4", "cam.2.mp4", "cam.3.mp4"]);
        assert_eq!(file_names(dir.path()), vec!["clip.mp4"]);

        let manifests = processor.manifests.lock().unwrap();
        let lines: Vec<&str> = manifests[0].lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].contains("tmp_cam.1.mp4"));
        assert!(lines[2].contains("tmp_cam.3.mp4"));
    }

    #[tokio::test]
    async fn test_resident_source_is_not_downloaded() {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkLayout::new(dir.path(), "clip");
        let single = vec![SegmentRef { name: "cam.1.mp4".to_string(), epoch_ms: 0 }];
        let plans = plan_segments(&single, 1_000, 4_000, &layout).unwrap();
        std::fs::write(layout.source("cam.1.mp4"), b"already here").unwrap();

        let store = Arc::new(DiskStore::default());
        let assembler = ClipAssembler::new(store.clone(), Arc::new(CopyProcessor::default()));
        let clip = assembler.assemble(&plans, &layout, &logger()).await.unwrap();

        assert!(store.downloads.lock().unwrap().is_empty());
        assert_eq!(clip.path, layout.clip());
        assert_eq!(std::fs::read(layout.clip()).unwrap(), b"already here");
        assert!(!layout.source("cam.1.mp4").exists());
    }

    #[tokio::test]
    async fn test_download_failure_removes_earlier_parts() {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkLayout::new(dir.path(), "clip");
        let plans = plan_segments(&segments(), 5_000, 25_000, &layout).unwrap();

        let store = Arc::new(DiskStore {
            fail_on: Some("cam.2.mp4".to_string()),
            ..Default::default()
        });
        let assembler = ClipAssembler::new(store, Arc::new(CopyProcessor::default()));

        let err = assembler.assemble(&plans, &layout, &logger()).await.unwrap_err();
        assert_eq!(err.segment_id(), Some("cam.2.mp4"));
        assert!(matches!(err, AssemblyError::Download { .. }));
        assert!(file_names(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_concat_failure_removes_parts_manifest_and_partial_clip() {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkLayout::new(dir.path(), "clip");
        let plans = plan_segments(&segments(), 5_000, 25_000, &layout).unwrap();

        let processor = Arc::new(CopyProcessor {
            fail_concat: true,
            ..Default::default()
        });
        let assembler = ClipAssembler::new(Arc::new(DiskStore::default()), processor.clone());

        let err = assembler.assemble(&plans, &layout, &logger()).await.unwrap_err();
        assert!(matches!(err, AssemblyError::Concat { .. }));
        assert_eq!(err.segment_id(), None);
        assert_eq!(processor.manifests.lock().unwrap().len(), 1);
        assert!(file_names(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_trim_failure_removes_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkLayout::new(dir.path(), "clip");
        let plans = plan_segments(&segments(), 5_000, 25_000, &layout).unwrap();

        let processor = Arc::new(CopyProcessor {
            fail_trim: Some("cam.2.mp4".to_string()),
            ..Default::default()
        });
        let assembler = ClipAssembler::new(Arc::new(DiskStore::default()), processor);

        let err = assembler.assemble(&plans, &layout, &logger()).await.unwrap_err();
        assert!(matches!(err, AssemblyError::Trim { .. }));
        assert_eq!(err.segment_id(), Some("cam.2.mp4"));
        assert!(file_names(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_single_segment_trim_failure_leaves_no_clip() {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkLayout::new(dir.path(), "clip");
        let single = vec![SegmentRef { name: "cam.1.mp4".to_string(), epoch_ms: 0 }];
        let plans = plan_segments(&single, 1_000, 4_000, &layout).unwrap();
        assert_eq!(plans[0].output_path, layout.clip());

        let processor = Arc::new(CopyProcessor {
            fail_trim: Some("cam.1.mp4".to_string()),
            ..Default::default()
        });
        let assembler = ClipAssembler::new(Arc::new(DiskStore::default()), processor);

        let err = assembler.assemble(&plans, &layout, &logger()).await.unwrap_err();
        assert!(matches!(err, AssemblyError::Trim { .. }));
        assert!(!layout.clip().exists());
        assert!(file_names(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn test_empty_plans_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkLayout::new(dir.path(), "clip");
        let assembler = ClipAssembler::new(
            Arc::new(DiskStore::default()),
            Arc::new(CopyProcessor::default()),
        );
        let err = assembler.assemble(&[], &layout, &logger()).await.unwrap_err();
        assert!(matches!(err, AssemblyError::NoPlans));
    }

    #[tokio::test]
    async fn test_failed_resize_drops_only_that_width() {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkLayout::new(dir.path(), "clip");
        let processor = Arc::new(CopyProcessor {
            fail_scale: Some(640),
            ..Default::default()
        });
        let assembler = ClipAssembler::new(Arc::new(DiskStore::default()), processor);
        let clip = AssembledClip {
            path: layout.clip(),
            thumbnail_offset: "00:01.000".to_string(),
            segment_count: 1,
        };

        let thumbnails = assembler
            .create_thumbnails(&clip, &layout, &[320, 640, 1280], &logger())
            .await;

        assert_eq!(thumbnails.sizes(), vec![320, 1280]);
        assert_eq!(thumbnails.original, Some(layout.thumbnail_original()));
        assert_eq!(thumbnails.files().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_frame_extraction_yields_no_thumbnails() {
        let dir = tempfile::tempdir().unwrap();
        let layout = WorkLayout::new(dir.path(), "clip");
        let processor = Arc::new(CopyProcessor {
            fail_frame: true,
            ..Default::default()
        });
        let assembler = ClipAssembler::new(Arc::new(DiskStore::default()), processor);
        let clip = AssembledClip {
            path: layout.clip(),
            thumbnail_offset: "00:00.000".to_string(),
            segment_count: 1,
        };

        let thumbnails = assembler.create_thumbnails(&clip, &layout, &[320], &logger()).await;
        assert_eq!(thumbnails, Thumbnails::default());
        assert!(thumbnails.files().is_empty());
    }
}
