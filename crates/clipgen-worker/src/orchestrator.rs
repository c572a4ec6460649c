//! Request orchestration.
//!
//! One call to [`ClipOrchestrator::process`] drives a request from intake
//! to its published outcome: length check, footage lookup, planning,
//! assembly, upload and metadata publication, or the retry decision when
//! no footage exists yet. Expected outcomes (pending, terminal statuses)
//! are returned as `Ok`; only malformed input and hard failures are
//! errors.

use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use tracing::{warn, Instrument};

use clipgen_directory::CameraDirectory;
use clipgen_media::{plan_segments, MediaError, TrimPlan, VideoProcessor, WorkLayout};
use clipgen_models::{
    epoch_to_timestamp, ClipAssets, ClipMetadata, ClipRecord, ClipRequest, ClipStatus,
    FailureReason, SegmentRef,
};
use clipgen_queue::{Notifier, RetryPublisher};
use clipgen_storage::{destination_key, AssetStore};

use crate::assembler::{remove_best_effort, ClipAssembler};
use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::lifecycle::{RetryDecision, RetryPolicy};
use crate::logging::ClipLogger;
use crate::metrics::{record_assembly, record_clip, record_rejected, record_retry_scheduled};

/// External services a request depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub directory: Arc<dyn CameraDirectory>,
    pub store: Arc<dyn AssetStore>,
    pub processor: Arc<dyn VideoProcessor>,
    pub retry_publisher: Arc<dyn RetryPublisher>,
    pub notifier: Arc<dyn Notifier>,
}

/// Drives clip requests to completion.
pub struct ClipOrchestrator {
    config: WorkerConfig,
    policy: RetryPolicy,
    destination_bucket: String,
    directory: Arc<dyn CameraDirectory>,
    store: Arc<dyn AssetStore>,
    retry_publisher: Arc<dyn RetryPublisher>,
    notifier: Arc<dyn Notifier>,
    assembler: ClipAssembler,
}

impl ClipOrchestrator {
    pub fn new(
        config: WorkerConfig,
        destination_bucket: impl Into<String>,
        collaborators: Collaborators,
    ) -> Self {
        Self {
            policy: config.retry_policy(),
            config,
            destination_bucket: destination_bucket.into(),
            assembler: ClipAssembler::new(
                Arc::clone(&collaborators.store),
                Arc::clone(&collaborators.processor),
            ),
            directory: collaborators.directory,
            store: collaborators.store,
            retry_publisher: collaborators.retry_publisher,
            notifier: collaborators.notifier,
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Parse a raw queue message and process it.
    pub async fn handle_message(&self, body: &str, sent_timestamp: &str) -> WorkerResult<ClipMetadata> {
        let request = ClipRequest::parse(body, sent_timestamp).map_err(|e| {
            warn!("Rejecting request: {}", e);
            record_rejected();
            e
        })?;
        self.process(&request).await
    }

    /// Parse a queue-trigger envelope and process its first record.
    pub async fn handle_event(&self, event: &str) -> WorkerResult<ClipMetadata> {
        let request = ClipRequest::from_event(event).map_err(|e| {
            warn!("Rejecting event: {}", e);
            record_rejected();
            e
        })?;
        self.process(&request).await
    }

    /// Run one attempt of `request` and return the metadata it published.
    pub async fn process(&self, request: &ClipRequest) -> WorkerResult<ClipMetadata> {
        let logger = ClipLogger::new(&request.clip_id, &request.camera_id, "clip_request");
        let span = logger.create_span();
        self.run(request, &logger).instrument(span).await
    }

    async fn run(&self, request: &ClipRequest, logger: &ClipLogger) -> WorkerResult<ClipMetadata> {
        self.prepare_work_dir().await?;

        let format = &self.config.timestamp_format;
        logger.log_start(&format!(
            "window {} to {} ({:.3}s), attempt {}",
            epoch_to_timestamp(request.start_timestamp_ms, format),
            epoch_to_timestamp(request.end_timestamp_ms, format),
            request.window_secs(),
            request.retry_count() + 1
        ));

        if let Some(reason) = self.policy.check_length(request) {
            return self.finish_failed(request, reason, logger).await;
        }

        let alias = self.directory.resolve_alias(&request.camera_id).await?;
        let names = self
            .directory
            .list_segments(&alias, request.start_timestamp_ms, request.end_timestamp_ms)
            .await?;
        let segments = self.parse_segments(names, logger);

        let layout = WorkLayout::new(&self.config.work_dir, &request.clip_id);
        match plan_segments(&segments, request.start_timestamp_ms, request.end_timestamp_ms, &layout) {
            Ok(plans) => self.produce(request, &plans, &layout, logger).await,
            Err(MediaError::NoSegments) => self.handle_unavailable(request, logger).await,
            Err(e) => Err(e.into()),
        }
    }

    /// Empty the work directory, creating it if needed.
    async fn prepare_work_dir(&self) -> WorkerResult<()> {
        let dir = &self.config.work_dir;
        tokio::fs::create_dir_all(dir).await?;

        let mut entries = tokio::fs::read_dir(dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                tokio::fs::remove_dir_all(&path).await?;
            } else {
                tokio::fs::remove_file(&path).await?;
            }
        }
        Ok(())
    }

    /// Segment names that carry a parseable timestamp; the rest are skipped.
    fn parse_segments(&self, names: Vec<String>, logger: &ClipLogger) -> Vec<SegmentRef> {
        names
            .into_iter()
            .filter_map(|name| match SegmentRef::parse(name, &self.config.timestamp_format) {
                Ok(segment) => Some(segment),
                Err(e) => {
                    logger.log_warning(&format!("skipping segment: {}", e));
                    None
                }
            })
            .collect()
    }

    async fn handle_unavailable(
        &self,
        request: &ClipRequest,
        logger: &ClipLogger,
    ) -> WorkerResult<ClipMetadata> {
        match self.policy.evaluate_unavailable(request) {
            RetryDecision::Pending => {
                let next = request.next_attempt();
                let metadata =
                    ClipMetadata::new(request, next.retry_timestamps.clone(), &ClipRecord::Pending);

                self.directory.publish_metadata(&metadata).await?;
                self.retry_publisher
                    .publish_retry(&next, self.policy.retry_delay())
                    .await?;

                record_retry_scheduled();
                record_clip(ClipStatus::Pending);
                logger.log_completion(&format!(
                    "no footage yet, retry {} scheduled in {}s",
                    next.retry_timestamps.len(),
                    self.policy.retry_timeout_secs
                ));
                Ok(metadata)
            }
            RetryDecision::Terminal(reason) => self.finish_failed(request, reason, logger).await,
        }
    }

    async fn produce(
        &self,
        request: &ClipRequest,
        plans: &[TrimPlan],
        layout: &WorkLayout,
        logger: &ClipLogger,
    ) -> WorkerResult<ClipMetadata> {
        let started = Instant::now();
        let clip = match self.assembler.assemble(plans, layout, logger).await {
            Ok(clip) => clip,
            Err(e) => {
                logger.log_error(&format!("assembly failed: {}", e));
                let metadata = ClipMetadata::new(
                    request,
                    request.retry_timestamps.clone(),
                    &ClipRecord::Failed(FailureReason::FatalError),
                );
                if let Err(publish_err) = self.directory.publish_metadata(&metadata).await {
                    logger.log_error(&format!("failed to publish failure record: {}", publish_err));
                }
                record_clip(ClipStatus::FatalError);
                return Err(e.into());
            }
        };
        record_assembly(clip.segment_count, started.elapsed().as_secs_f64());

        let thumbnails = self
            .assembler
            .create_thumbnails(&clip, layout, &self.config.thumbnail_sizes, logger)
            .await;

        self.upload(&request.camera_id, &clip.path).await?;
        for file in thumbnails.files() {
            self.upload(&request.camera_id, file).await?;
            remove_best_effort(file).await;
        }
        remove_best_effort(&clip.path).await;

        let assets = ClipAssets::locate(
            self.destination_bucket.clone(),
            &self.config.clip_base_url,
            &request.camera_id,
            &request.clip_id,
            thumbnails.sizes(),
        );
        let metadata = ClipMetadata::new(
            request,
            request.retry_timestamps.clone(),
            &ClipRecord::Available(assets),
        );
        self.publish(&metadata, logger).await?;

        record_clip(ClipStatus::Available);
        logger.log_completion(&format!(
            "{} segment(s) assembled in {:.1}s",
            clip.segment_count,
            started.elapsed().as_secs_f64()
        ));
        Ok(metadata)
    }

    async fn upload(&self, camera_id: &str, path: &Path) -> WorkerResult<()> {
        let key = destination_key(camera_id, path);
        self.store.upload_asset(path, &key).await?;
        Ok(())
    }

    async fn finish_failed(
        &self,
        request: &ClipRequest,
        reason: FailureReason,
        logger: &ClipLogger,
    ) -> WorkerResult<ClipMetadata> {
        let metadata = ClipMetadata::new(
            request,
            request.retry_timestamps.clone(),
            &ClipRecord::Failed(reason),
        );
        self.publish(&metadata, logger).await?;

        record_clip(metadata.status);
        logger.log_completion(&format!("finished with {}", metadata.status));
        Ok(metadata)
    }

    /// Upsert to the directory, then announce. Announcement failures are
    /// logged only; the directory record is authoritative.
    async fn publish(&self, metadata: &ClipMetadata, logger: &ClipLogger) -> WorkerResult<()> {
        self.directory.publish_metadata(metadata).await?;
        if let Err(e) = self.notifier.notify(metadata).await {
            logger.log_warning(&format!("notification failed: {}", e));
        }
        Ok(())
    }
}
