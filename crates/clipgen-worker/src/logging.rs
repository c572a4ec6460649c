//! Structured per-clip logging.

use tracing::{error, info, warn, Span};

/// Logs lifecycle events of one clip request with its identifiers attached.
#[derive(Debug, Clone)]
pub struct ClipLogger {
    clip_id: String,
    camera_id: String,
    operation: String,
}

impl ClipLogger {
    pub fn new(clip_id: &str, camera_id: &str, operation: &str) -> Self {
        Self {
            clip_id: clip_id.to_string(),
            camera_id: camera_id.to_string(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            clip_id = %self.clip_id,
            camera_id = %self.camera_id,
            operation = %self.operation,
            "Clip started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            clip_id = %self.clip_id,
            camera_id = %self.camera_id,
            operation = %self.operation,
            "Clip progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            clip_id = %self.clip_id,
            camera_id = %self.camera_id,
            operation = %self.operation,
            "Clip warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            clip_id = %self.clip_id,
            camera_id = %self.camera_id,
            operation = %self.operation,
            "Clip error: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            clip_id = %self.clip_id,
            camera_id = %self.camera_id,
            operation = %self.operation,
            "Clip completed: {}", message
        );
    }

    pub fn clip_id(&self) -> &str {
        &self.clip_id
    }

    pub fn camera_id(&self) -> &str {
        &self.camera_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Span covering the whole request, for `Instrument`.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "clip",
            clip_id = %self.clip_id,
            camera_id = %self.camera_id,
            operation = %self.operation
        )
    }
}
