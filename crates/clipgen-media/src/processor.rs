//! Video processing seam.

use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::concat::concat_command;
use crate::error::{MediaError, MediaResult};
use crate::plan::TrimPlan;
use crate::thumbnail::{frame_command, scale_command};
use crate::trim::trim_command;

/// The external video operations clip assembly depends on.
///
/// Callers rely only on success and on the output file existing afterwards.
#[async_trait]
pub trait VideoProcessor: Send + Sync {
    /// Trim one segment as described by `plan`.
    async fn trim(&self, plan: &TrimPlan) -> MediaResult<()>;

    /// Concatenate the parts listed in `manifest` into `output`.
    async fn concat(&self, manifest: &Path, output: &Path) -> MediaResult<()>;

    /// Extract one frame at `offset` from `clip`.
    async fn extract_frame(&self, clip: &Path, offset: &str, output: &Path) -> MediaResult<()>;

    /// Resize `image` to `width`.
    async fn scale(&self, image: &Path, width: u32, output: &Path) -> MediaResult<()>;
}

/// [`VideoProcessor`] backed by the ffmpeg CLI.
#[derive(Debug, Clone, Default)]
pub struct FfmpegProcessor {
    runner: FfmpegRunner,
}

impl FfmpegProcessor {
    pub fn new(runner: FfmpegRunner) -> Self {
        Self { runner }
    }

    async fn run_producing(&self, cmd: FfmpegCommand) -> MediaResult<()> {
        self.runner.run(&cmd).await?;

        let output = cmd.output();
        if !tokio::fs::try_exists(output).await.unwrap_or(false) {
            return Err(MediaError::FileNotFound(output.to_path_buf()));
        }
        debug!(output = %output.display(), "FFmpeg output written");
        Ok(())
    }
}

#[async_trait]
impl VideoProcessor for FfmpegProcessor {
    async fn trim(&self, plan: &TrimPlan) -> MediaResult<()> {
        self.run_producing(trim_command(plan)).await
    }

    async fn concat(&self, manifest: &Path, output: &Path) -> MediaResult<()> {
        self.run_producing(concat_command(manifest, output)).await
    }

    async fn extract_frame(&self, clip: &Path, offset: &str, output: &Path) -> MediaResult<()> {
        self.run_producing(frame_command(clip, offset, output)).await
    }

    async fn scale(&self, image: &Path, width: u32, output: &Path) -> MediaResult<()> {
        self.run_producing(scale_command(image, width, output)).await
    }
}
