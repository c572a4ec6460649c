//! FFmpeg CLI wrapper and segment planning for clip assembly.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building
//! - Segment planning into per-segment trim plans
//! - The fixed trim, concat, frame-extract and scale profiles
//! - The [`VideoProcessor`] seam and its ffmpeg-backed implementation

pub mod command;
pub mod concat;
pub mod error;
pub mod layout;
pub mod plan;
pub mod processor;
pub mod thumbnail;
pub mod trim;

pub use command::{check_ffmpeg, FfmpegCommand, FfmpegRunner};
pub use concat::{concat_command, concat_manifest, write_concat_manifest};
pub use error::{MediaError, MediaResult};
pub use layout::WorkLayout;
pub use plan::{plan_segments, TrimPlan, START_OF_FILE};
pub use processor::{FfmpegProcessor, VideoProcessor};
pub use thumbnail::{frame_command, scale_command};
pub use trim::trim_command;
