//! Per-segment trim profile.
//!
//! Trimming seeks after opening the input and re-encodes, since cut points
//! rarely fall on keyframes. Output gets the moov atom at the front.

use crate::command::FfmpegCommand;
use crate::plan::TrimPlan;

/// Pixel format filter applied to every trimmed part.
pub const TRIM_PIXEL_FORMAT: &str = "format=yuv420p";

/// Encoder preset used when trimming.
pub const TRIM_PRESET: &str = "fast";

/// Build the trim command for a plan.
pub fn trim_command(plan: &TrimPlan) -> FfmpegCommand {
    let cmd = FfmpegCommand::new(&plan.input_path, &plan.output_path)
        .output_seek(plan.seek_position());

    let cmd = match &plan.end_offset {
        Some(end) => cmd.stop_at(end),
        None => cmd,
    };

    cmd.video_filter(TRIM_PIXEL_FORMAT)
        .preset(TRIM_PRESET)
        .faststart()
}
