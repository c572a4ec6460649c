//! Thumbnail frame extraction and resizing.

use std::path::Path;

use crate::command::FfmpegCommand;

/// Grab a single frame at `offset` from the finished clip.
pub fn frame_command(clip: &Path, offset: &str, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(clip, output)
        .input_seek(offset)
        .single_frame()
}

/// Resize an extracted frame to `width`, keeping the aspect ratio.
pub fn scale_command(image: &Path, width: u32, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(image, output).video_filter(format!("scale={}:-1", width))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_command_seeks_before_input() {
        let args = frame_command(Path::new("c.mp4"), "00:01.500", Path::new("c_original.jpg"))
            .build_args();
        assert_eq!(
            args,
            vec!["-v", "error", "-ss", "00:01.500", "-i", "c.mp4", "-vframes", "1", "-y", "c_original.jpg"]
        );
    }

    #[test]
    fn test_scale_command() {
        let args = scale_command(Path::new("c_original.jpg"), 320, Path::new("c_320.jpg")).build_args();
        assert_eq!(
            args,
            vec!["-v", "error", "-i", "c_original.jpg", "-vf", "scale=320:-1", "-y", "c_320.jpg"]
        );
    }
}
