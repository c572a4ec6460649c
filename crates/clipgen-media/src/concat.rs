//! Manifest-driven concatenation of trimmed parts.

use std::path::{Path, PathBuf};

use crate::command::FfmpegCommand;
use crate::error::MediaResult;

/// Render the concat-demuxer manifest for `parts`, in the given order.
///
/// # Examples
/// ```
/// use std::path::PathBuf;
/// use clipgen_media::concat::concat_manifest;
///
/// let manifest = concat_manifest(&[PathBuf::from("/w/tmp_a.mp4"), PathBuf::from("/w/tmp_b.mp4")]);
/// assert_eq!(manifest, "file '/w/tmp_a.mp4'\nfile '/w/tmp_b.mp4'\n");
/// ```
pub fn concat_manifest(parts: &[PathBuf]) -> String {
    parts
        .iter()
        .map(|part| {
            // Quotes inside a quoted entry are closed, escaped and reopened.
            let escaped = part.to_string_lossy().replace('\'', r"'\''");
            format!("file '{}'\n", escaped)
        })
        .collect()
}

/// Write the manifest for `parts` to `path`.
pub async fn write_concat_manifest(path: &Path, parts: &[PathBuf]) -> MediaResult<()> {
    tokio::fs::write(path, concat_manifest(parts)).await?;
    Ok(())
}

/// Build the stream-copy concat command.
pub fn concat_command(manifest: &Path, output: &Path) -> FfmpegCommand {
    FfmpegCommand::new(manifest, output)
        .input_args(["-f", "concat", "-safe", "0"])
        .faststart()
        .stream_copy()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_command_profile() {
        let args = concat_command(Path::new("/w/c_concat.txt"), Path::new("/w/c.mp4")).build_args();
        assert_eq!(
            args,
            vec![
                "-v", "error", "-f", "concat", "-safe", "0", "-i", "/w/c_concat.txt",
                "-movflags", "+faststart", "-c", "copy", "-y", "/w/c.mp4",
            ]
        );
    }

    #[test]
    fn test_manifest_escapes_quotes() {
        let manifest = concat_manifest(&[PathBuf::from("/w/it's.mp4")]);
        assert_eq!(manifest, "file '/w/it'\\''s.mp4'\n");
    }

    #[tokio::test]
    async fn test_write_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.txt");
        write_concat_manifest(&path, &[PathBuf::from("/a.mp4")]).await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "file '/a.mp4'\n");
    }
}
