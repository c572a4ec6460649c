//! Segment planning.
//!
//! Turns the segments resolved for a window into per-segment trim plans.
//! The first segment is cut from the window start to its own end, the
//! last from its own start to the window end, and anything in between
//! is passed through whole. A lone segment is cut at both ends and
//! written straight to the final clip path.

use std::path::PathBuf;

use clipgen_models::{SegmentRef, TrimWindow};

use crate::error::{MediaError, MediaResult};
use crate::layout::WorkLayout;

/// Seek position meaning "from the beginning of the file".
pub const START_OF_FILE: &str = "00:00.000";

/// How one segment is cut.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrimPlan {
    /// Source segment
    pub segment: SegmentRef,
    /// Local path of the downloaded source
    pub input_path: PathBuf,
    /// Where the trimmed output is written
    pub output_path: PathBuf,
    /// Trim start; `None` keeps the file from its beginning
    pub start_offset: Option<String>,
    /// Trim end; `None` keeps the file to its end
    pub end_offset: Option<String>,
    /// Raw offsets of this segment against the window
    pub window: TrimWindow,
}

impl TrimPlan {
    /// Seek position handed to the trim command.
    pub fn seek_position(&self) -> &str {
        self.start_offset.as_deref().unwrap_or(START_OF_FILE)
    }

    /// Whether this plan keeps the whole segment.
    pub fn is_pass_through(&self) -> bool {
        self.start_offset.is_none() && self.end_offset.is_none()
    }
}

/// Plan the trims for `segments` against `[window_start_ms, window_end_ms]`.
///
/// `segments` arrive most recent first. Plans are returned in chronological
/// order. Fails with [`MediaError::NoSegments`] when nothing was resolved.
pub fn plan_segments(
    segments: &[SegmentRef],
    window_start_ms: i64,
    window_end_ms: i64,
    layout: &WorkLayout,
) -> MediaResult<Vec<TrimPlan>> {
    if segments.is_empty() {
        return Err(MediaError::NoSegments);
    }

    let mut ordered: Vec<&SegmentRef> = segments.iter().rev().collect();
    ordered.sort_by_key(|segment| segment.epoch_ms);

    let count = ordered.len();
    let plans = ordered
        .into_iter()
        .enumerate()
        .map(|(index, segment)| {
            let window = TrimWindow::compute(segment.epoch_ms, window_start_ms, window_end_ms);

            let (start_offset, end_offset, output_path) = if count == 1 {
                (
                    Some(window.start_offset()),
                    Some(window.end_offset()),
                    layout.clip(),
                )
            } else if index == 0 {
                (Some(window.start_offset()), None, layout.trimmed(&segment.name))
            } else if index == count - 1 {
                (None, Some(window.end_offset()), layout.trimmed(&segment.name))
            } else {
                (None, None, layout.trimmed(&segment.name))
            };

            TrimPlan {
                segment: segment.clone(),
                input_path: layout.source(&segment.name),
                output_path,
                start_offset,
                end_offset,
                window,
            }
        })
        .collect();

    Ok(plans)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(name: &str, epoch_ms: i64) -> SegmentRef {
        SegmentRef {
            name: name.to_string(),
            epoch_ms,
        }
    }

    fn layout() -> WorkLayout {
        WorkLayout::new("/work", "clip")
    }

    #[test]
    fn test_empty_input_is_no_segments() {
        let err = plan_segments(&[], 0, 10, &layout()).unwrap_err();
        assert!(matches!(err, MediaError::NoSegments));
    }

    #[test]
    fn test_single_segment_has_both_bounds() {
        let plans = plan_segments(&[seg("a.1.mp4", 3000)], 1000, 5000, &layout()).unwrap();
        assert_eq!(plans.len(), 1);

        let plan = &plans[0];
        assert_eq!(plan.start_offset.as_deref(), Some("00:02.000"));
        assert_eq!(plan.end_offset.as_deref(), Some("00:02.000"));
        assert_eq!(plan.output_path, PathBuf::from("/work/clip.mp4"));
        assert_eq!(plan.input_path, PathBuf::from("/work/a.1.mp4"));
    }

    #[test]
    fn test_multiple_segments_are_reversed_and_classified() {
        // Most recent first, as the directory returns them.
        let segments = vec![
            seg("d.4.mp4", 90_000),
            seg("c.3.mp4", 60_000),
            seg("b.2.mp4", 30_000),
            seg("a.1.mp4", 0),
        ];
        let plans = plan_segments(&segments, 10_000, 100_000, &layout()).unwrap();

        let names: Vec<&str> = plans.iter().map(|p| p.segment.name.as_str()).collect();
        assert_eq!(names, vec!["a.1.mp4", "b.2.mp4", "c.3.mp4", "d.4.mp4"]);

        let first = &plans[0];
        assert_eq!(first.start_offset.as_deref(), Some("00:10.000"));
        assert!(first.end_offset.is_none());

        let last = &plans[3];
        assert!(last.start_offset.is_none());
        assert_eq!(last.end_offset.as_deref(), Some("00:10.000"));
        assert_eq!(last.seek_position(), START_OF_FILE);

        assert!(plans[1].is_pass_through());
        assert!(plans[2].is_pass_through());
        assert!(plans.iter().all(|p| p.output_path != PathBuf::from("/work/clip.mp4")));
        assert_eq!(plans[1].output_path, PathBuf::from("/work/tmp_b.2.mp4"));
    }

    #[test]
    fn test_bound_counts_for_n_segments() {
        for n in 2..6 {
            let segments: Vec<SegmentRef> = (0..n)
                .rev()
                .map(|i| seg(&format!("s.{}.mp4", i), i as i64 * 1000))
                .collect();
            let plans = plan_segments(&segments, 500, n as i64 * 1000, &layout()).unwrap();

            let start_only = plans
                .iter()
                .filter(|p| p.start_offset.is_some() && p.end_offset.is_none())
                .count();
            let end_only = plans
                .iter()
                .filter(|p| p.start_offset.is_none() && p.end_offset.is_some())
                .count();
            let interior = plans.iter().filter(|p| p.is_pass_through()).count();

            assert_eq!(start_only, 1);
            assert_eq!(end_only, 1);
            assert_eq!(interior, n - 2);
        }
    }

    #[test]
    fn test_out_of_order_input_is_sorted_chronologically() {
        let segments = vec![seg("b.mp4", 2000), seg("c.mp4", 3000), seg("a.mp4", 1000)];
        let plans = plan_segments(&segments, 0, 4000, &layout()).unwrap();
        let epochs: Vec<i64> = plans.iter().map(|p| p.segment.epoch_ms).collect();
        assert_eq!(epochs, vec![1000, 2000, 3000]);
    }
}
