//! Timestamp arithmetic for recording segments.
//!
//! Segment identifiers embed their recording start time as the
//! second-to-last dot-delimited token, e.g.
//! `hbpiernscam.stream.20181031T025200051.mp4`. Older recordings omit
//! the milliseconds (`hbpiernscam.20180815T140019.mp4`) and are padded
//! before parsing.

use chrono::{DateTime, NaiveDateTime};

use crate::error::{ModelError, ModelResult};

/// Default pattern for segment timestamps (`yyyymmddThhmmssmmm`).
pub const DEFAULT_TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%S%3f";

/// Timestamps shorter than this lack the millisecond suffix.
pub const MODERN_TIMESTAMP_MIN_LEN: usize = 16;

/// Extract the raw timestamp token from a segment identifier.
pub fn timestamp_token(identifier: &str) -> ModelResult<&str> {
    let tokens: Vec<&str> = identifier.split('.').collect();
    if tokens.len() < 2 {
        return Err(ModelError::malformed_identifier(
            identifier,
            "no timestamp token",
        ));
    }

    let token = tokens[tokens.len() - 2];
    if token.is_empty() {
        return Err(ModelError::malformed_identifier(
            identifier,
            "empty timestamp token",
        ));
    }
    Ok(token)
}

/// Parse the epoch milliseconds encoded in a segment identifier.
///
/// # Examples
/// ```
/// use clipgen_models::timestamp::{parse_segment_timestamp, DEFAULT_TIMESTAMP_FORMAT};
///
/// let modern = parse_segment_timestamp("cam.stream.20181031T025200051.mp4", DEFAULT_TIMESTAMP_FORMAT).unwrap();
/// assert_eq!(modern % 1000, 51);
///
/// let legacy = parse_segment_timestamp("cam.20180815T140019.mp4", DEFAULT_TIMESTAMP_FORMAT).unwrap();
/// assert_eq!(legacy % 1000, 0);
/// ```
pub fn parse_segment_timestamp(identifier: &str, format: &str) -> ModelResult<i64> {
    let token = timestamp_token(identifier)?;

    let normalized = if token.len() < MODERN_TIMESTAMP_MIN_LEN {
        format!("{}000", token)
    } else {
        token.to_string()
    };

    let parsed = NaiveDateTime::parse_from_str(&normalized, format).map_err(|e| {
        ModelError::malformed_identifier(identifier, format!("'{}' does not match '{}': {}", normalized, format, e))
    })?;

    Ok(parsed.and_utc().timestamp_millis())
}

/// Render epoch milliseconds as a UTC timestamp using `format`.
///
/// Out-of-range values fall back to the raw millisecond count.
pub fn epoch_to_timestamp(epoch_ms: i64, format: &str) -> String {
    match DateTime::from_timestamp_millis(epoch_ms) {
        Some(dt) => dt.format(format).to_string(),
        None => epoch_ms.to_string(),
    }
}

/// Format a millisecond duration as `mm:ss.mmm`.
///
/// Minutes are floored and not wrapped into hours. Negative durations
/// clamp to zero.
///
/// # Examples
/// ```
/// use clipgen_models::timestamp::humanize_duration;
/// assert_eq!(humanize_duration(2000), "00:02.000");
/// assert_eq!(humanize_duration(61_250), "01:01.250");
/// assert_eq!(humanize_duration(-5), "00:00.000");
/// ```
pub fn humanize_duration(ms: i64) -> String {
    let ms = ms.max(0);
    let minutes = ms / 60_000;
    let seconds = (ms % 60_000) / 1000;
    let millis = ms % 1000;
    format!("{:02}:{:02}.{:03}", minutes, seconds, millis)
}

/// Absolute span between two epoch-millisecond instants, in seconds.
pub fn window_duration_secs(a_ms: i64, b_ms: i64) -> f64 {
    a_ms.abs_diff(b_ms) as f64 / 1000.0
}

/// Absolute distance between two epoch-millisecond instants, saturating
/// at `i64::MAX`.
pub fn distance_ms(a_ms: i64, b_ms: i64) -> i64 {
    i64::try_from(a_ms.abs_diff(b_ms)).unwrap_or(i64::MAX)
}

/// Trim offsets of one segment against the requested window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrimWindow {
    /// Distance from the segment start to the window start (ms)
    pub start_offset_ms: i64,
    /// Distance from the segment start to the window end (ms)
    pub end_offset_ms: i64,
    /// Seek position for the representative thumbnail frame (ms, never negative)
    pub thumbnail_offset_ms: i64,
}

impl TrimWindow {
    /// Compute the offsets for a segment starting at `segment_epoch_ms`.
    ///
    /// The thumbnail offset is a quarter of the gap between the segment's
    /// distance to the window end and its distance to the window start.
    pub fn compute(segment_epoch_ms: i64, window_start_ms: i64, window_end_ms: i64) -> Self {
        let start_offset_ms = distance_ms(segment_epoch_ms, window_start_ms);
        let end_offset_ms = distance_ms(window_end_ms, segment_epoch_ms);
        let thumbnail_offset_ms = (end_offset_ms.saturating_sub(start_offset_ms) / 4).max(0);

        Self {
            start_offset_ms,
            end_offset_ms,
            thumbnail_offset_ms,
        }
    }

    /// Start offset as `mm:ss.mmm`.
    pub fn start_offset(&self) -> String {
        humanize_duration(self.start_offset_ms)
    }

    /// End offset as `mm:ss.mmm`.
    pub fn end_offset(&self) -> String {
        humanize_duration(self.end_offset_ms)
    }

    /// Thumbnail seek position as `mm:ss.mmm`.
    pub fn thumbnail_offset(&self) -> String {
        humanize_duration(self.thumbnail_offset_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_modern_identifier_keeps_milliseconds() {
        let ms = parse_segment_timestamp(
            "hbpiernscam.stream.20181031T025200051.mp4",
            DEFAULT_TIMESTAMP_FORMAT,
        )
        .unwrap();
        // 2018-10-31T02:52:00.051Z
        assert_eq!(ms, 1_540_954_320_051);
    }

    #[test]
    fn test_legacy_identifier_matches_truncated_modern() {
        let legacy =
            parse_segment_timestamp("hbpiernscam.20180815T140019.mp4", DEFAULT_TIMESTAMP_FORMAT)
                .unwrap();
        let modern = parse_segment_timestamp(
            "hbpiernscam.stream.20180815T140019000.mp4",
            DEFAULT_TIMESTAMP_FORMAT,
        )
        .unwrap();
        assert_eq!(legacy, modern);
        assert_eq!(legacy % 1000, 0);
    }

    #[test]
    fn test_identifier_without_token_is_malformed() {
        let err = parse_segment_timestamp("nodots", DEFAULT_TIMESTAMP_FORMAT).unwrap_err();
        assert!(matches!(err, ModelError::MalformedIdentifier { .. }));

        let err = parse_segment_timestamp("cam.garbage.mp4", DEFAULT_TIMESTAMP_FORMAT).unwrap_err();
        assert!(matches!(err, ModelError::MalformedIdentifier { .. }));
    }

    #[test]
    fn test_humanize_duration() {
        assert_eq!(humanize_duration(0), "00:00.000");
        assert_eq!(humanize_duration(999), "00:00.999");
        assert_eq!(humanize_duration(59_999), "00:59.999");
        assert_eq!(humanize_duration(60_000), "01:00.000");
        assert_eq!(humanize_duration(3_725_004), "62:05.004");
    }

    #[test]
    fn test_trim_window_single_segment_scenario() {
        let window = TrimWindow::compute(3000, 1000, 5000);
        assert_eq!(window.start_offset(), "00:02.000");
        assert_eq!(window.end_offset(), "00:02.000");
        assert_eq!(window.thumbnail_offset(), "00:00.000");
    }

    #[test]
    fn test_thumbnail_offset_is_quarter_of_gap() {
        // Segment starts 10s before the window, window lasts 60s.
        let window = TrimWindow::compute(0, 10_000, 70_000);
        assert_eq!(window.start_offset_ms, 10_000);
        assert_eq!(window.end_offset_ms, 70_000);
        assert_eq!(window.thumbnail_offset_ms, 15_000);
    }

    #[test]
    fn test_thumbnail_offset_clamps_to_zero() {
        let window = TrimWindow::compute(9000, 1000, 5000);
        assert_eq!(window.thumbnail_offset_ms, 0);
    }

    #[test]
    fn test_epoch_to_timestamp_roundtrip() {
        let ms = 1_540_954_320_051;
        assert_eq!(
            epoch_to_timestamp(ms, DEFAULT_TIMESTAMP_FORMAT),
            "20181031T025200051"
        );
    }

    #[test]
    fn test_window_duration_secs() {
        assert!((window_duration_secs(1000, 5500) - 4.5).abs() < f64::EPSILON);
        assert!((window_duration_secs(5500, 1000) - 4.5).abs() < f64::EPSILON);
        assert_eq!(window_duration_secs(i64::MIN, i64::MAX), u64::MAX as f64 / 1000.0);
    }

    #[test]
    fn test_extreme_instants_saturate() {
        assert_eq!(distance_ms(i64::MIN, i64::MAX), i64::MAX);
        assert_eq!(distance_ms(-5, 5), 10);

        let window = TrimWindow::compute(i64::MIN, i64::MIN, i64::MAX);
        assert_eq!(window.start_offset_ms, 0);
        assert_eq!(window.end_offset_ms, i64::MAX);
        assert_eq!(window.thumbnail_offset_ms, i64::MAX / 4);

        let window = TrimWindow::compute(i64::MAX, i64::MIN, i64::MIN);
        assert_eq!(window.start_offset_ms, i64::MAX);
        assert_eq!(window.thumbnail_offset_ms, 0);
    }
}
