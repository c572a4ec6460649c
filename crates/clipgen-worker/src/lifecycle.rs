//! Retry and lifecycle rules.
//!
//! A request either assembles, gets re-enqueued while its footage may
//! still arrive, or ends in one of the terminal failure statuses. The
//! decision is a pure function of the request (window, retry history,
//! enqueue time) and the configured thresholds, so retried attempts need
//! no state beyond what travels in the request body.

use std::time::Duration;

use clipgen_models::{window_duration_secs, ClipRequest, FailureReason};

/// Outcome of evaluating a request whose footage could not be resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Re-enqueue after the retry delay
    Pending,
    /// Stop and publish the failure
    Terminal(FailureReason),
}

/// Lifecycle thresholds, all in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between attempts
    pub retry_timeout_secs: u64,
    /// Footage missing for longer than this is not available
    pub retry_limit_secs: u64,
    /// Footage missing for longer than this is out of range
    pub out_of_range_secs: u64,
    /// Longest window accepted
    pub max_clip_len_secs: u64,
}

impl RetryPolicy {
    /// Number of re-enqueues allowed before the request times out.
    pub fn max_retries(&self) -> usize {
        self.retry_limit_secs
            .checked_div(self.retry_timeout_secs)
            .unwrap_or(0) as usize
    }

    /// Delay applied to a re-enqueued request.
    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_timeout_secs)
    }

    /// `TooLong` when the requested window exceeds the maximum length.
    pub fn check_length(&self, request: &ClipRequest) -> Option<FailureReason> {
        if request.window_secs() > self.max_clip_len_secs as f64 {
            Some(FailureReason::TooLong)
        } else {
            None
        }
    }

    /// Seconds between the window start and the reference timestamp
    /// (first retry, or the current enqueue time on the first attempt).
    pub fn availability_delta_secs(&self, request: &ClipRequest) -> f64 {
        window_duration_secs(request.reference_timestamp_ms(), request.start_timestamp_ms)
    }

    /// Decide what happens to a request for which no footage was found.
    ///
    /// The retry budget is checked first. Otherwise the delta decides:
    /// strictly between the retry limit and the out-of-range limit is
    /// not available, strictly above the out-of-range limit is out of
    /// range, and anything else (including exactly the out-of-range
    /// limit) stays pending.
    pub fn evaluate_unavailable(&self, request: &ClipRequest) -> RetryDecision {
        if request.retry_count() > self.max_retries() {
            return RetryDecision::Terminal(FailureReason::RetryTimeout);
        }

        let delta = self.availability_delta_secs(request);
        let retry_limit = self.retry_limit_secs as f64;
        let out_of_range = self.out_of_range_secs as f64;

        if delta > retry_limit && delta < out_of_range {
            RetryDecision::Terminal(FailureReason::NotAvailable)
        } else if delta > out_of_range {
            RetryDecision::Terminal(FailureReason::OutOfRange)
        } else {
            RetryDecision::Pending
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            retry_timeout_secs: 300,
            retry_limit_secs: 900,
            out_of_range_secs: 259_200,
            max_clip_len_secs: 300,
        }
    }

    fn request(start_ms: i64, end_ms: i64, sent_ms: i64, retries: Vec<i64>) -> ClipRequest {
        ClipRequest {
            camera_id: "cam-1".to_string(),
            clip_id: "clip-1".to_string(),
            start_timestamp_ms: start_ms,
            end_timestamp_ms: end_ms,
            retry_timestamps: retries,
            sent_timestamp_ms: sent_ms,
        }
    }

    #[test]
    fn test_max_retries_is_floor_of_limit_over_timeout() {
        assert_eq!(policy().max_retries(), 3);

        let uneven = RetryPolicy {
            retry_timeout_secs: 400,
            ..policy()
        };
        assert_eq!(uneven.max_retries(), 2);

        let degenerate = RetryPolicy {
            retry_timeout_secs: 0,
            ..policy()
        };
        assert_eq!(degenerate.max_retries(), 0);
    }

    #[test]
    fn test_length_check() {
        assert_eq!(policy().check_length(&request(0, 300_000, 0, vec![])), None);
        assert_eq!(
            policy().check_length(&request(0, 300_001, 0, vec![])),
            Some(FailureReason::TooLong)
        );
    }

    #[test]
    fn test_recent_request_stays_pending() {
        // Sent one minute after the window started.
        let req = request(1_000_000, 1_010_000, 1_060_000, vec![]);
        assert_eq!(policy().availability_delta_secs(&req), 60.0);
        assert_eq!(policy().evaluate_unavailable(&req), RetryDecision::Pending);
    }

    #[test]
    fn test_delta_uses_first_retry_timestamp() {
        // First retry was 10s after the start; the current enqueue time is
        // far later but must not be used.
        let req = request(0, 5_000, 5_000_000, vec![10_000, 310_000]);
        assert_eq!(policy().availability_delta_secs(&req), 10.0);
        assert_eq!(policy().evaluate_unavailable(&req), RetryDecision::Pending);
    }

    #[test]
    fn test_not_available_between_limits() {
        let req = request(0, 5_000, 901_000, vec![]);
        assert_eq!(
            policy().evaluate_unavailable(&req),
            RetryDecision::Terminal(FailureReason::NotAvailable)
        );
    }

    #[test]
    fn test_out_of_range_above_upper_limit() {
        let req = request(0, 5_000, 259_201_000, vec![]);
        assert_eq!(
            policy().evaluate_unavailable(&req),
            RetryDecision::Terminal(FailureReason::OutOfRange)
        );
    }

    #[test]
    fn test_boundaries_stay_pending() {
        let at_retry_limit = request(0, 5_000, 900_000, vec![]);
        assert_eq!(policy().evaluate_unavailable(&at_retry_limit), RetryDecision::Pending);

        let at_out_of_range = request(0, 5_000, 259_200_000, vec![]);
        assert_eq!(policy().evaluate_unavailable(&at_out_of_range), RetryDecision::Pending);
    }

    #[test]
    fn test_retry_timeout_after_budget_exhausted() {
        let policy = policy();
        let mut req = request(0, 5_000, 1_000, vec![]);
        let mut pending_attempts = 0;

        loop {
            match policy.evaluate_unavailable(&req) {
                RetryDecision::Pending => {
                    pending_attempts += 1;
                    let next = req.next_attempt();
                    req = request(0, 5_000, req.sent_timestamp_ms + 300_000, next.retry_timestamps);
                }
                RetryDecision::Terminal(reason) => {
                    assert_eq!(reason, FailureReason::RetryTimeout);
                    break;
                }
            }
        }

        assert_eq!(pending_attempts, policy.max_retries() + 1);
    }

    #[test]
    fn test_retry_budget_checked_before_delta() {
        // Both the budget and the out-of-range limit are exceeded.
        let req = request(0, 5_000, 300_000_000, vec![300_000_000; 4]);
        assert_eq!(
            policy().evaluate_unavailable(&req),
            RetryDecision::Terminal(FailureReason::RetryTimeout)
        );
    }

    #[test]
    fn test_widest_window_is_too_long() {
        let body = format!(
            r#"{{"cameraId":"cam","clipId":"c","startTimestampInMs":{},"endTimestampInMs":{}}}"#,
            i64::MIN,
            i64::MAX
        );
        let req = ClipRequest::parse(&body, "0").unwrap();
        assert_eq!(policy().check_length(&req), Some(FailureReason::TooLong));
    }

    #[test]
    fn test_extreme_reference_timestamp_is_out_of_range() {
        let body = format!(
            r#"{{"cameraId":"cam","clipId":"c","startTimestampInMs":9223372036854775000,"endTimestampInMs":9223372036854775000,"retryTimestamps":[{}]}}"#,
            i64::MIN
        );
        let req = ClipRequest::parse(&body, "0").unwrap();
        assert!(policy().availability_delta_secs(&req) > policy().out_of_range_secs as f64);
        assert_eq!(
            policy().evaluate_unavailable(&req),
            RetryDecision::Terminal(FailureReason::OutOfRange)
        );
    }
}
