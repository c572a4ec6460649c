//! Worker metrics.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use clipgen_models::ClipStatus;

use crate::error::{WorkerError, WorkerResult};

/// Metric names as constants for consistency.
pub mod names {
    // Lifecycle
    pub const CLIPS_TOTAL: &str = "clipgen_clips_total";
    pub const REQUESTS_REJECTED_TOTAL: &str = "clipgen_requests_rejected_total";
    pub const RETRIES_SCHEDULED_TOTAL: &str = "clipgen_retries_scheduled_total";

    // Assembly
    pub const ASSEMBLY_DURATION_SECONDS: &str = "clipgen_assembly_duration_seconds";
    pub const SEGMENTS_PER_CLIP: &str = "clipgen_segments_per_clip";
    pub const THUMBNAILS_SKIPPED_TOTAL: &str = "clipgen_thumbnails_skipped_total";

    // Queue
    pub const QUEUE_LENGTH: &str = "clipgen_queue_length";
    pub const QUEUE_DELAYED_LENGTH: &str = "clipgen_queue_delayed_length";
    pub const QUEUE_DLQ_LENGTH: &str = "clipgen_queue_dlq_length";
    pub const REQUESTS_DEAD_LETTERED_TOTAL: &str = "clipgen_requests_dead_lettered_total";
}

/// Install the Prometheus exporter listening on `addr`.
pub fn init_metrics(addr: SocketAddr) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config(format!("failed to install metrics exporter: {}", e)))
}

/// Record the status a request ended with.
pub fn record_clip(status: ClipStatus) {
    counter!(names::CLIPS_TOTAL, "status" => status.as_str()).increment(1);
}

pub fn record_rejected() {
    counter!(names::REQUESTS_REJECTED_TOTAL).increment(1);
}

pub fn record_retry_scheduled() {
    counter!(names::RETRIES_SCHEDULED_TOTAL).increment(1);
}

/// Record a finished assembly.
pub fn record_assembly(segments: usize, duration_secs: f64) {
    histogram!(names::ASSEMBLY_DURATION_SECONDS).record(duration_secs);
    histogram!(names::SEGMENTS_PER_CLIP).record(segments as f64);
}

pub fn record_thumbnail_skipped(width: u32) {
    counter!(names::THUMBNAILS_SKIPPED_TOTAL, "width" => width.to_string()).increment(1);
}

pub fn record_dead_lettered() {
    counter!(names::REQUESTS_DEAD_LETTERED_TOTAL).increment(1);
}

/// Update queue depth gauges.
pub fn set_queue_lengths(pending: u64, delayed: u64, dlq: u64) {
    gauge!(names::QUEUE_LENGTH).set(pending as f64);
    gauge!(names::QUEUE_DELAYED_LENGTH).set(delayed as f64);
    gauge!(names::QUEUE_DLQ_LENGTH).set(dlq as f64);
}
