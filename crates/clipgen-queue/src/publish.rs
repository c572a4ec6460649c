//! Outbound messaging seams.

use std::time::Duration;

use async_trait::async_trait;

use clipgen_models::{ClipMetadata, RequestBody};

use crate::error::QueueResult;

/// Re-enqueues a request for a later attempt.
#[async_trait]
pub trait RetryPublisher: Send + Sync {
    async fn publish_retry(&self, body: &RequestBody, delay: Duration) -> QueueResult<()>;
}

/// Fans clip metadata out to downstream consumers. At-least-once,
/// no acknowledgment beyond transport success.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, metadata: &ClipMetadata) -> QueueResult<()>;
}
