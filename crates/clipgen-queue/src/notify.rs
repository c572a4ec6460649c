//! Clip status notifications via Redis Pub/Sub.

use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::debug;

use clipgen_models::ClipMetadata;

use crate::error::QueueResult;
use crate::publish::Notifier;

/// Publishes clip metadata to a fixed channel.
#[derive(Clone)]
pub struct NotificationChannel {
    client: redis::Client,
    channel: String,
}

impl NotificationChannel {
    /// Create a new notification channel.
    pub fn new(redis_url: &str, channel: impl Into<String>) -> QueueResult<Self> {
        let client = redis::Client::open(redis_url)?;
        Ok(Self {
            client,
            channel: channel.into(),
        })
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }

    /// Publish raw metadata JSON, returning the number of receivers.
    pub async fn publish(&self, metadata: &ClipMetadata) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let payload = serde_json::to_string(metadata)?;

        debug!(clip_id = %metadata.clip_id, "Publishing clip notification to {}", self.channel);
        let receivers: u64 = conn.publish(&self.channel, payload).await?;
        Ok(receivers)
    }
}

#[async_trait]
impl Notifier for NotificationChannel {
    async fn notify(&self, metadata: &ClipMetadata) -> QueueResult<()> {
        self.publish(metadata).await.map(|_| ())
    }
}
