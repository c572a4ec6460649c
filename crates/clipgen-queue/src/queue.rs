//! Clip request queue using Redis Streams.
//!
//! Live requests sit in a stream read through a consumer group. Retries
//! wait in a sorted set scored by their due time and are promoted into
//! the stream once due. Entries that keep failing are moved to a
//! dead-letter stream.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use redis::{AsyncCommands, Script};
use tracing::{debug, info, warn};
use uuid::Uuid;

use clipgen_models::RequestBody;

use crate::error::{QueueError, QueueResult};
use crate::message::{DelayedRequest, QueuedRequest, BODY_FIELD, SENT_TS_FIELD};
use crate::publish::RetryPublisher;

/// Moves due members of the delayed set into the stream atomically.
const PROMOTE_SCRIPT: &str = r#"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, ARGV[2])
for _, member in ipairs(due) do
    local entry = cjson.decode(member)
    redis.call('XADD', KEYS[2], '*', 'body', entry.body, 'sent_ts', entry.sent_ts)
    redis.call('ZREM', KEYS[1], member)
end
return #due
"#;

/// Queue configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// Redis URL
    pub redis_url: String,
    /// Stream name for requests
    pub stream_name: String,
    /// Consumer group name
    pub consumer_group: String,
    /// Sorted set holding delayed retries
    pub delayed_set_name: String,
    /// Dead letter queue stream name
    pub dlq_stream_name: String,
    /// Failed deliveries before an entry is dead-lettered
    pub max_deliveries: u32,
    /// Idle time after which another consumer may claim an entry
    pub visibility_timeout: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            redis_url: "redis://localhost:6379".to_string(),
            stream_name: "clipgen:requests".to_string(),
            consumer_group: "clipgen:workers".to_string(),
            delayed_set_name: "clipgen:delayed".to_string(),
            dlq_stream_name: "clipgen:dlq".to_string(),
            max_deliveries: 3,
            visibility_timeout: Duration::from_secs(900),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Create config from an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        Self {
            redis_url: lookup("REDIS_URL").unwrap_or(defaults.redis_url),
            stream_name: lookup("QUEUE_STREAM").unwrap_or(defaults.stream_name),
            consumer_group: lookup("QUEUE_CONSUMER_GROUP").unwrap_or(defaults.consumer_group),
            delayed_set_name: lookup("QUEUE_DELAYED_SET").unwrap_or(defaults.delayed_set_name),
            dlq_stream_name: lookup("QUEUE_DLQ_STREAM").unwrap_or(defaults.dlq_stream_name),
            max_deliveries: lookup("QUEUE_MAX_DELIVERIES")
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_deliveries),
            visibility_timeout: lookup("QUEUE_VISIBILITY_TIMEOUT")
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.visibility_timeout),
        }
    }
}

/// Request queue client.
#[derive(Clone)]
pub struct RequestQueue {
    client: redis::Client,
    config: QueueConfig,
}

impl RequestQueue {
    /// Create a new request queue.
    pub fn new(config: QueueConfig) -> QueueResult<Self> {
        let client = redis::Client::open(config.redis_url.as_str())?;
        Ok(Self { client, config })
    }

    /// Create from environment variables.
    pub fn from_env() -> QueueResult<Self> {
        Self::new(QueueConfig::from_env())
    }

    pub fn config(&self) -> &QueueConfig {
        &self.config
    }

    /// Initialize the queue (create consumer group if not exists).
    pub async fn init(&self) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        // Create consumer group (ignore error if already exists)
        let result: Result<(), redis::RedisError> = redis::cmd("XGROUP")
            .arg("CREATE")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("$")
            .arg("MKSTREAM")
            .query_async(&mut conn)
            .await;

        match result {
            Ok(_) => info!("Created consumer group: {}", self.config.consumer_group),
            Err(e) if e.to_string().contains("BUSYGROUP") => {
                debug!("Consumer group already exists: {}", self.config.consumer_group);
            }
            Err(e) => return Err(QueueError::Redis(e)),
        }

        Ok(())
    }

    /// Append a raw request body to the stream.
    pub async fn enqueue(&self, body: &str, sent_timestamp_ms: i64) -> QueueResult<String> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let message_id: String = redis::cmd("XADD")
            .arg(&self.config.stream_name)
            .arg("*")
            .arg(BODY_FIELD)
            .arg(body)
            .arg(SENT_TS_FIELD)
            .arg(sent_timestamp_ms.to_string())
            .query_async(&mut conn)
            .await?;

        debug!("Enqueued request with message ID {}", message_id);
        Ok(message_id)
    }

    /// Schedule a request body to enter the stream after `delay`.
    ///
    /// The entry carries the scheduling time as its send timestamp.
    pub async fn schedule(&self, body: &RequestBody, delay: Duration) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let now_ms = Utc::now().timestamp_millis();
        let delay_ms = i64::try_from(delay.as_millis())
            .map_err(|_| QueueError::enqueue_failed("retry delay out of range"))?;
        let entry = DelayedRequest {
            id: Uuid::new_v4().to_string(),
            body: serde_json::to_string(body)?,
            sent_ts: now_ms.to_string(),
        };
        let member = serde_json::to_string(&entry)?;

        conn.zadd::<_, _, _, ()>(&self.config.delayed_set_name, member, now_ms + delay_ms)
            .await?;

        info!(
            clip_id = %body.clip_id,
            delay_secs = delay.as_secs(),
            "Scheduled request retry"
        );
        Ok(())
    }

    /// Move up to `count` due retries into the stream.
    pub async fn promote_due(&self, now_ms: i64, count: usize) -> QueueResult<usize> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let promoted: usize = Script::new(PROMOTE_SCRIPT)
            .key(&self.config.delayed_set_name)
            .key(&self.config.stream_name)
            .arg(now_ms)
            .arg(count)
            .invoke_async(&mut conn)
            .await?;

        if promoted > 0 {
            debug!("Promoted {} delayed request(s)", promoted);
        }
        Ok(promoted)
    }

    /// Acknowledge an entry and drop it from the stream.
    pub async fn ack(&self, message_id: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XACK")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        // Delete the message from the stream
        redis::cmd("XDEL")
            .arg(&self.config.stream_name)
            .arg(message_id)
            .query_async::<()>(&mut conn)
            .await?;

        conn.del::<_, ()>(self.delivery_key(message_id)).await?;

        debug!("Acknowledged request: {}", message_id);
        Ok(())
    }

    /// Move an entry to the dead letter stream.
    pub async fn dlq(&self, request: &QueuedRequest, error: &str) -> QueueResult<()> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        redis::cmd("XADD")
            .arg(&self.config.dlq_stream_name)
            .arg("*")
            .arg(BODY_FIELD)
            .arg(&request.body)
            .arg(SENT_TS_FIELD)
            .arg(&request.sent_timestamp)
            .arg("error")
            .arg(error)
            .arg("original_id")
            .arg(&request.message_id)
            .query_async::<()>(&mut conn)
            .await?;

        self.ack(&request.message_id).await?;

        warn!("Moved request {} to DLQ: {}", request.message_id, error);
        Ok(())
    }

    /// Get queue length.
    pub async fn len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(&self.config.stream_name).await?;
        Ok(len)
    }

    /// Get DLQ length.
    pub async fn dlq_len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.xlen(&self.config.dlq_stream_name).await?;
        Ok(len)
    }

    /// Number of retries waiting in the delayed set.
    pub async fn delayed_len(&self) -> QueueResult<u64> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;
        let len: u64 = conn.zcard(&self.config.delayed_set_name).await?;
        Ok(len)
    }

    /// Read new entries for this consumer.
    pub async fn consume(
        &self,
        consumer_name: &str,
        block_ms: u64,
        count: usize,
    ) -> QueueResult<Vec<QueuedRequest>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let reply: Option<redis::streams::StreamReadReply> = redis::cmd("XREADGROUP")
            .arg("GROUP")
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg("COUNT")
            .arg(count)
            .arg("BLOCK")
            .arg(block_ms)
            .arg("STREAMS")
            .arg(&self.config.stream_name)
            .arg(">") // Only new messages
            .query_async(&mut conn)
            .await?;

        let entries = reply
            .into_iter()
            .flat_map(|reply| reply.keys)
            .flat_map(|key| key.ids)
            .collect::<Vec<_>>();

        self.decode_entries(entries).await
    }

    /// Claim entries left unacknowledged longer than the visibility timeout,
    /// including this consumer's own failed deliveries.
    pub async fn claim_pending(
        &self,
        consumer_name: &str,
        count: usize,
    ) -> QueueResult<Vec<QueuedRequest>> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let min_idle_ms = self.config.visibility_timeout.as_millis() as u64;

        let pending: redis::streams::StreamPendingCountReply = redis::cmd("XPENDING")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg("IDLE")
            .arg(min_idle_ms)
            .arg("-")
            .arg("+")
            .arg(count)
            .query_async(&mut conn)
            .await?;

        if pending.ids.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = pending.ids.iter().map(|p| p.id.as_str()).collect();
        let reply: redis::streams::StreamClaimReply = redis::cmd("XCLAIM")
            .arg(&self.config.stream_name)
            .arg(&self.config.consumer_group)
            .arg(consumer_name)
            .arg(min_idle_ms)
            .arg(&ids)
            .query_async(&mut conn)
            .await?;

        let claimed = self.decode_entries(reply.ids).await?;
        if !claimed.is_empty() {
            info!("Claimed {} pending request(s)", claimed.len());
        }
        Ok(claimed)
    }

    async fn decode_entries(
        &self,
        entries: Vec<redis::streams::StreamId>,
    ) -> QueueResult<Vec<QueuedRequest>> {
        let mut requests = Vec::with_capacity(entries.len());

        for entry in entries {
            match QueuedRequest::from_fields(entry.id.clone(), &entry.map) {
                Ok(request) => requests.push(request),
                Err(e) => {
                    warn!("Dropping unreadable stream entry: {}", e);
                    // Ack the malformed message to prevent reprocessing
                    self.ack(&entry.id).await.ok();
                }
            }
        }

        Ok(requests)
    }

    fn delivery_key(&self, message_id: &str) -> String {
        format!("{}:deliveries:{}", self.config.stream_name, message_id)
    }

    /// Record a failed delivery, returning the new count.
    pub async fn increment_delivery(&self, message_id: &str) -> QueueResult<u32> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let key = self.delivery_key(message_id);
        let count: u32 = conn.incr(&key, 1).await?;
        // Set TTL to 24 hours
        conn.expire::<_, ()>(&key, 86400).await?;
        Ok(count)
    }

    /// Get max deliveries from config.
    pub fn max_deliveries(&self) -> u32 {
        self.config.max_deliveries
    }
}

#[async_trait]
impl RetryPublisher for RequestQueue {
    async fn publish_retry(&self, body: &RequestBody, delay: Duration) -> QueueResult<()> {
        self.schedule(body, delay).await
    }
}
