//! Queue executor.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use clipgen_queue::{QueuedRequest, RequestQueue};

use crate::error::WorkerResult;
use crate::metrics::{record_dead_lettered, set_queue_lengths};
use crate::orchestrator::ClipOrchestrator;

/// Delayed retries promoted per maintenance pass.
const PROMOTE_BATCH: usize = 100;

/// Stale deliveries reclaimed per maintenance pass.
const CLAIM_BATCH: usize = 5;

/// Feeds queued requests to the orchestrator, one at a time.
pub struct RequestExecutor {
    queue: Arc<RequestQueue>,
    orchestrator: Arc<ClipOrchestrator>,
    shutdown: tokio::sync::watch::Sender<bool>,
    consumer_name: String,
}

impl RequestExecutor {
    pub fn new(queue: RequestQueue, orchestrator: ClipOrchestrator) -> Self {
        let (shutdown, _) = tokio::sync::watch::channel(false);
        let consumer_name = format!("worker-{}", Uuid::new_v4());

        Self {
            queue: Arc::new(queue),
            orchestrator: Arc::new(orchestrator),
            shutdown,
            consumer_name,
        }
    }

    pub fn consumer_name(&self) -> &str {
        &self.consumer_name
    }

    /// Run until [`shutdown`](Self::shutdown) is called.
    ///
    /// A request in progress always runs to completion; the shutdown
    /// signal is only observed between requests.
    pub async fn run(&self) -> WorkerResult<()> {
        info!("Starting request executor '{}'", self.consumer_name);

        self.queue.init().await?;

        let config = self.orchestrator.config();
        let block_ms = config.poll_block.as_millis() as u64;
        let claim_interval = config.claim_interval;

        let mut shutdown_rx = self.shutdown.subscribe();
        let mut last_maintenance: Option<Instant> = None;

        loop {
            if *shutdown_rx.borrow() {
                break;
            }

            if last_maintenance.map_or(true, |at| at.elapsed() >= claim_interval) {
                self.maintain().await;
                last_maintenance = Some(Instant::now());
            }

            let batch = tokio::select! {
                _ = shutdown_rx.changed() => continue,
                result = self.queue.consume(&self.consumer_name, block_ms, 1) => result,
            };

            match batch {
                Ok(requests) => {
                    for request in requests {
                        self.execute(request).await;
                    }
                }
                Err(e) => {
                    error!("Error consuming requests: {}", e);
                    // Back off on error
                    tokio::time::sleep(Duration::from_secs(5)).await;
                }
            }
        }

        info!("Request executor stopped");
        Ok(())
    }

    /// Promote due retries, re-run stale deliveries, refresh gauges.
    async fn maintain(&self) {
        match self
            .queue
            .promote_due(Utc::now().timestamp_millis(), PROMOTE_BATCH)
            .await
        {
            Ok(0) => {}
            Ok(promoted) => info!("Promoted {} delayed request(s)", promoted),
            Err(e) => warn!("Failed to promote delayed retries: {}", e),
        }

        match self.queue.claim_pending(&self.consumer_name, CLAIM_BATCH).await {
            Ok(requests) => {
                for request in requests {
                    self.execute(request).await;
                }
            }
            Err(e) => warn!("Failed to claim pending requests: {}", e),
        }

        let lengths = tokio::try_join!(
            self.queue.len(),
            self.queue.delayed_len(),
            self.queue.dlq_len()
        );
        match lengths {
            Ok((pending, delayed, dlq)) => set_queue_lengths(pending, delayed, dlq),
            Err(e) => debug!("Failed to read queue lengths: {}", e),
        }
    }

    /// Process one request and settle its queue entry.
    async fn execute(&self, request: QueuedRequest) {
        let message_id = request.message_id.clone();
        let result = self
            .orchestrator
            .handle_message(&request.body, &request.sent_timestamp)
            .await;

        match result {
            Ok(metadata) => {
                debug!(
                    message_id = %message_id,
                    clip_id = %metadata.clip_id,
                    status = %metadata.status,
                    "Request settled"
                );
                if let Err(e) = self.queue.ack(&message_id).await {
                    error!("Failed to ack request {}: {}", message_id, e);
                }
            }
            Err(e) if e.is_malformed_request() => {
                warn!("Dropping malformed request {}: {}", message_id, e);
                if let Err(e) = self.queue.ack(&message_id).await {
                    error!("Failed to ack request {}: {}", message_id, e);
                }
            }
            Err(e) => {
                error!("Request {} failed: {}", message_id, e);
                self.handle_failure(&request, &e.to_string()).await;
            }
        }
    }

    /// Leave the entry pending for redelivery, or dead-letter it once the
    /// delivery budget is spent.
    async fn handle_failure(&self, request: &QueuedRequest, error: &str) {
        let deliveries = match self.queue.increment_delivery(&request.message_id).await {
            Ok(count) => count,
            Err(e) => {
                error!("Failed to record delivery of {}: {}", request.message_id, e);
                return;
            }
        };

        if deliveries >= self.queue.max_deliveries() {
            match self.queue.dlq(request, error).await {
                Ok(()) => record_dead_lettered(),
                Err(e) => error!("Failed to move {} to DLQ: {}", request.message_id, e),
            }
        } else {
            info!(
                "Request {} left pending for redelivery ({}/{})",
                request.message_id,
                deliveries,
                self.queue.max_deliveries()
            );
        }
    }

    /// Signal shutdown.
    pub fn shutdown(&self) {
        self.shutdown.send_replace(true);
    }
}
