//! Retry with exponential backoff for directory calls.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::DirectoryResult;
use crate::metrics::record_retry;

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay cap (in milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 200,
            max_delay_ms: 5000,
        }
    }
}

/// Execute an async operation, retrying network errors and 5xx responses.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: &str, op: F) -> DirectoryResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = DirectoryResult<T>>,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = calculate_delay(config, attempt);
                warn!(
                    operation = %operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Directory request failed, retrying: {}",
                    e
                );
                record_retry(operation);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Exponential backoff: base * 2^attempt, capped.
fn calculate_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exp_delay = config
        .base_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    Duration::from_millis(exp_delay.min(config.max_delay_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DirectoryError;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_calculate_delay_grows_and_caps() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 1000,
        };
        assert_eq!(calculate_delay(&config, 0), Duration::from_millis(100));
        assert_eq!(calculate_delay(&config, 2), Duration::from_millis(400));
        assert_eq!(calculate_delay(&config, 10), Duration::from_millis(1000));
    }

    #[tokio::test]
    async fn test_with_retry_stops_on_non_retryable() {
        let config = RetryConfig {
            max_retries: 3,
            base_delay_ms: 1,
            max_delay_ms: 1,
        };
        let calls = AtomicU32::new(0);
        let result: DirectoryResult<()> = with_retry(&config, "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(DirectoryError::from_http_status(400, "bad")) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_with_retry_retries_server_errors() {
        let config = RetryConfig {
            max_retries: 2,
            base_delay_ms: 1,
            max_delay_ms: 1,
        };
        let calls = AtomicU32::new(0);
        let result = with_retry(&config, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(DirectoryError::from_http_status(502, "bad gateway"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
