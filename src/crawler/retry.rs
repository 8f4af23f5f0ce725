//! Whole-sequence retry
//!
//! A target pipeline is retried from its first stage when any stage escapes
//! with an error. Nothing is resumed: every attempt starts from clean state.

use crate::config::CrawlerConfig;
use crate::IngestError;
use std::future::Future;
use std::time::Duration;

/// Attempt budget and pause between attempts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub attempts: u32,

    /// Pause before each retry
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            delay,
        }
    }

    /// A single attempt with no retries
    pub fn once() -> Self {
        Self::new(1, Duration::ZERO)
    }

    pub fn from_config(config: &CrawlerConfig) -> Self {
        Self::new(
            config.retry_attempts,
            Duration::from_millis(config.retry_delay_ms),
        )
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(1))
    }
}

/// Runs `operation` until it succeeds or the attempt budget is spent
///
/// `operation` receives the 1-based attempt number. The last error is
/// returned wrapped in `IngestError::RetriesExhausted`.
pub async fn retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut operation: F) -> crate::Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = crate::Result<T>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < attempts => {
                tracing::warn!(
                    "Attempt {}/{} for {} failed: {}",
                    attempt,
                    attempts,
                    label,
                    error
                );
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
                attempt += 1;
            }
            Err(error) => {
                return Err(IngestError::RetriesExhausted {
                    attempts: attempt,
                    source: Box::new(error),
                })
            }
        }
    }
}
