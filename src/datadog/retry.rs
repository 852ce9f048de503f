//! Retry with exponential backoff for Datadog API calls

use crate::config::RetryConfig;
use crate::error::RetryableError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Retries transient failures with exponential backoff
///
/// A wait requested by the remote side (`Retry-After`) raises the backoff
/// for that attempt, still capped at `max_backoff_ms`.
#[derive(Debug, Clone)]
pub struct RetryManager {
    config: RetryConfig,
}

impl RetryManager {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Run `operation` until it succeeds, fails permanently, or retries run out
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: RetryableError + std::fmt::Display,
    {
        let mut attempt = 0u32;

        loop {
            let err = match operation().await {
                Ok(result) => return Ok(result),
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= self.config.max_retries {
                warn!(
                    attempts = attempt + 1,
                    max_retries = self.config.max_retries,
                    error = %err,
                    "Max retries exhausted"
                );
                return Err(err);
            }

            let backoff = self.backoff_for(attempt, err.retry_after());
            debug!(
                attempt = attempt + 1,
                max_retries = self.config.max_retries,
                backoff_ms = backoff.as_millis() as u64,
                error = %err,
                "Retrying after transient error"
            );

            tokio::time::sleep(backoff).await;
            attempt += 1;
        }
    }

    fn backoff_for(&self, attempt: u32, retry_after: Option<Duration>) -> Duration {
        let backoff = self.calculate_backoff(attempt);
        let max = Duration::from_millis(self.config.max_backoff_ms);
        match retry_after {
            Some(requested) => backoff.max(requested).min(max),
            None => backoff,
        }
    }

    /// `initial * multiplier^attempt`, capped, with 50-100% jitter when enabled
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let base = self.config.initial_backoff_ms as f64
            * self.config.backoff_multiplier.powi(attempt as i32);
        let capped = base.min(self.config.max_backoff_ms as f64);

        let delay = if self.config.jitter {
            capped * rand::thread_rng().gen_range(0.5..1.0)
        } else {
            capped
        };

        Duration::from_millis(delay as u64)
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }
}
