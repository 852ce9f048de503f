//! Chunked, rate-limited iteration
//!
//! [`by_chunk`] hands consecutive slices of at most `count` items to a worker
//! and sleeps for the rate limit interval between chunks.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::config::{ConfigError, HumanDuration};

/// How many entities may be pushed per interval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimit {
    /// Maximum items per chunk
    pub count: usize,
    /// Pause between chunks; none means no pause
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<HumanDuration>,
}

impl Default for RateLimit {
    fn default() -> Self {
        Self {
            count: 300,
            interval: Some(HumanDuration::hours(1)),
        }
    }
}

impl RateLimit {
    pub fn new(count: usize, interval: Option<Duration>) -> Self {
        Self {
            count,
            interval: interval.map(|d| HumanDuration::milliseconds(d.as_millis() as u64)),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.count == 0 {
            return Err(ConfigError::InvalidValue(
                "rate_limit.count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Pause between chunks, `None` when absent or zero
    pub fn interval(&self) -> Option<Duration> {
        self.interval
            .map(|d| d.to_duration())
            .filter(|d| !d.is_zero())
    }
}

/// Run `worker` over consecutive chunks of `items`, pacing between chunks
///
/// Results are concatenated in chunk order. No delay follows the last chunk,
/// so an empty input or a single chunk completes without sleeping.
pub async fn by_chunk<'a, T, R, F, Fut>(items: &'a [T], rate: &RateLimit, mut worker: F) -> Vec<R>
where
    F: FnMut(&'a [T]) -> Fut,
    Fut: Future<Output = Vec<R>>,
{
    // a zero count is rejected by RateLimit::validate; never let chunks() panic
    let count = rate.count.max(1);
    let interval = rate.interval();
    let total = items.len().div_ceil(count);
    let mut results = Vec::with_capacity(items.len());

    for (index, chunk) in items.chunks(count).enumerate() {
        results.extend(worker(chunk).await);

        if let Some(interval) = interval {
            if index + 1 < total {
                debug!(
                    chunk = index + 1,
                    total_chunks = total,
                    wait_ms = interval.as_millis() as u64,
                    "Waiting before next chunk"
                );
                tokio::time::sleep(interval).await;
            }
        }
    }

    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::Instant;

    fn per_second(count: usize) -> RateLimit {
        RateLimit::new(count, Some(Duration::from_secs(1)))
    }

    #[test]
    fn test_default_rate_limit() {
        let rate = RateLimit::default();
        assert_eq!(rate.count, 300);
        assert_eq!(rate.interval(), Some(Duration::from_secs(3600)));
    }

    #[test]
    fn test_zero_count_is_invalid() {
        assert!(matches!(
            RateLimit::new(0, None).validate(),
            Err(ConfigError::InvalidValue(_))
        ));
        assert!(RateLimit::new(1, None).validate().is_ok());
    }

    #[test]
    fn test_zero_interval_is_no_interval() {
        let rate = RateLimit {
            count: 2,
            interval: Some(HumanDuration::default()),
        };
        assert_eq!(rate.interval(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_chunks_are_paced() {
        let items = vec![1, 2, 3, 4, 5];
        let start = Instant::now();
        let chunk_log = Arc::new(Mutex::new(Vec::new()));

        let log = chunk_log.clone();
        let results = by_chunk(&items, &per_second(2), |chunk: &[i32]| {
            let log = log.clone();
            let chunk = chunk.to_vec();
            async move {
                log.lock()
                    .unwrap()
                    .push((start.elapsed().as_secs(), chunk.clone()));
                chunk.into_iter().map(|i| i * 10).collect::<Vec<_>>()
            }
        })
        .await;

        assert_eq!(results, vec![10, 20, 30, 40, 50]);
        assert_eq!(
            *chunk_log.lock().unwrap(),
            vec![(0, vec![1, 2]), (1, vec![3, 4]), (2, vec![5])]
        );
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_input_never_sleeps() {
        let items: Vec<i32> = Vec::new();
        let start = Instant::now();
        let calls = Arc::new(Mutex::new(0));

        let counter = calls.clone();
        let results = by_chunk(&items, &per_second(2), |chunk: &[i32]| {
            *counter.lock().unwrap() += 1;
            let len = chunk.len();
            async move { vec![len] }
        })
        .await;

        assert!(results.is_empty());
        assert_eq!(*calls.lock().unwrap(), 0);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_chunk_never_sleeps() {
        let items = vec!["a", "b", "c"];
        let start = Instant::now();

        let results = by_chunk(&items, &per_second(10), |chunk: &[&str]| {
            let chunk = chunk.to_vec();
            async move { chunk }
        })
        .await;

        assert_eq!(results, vec!["a", "b", "c"]);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_interval_runs_back_to_back() {
        let items: Vec<u32> = (0..7).collect();
        let start = Instant::now();
        let sizes = Arc::new(Mutex::new(Vec::new()));

        let log = sizes.clone();
        let results = by_chunk(&items, &RateLimit::new(3, None), |chunk: &[u32]| {
            log.lock().unwrap().push(chunk.len());
            let chunk = chunk.to_vec();
            async move { chunk }
        })
        .await;

        assert_eq!(results, items);
        assert_eq!(*sizes.lock().unwrap(), vec![3, 3, 1]);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_may_drop_items() {
        let items = vec![1, 2, 3, 4];

        let results = by_chunk(&items, &per_second(3), |chunk: &[i32]| {
            let kept: Vec<i32> = chunk.iter().copied().filter(|i| i % 2 == 0).collect();
            async move { kept }
        })
        .await;

        assert_eq!(results, vec![2, 4]);
    }
}
