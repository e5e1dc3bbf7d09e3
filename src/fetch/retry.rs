//! Bounded retry with exponential backoff

use crate::config::CrawlSettings;
use crate::fetch::{PageFetchResult, PageFetcher};
use crate::Result;
use std::time::Duration;
use tracing::warn;
use url::Url;

/// Retry budget and backoff curve for page fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl RetryPolicy {
    pub fn from_settings(settings: &CrawlSettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            initial_backoff: settings.backoff,
            max_backoff: settings.max_backoff,
        }
    }

    /// Policy with no retries
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Backoff before retry number `attempt` (1-based), doubling each time
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// Fetches `url`, retrying transient failures
///
/// Permanent failures (4xx, blocking pages) are returned immediately; the
/// last transient error is returned once the retry budget is spent.
pub async fn fetch_with_retry(
    fetcher: &dyn PageFetcher,
    url: &Url,
    policy: &RetryPolicy,
) -> Result<PageFetchResult> {
    let mut attempt = 0;
    loop {
        match fetcher.fetch(url).await {
            Ok(page) => return Ok(page),
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                let wait = policy.calculate_backoff(attempt);
                warn!(
                    "Fetch of {} failed ({}); retry {}/{} in {:?}",
                    url, e, attempt, policy.max_retries, wait
                );
                tokio::time::sleep(wait).await;
            }
            Err(e) => return Err(e),
        }
    }
}
