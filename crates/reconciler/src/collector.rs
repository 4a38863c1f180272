//! Concurrent collection of repository activity signals.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use board::{
    ActivityWindow, ContributorStat, RepositoryId, RepositoryService, RetryPolicy, ServiceError,
    Timestamp,
};
use tracing::{debug, instrument, warn};

/// How often and how patiently a failed fetch is retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetrySettings {
    /// Total attempts per signal, including the first one.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubled for every further attempt.
    pub base_delay: Duration,
    /// Upper bound on any single delay, including service-requested ones.
    pub max_delay: Duration,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetrySettings {
    fn delay_for(&self, attempt: u32, requested: Option<Duration>) -> Duration {
        let backoff = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)));
        requested.unwrap_or(backoff).min(self.max_delay)
    }
}

/// Raw signals gathered for one repository.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RepositorySignals {
    pub contributors: Vec<ContributorStat>,
    pub window: ActivityWindow,
}

/// Gathers contributors, issues and pull requests from the repository service.
pub struct MetricsCollector {
    service: Arc<dyn RepositoryService>,
    retry: RetrySettings,
    window_days: i64,
}

impl MetricsCollector {
    /// Collector over the default 30-day window with default retries.
    pub fn new(service: Arc<dyn RepositoryService>) -> Self {
        Self {
            service,
            retry: RetrySettings::default(),
            window_days: ActivityWindow::DAYS,
        }
    }

    /// Overrides the retry settings.
    pub fn with_retry(mut self, retry: RetrySettings) -> Self {
        self.retry = retry;
        self
    }

    /// Fetches all three signals concurrently.
    ///
    /// The three fetches share nothing and are retried independently; the
    /// first one to fail for good fails the whole collection (the remaining
    /// in-flight fetches are dropped).
    #[instrument(skip_all, fields(repo = %repo))]
    pub async fn collect(&self, repo: &RepositoryId) -> Result<RepositorySignals, ServiceError> {
        let since = Timestamp::now().days_before(self.window_days);

        let (contributors, issues, pull_requests) = tokio::try_join!(
            self.with_retries("contributors", || self.service.list_contributors(repo)),
            self.with_retries("issues", || self.service.list_issues(repo, since)),
            self.with_retries("pull_requests", || self.service.list_pull_requests(repo)),
        )?;

        debug!(
            contributors = contributors.len(),
            issues = issues.len(),
            pull_requests = pull_requests.len(),
            "collected repository signals"
        );

        Ok(RepositorySignals {
            contributors,
            window: ActivityWindow {
                issues,
                pull_requests,
            },
        })
    }

    async fn with_retries<T, F, Fut>(
        &self,
        signal: &'static str,
        mut call: F,
    ) -> Result<T, ServiceError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ServiceError>>,
    {
        let mut attempt = 1;
        loop {
            let error = match call().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let requested = match error.retry_policy() {
                RetryPolicy::Retryable { after } if attempt < self.retry.max_attempts => after,
                _ => return Err(error),
            };

            let delay = self.retry.delay_for(attempt, requested);
            warn!(
                signal,
                attempt,
                %error,
                delay_ms = delay.as_millis() as u64,
                "fetch failed; retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_is_capped() {
        let retry = RetrySettings {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(5),
        };
        assert_eq!(retry.delay_for(1, None), Duration::from_secs(1));
        assert_eq!(retry.delay_for(2, None), Duration::from_secs(2));
        assert_eq!(retry.delay_for(3, None), Duration::from_secs(4));
        assert_eq!(retry.delay_for(4, None), Duration::from_secs(5));
    }

    #[test]
    fn service_requested_delay_wins_but_is_capped() {
        let retry = RetrySettings::default();
        assert_eq!(
            retry.delay_for(1, Some(Duration::from_secs(3))),
            Duration::from_secs(3)
        );
        assert_eq!(
            retry.delay_for(1, Some(Duration::from_secs(3600))),
            Duration::from_secs(30)
        );
    }
}
