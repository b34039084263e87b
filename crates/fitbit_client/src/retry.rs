use async_trait::async_trait;
use std::time::Duration;

use crate::ApiErrorKind;

/// Retry policy with a fixed delay per failure class.
///
/// After every failed attempt the client also waits `pacing_delay`, on top of
/// the class-specific delay.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Added to the server's `Retry-After` on a 429.
    pub rate_limit_padding: Duration,
    /// Base used when a 429 carries no usable `Retry-After`.
    pub retry_after_fallback: Duration,
    pub unauthorized_delay: Duration,
    pub server_error_delay: Duration,
    pub pacing_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_padding: Duration::from_secs(15),
            retry_after_fallback: Duration::from_secs(60),
            unauthorized_delay: Duration::from_secs(30),
            server_error_delay: Duration::from_secs(120),
            pacing_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Delay before the next attempt for a retryable class, excluding pacing.
    ///
    /// `retry_after` is the raw `Retry-After` header value, if any.
    pub fn backoff_for(&self, kind: ApiErrorKind, retry_after: Option<&str>) -> Option<Duration> {
        match kind {
            ApiErrorKind::RateLimited => {
                let base = retry_after
                    .and_then(|v| v.trim().parse::<u64>().ok())
                    .map(Duration::from_secs)
                    .unwrap_or(self.retry_after_fallback);
                Some(base + self.rate_limit_padding)
            }
            ApiErrorKind::Unauthorized => Some(self.unauthorized_delay),
            ApiErrorKind::ServerError => Some(self.server_error_delay),
            ApiErrorKind::Unexpected => None,
        }
    }
}

/// Source of the retry loop's waits. Production code sleeps on the tokio
/// timer; tests substitute a recorder.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

#[derive(Clone, Copy, Debug, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_pads_retry_after() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.backoff_for(ApiErrorKind::RateLimited, Some("5")),
            Some(Duration::from_secs(20))
        );
        assert_eq!(
            policy.backoff_for(ApiErrorKind::RateLimited, Some(" 120 ")),
            Some(Duration::from_secs(135))
        );
    }

    #[test]
    fn rate_limit_without_header_uses_fallback() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.backoff_for(ApiErrorKind::RateLimited, None),
            Some(Duration::from_secs(75))
        );
        assert_eq!(
            policy.backoff_for(ApiErrorKind::RateLimited, Some("Wed, 21 Oct 2015")),
            Some(Duration::from_secs(75))
        );
    }

    #[test]
    fn fixed_delays_per_class() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.backoff_for(ApiErrorKind::Unauthorized, None),
            Some(Duration::from_secs(30))
        );
        assert_eq!(
            policy.backoff_for(ApiErrorKind::ServerError, None),
            Some(Duration::from_secs(120))
        );
        assert_eq!(policy.backoff_for(ApiErrorKind::Unexpected, None), None);
    }

    #[test]
    fn max_attempts_is_at_least_one() {
        let policy = RetryPolicy::default().with_max_attempts(0);
        assert_eq!(policy.max_attempts, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn tokio_sleeper_waits_on_the_timer() {
        let start = tokio::time::Instant::now();
        TokioSleeper.sleep(Duration::from_secs(30)).await;
        assert!(start.elapsed() >= Duration::from_secs(30));
    }
}
