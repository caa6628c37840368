//! Retry logic for rate-limited requests
//!
//! Rate limiting (429) is the only condition retried by default. Server
//! errors (5xx) can be opted into through [`RetryPolicy::retry_server_errors`].
//! The decision ([`RetryPolicy::should_retry`]) and the wait
//! ([`RetryPolicy::delay_for`]) are plain functions; the loop in
//! [`execute_with_retry`] only glues them to a [`Sleeper`].

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use backoff::backoff::Backoff;
use backoff::ExponentialBackoff;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::http::error::{ErrorClassification, DEFAULT_RETRY_AFTER};

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt (3 retries = at most 4 attempts)
    pub max_retries: u32,
    /// Wait assumed when a 429 declares no retry hint
    pub rate_limit_fallback: Duration,
    /// Also retry 5xx responses
    pub retry_server_errors: bool,
    /// First wait before retrying a 5xx
    pub server_error_base_delay: Duration,
    /// Longest wait before retrying a 5xx
    pub server_error_max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            rate_limit_fallback: DEFAULT_RETRY_AFTER,
            retry_server_errors: false,
            server_error_base_delay: Duration::from_secs(1),
            server_error_max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Create a new retry policy with a custom retry ceiling
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Default::default()
        }
    }

    /// Never retry anything
    pub fn disabled() -> Self {
        Self::new(0)
    }

    /// Set the wait used for 429s without a retry hint
    pub fn with_rate_limit_fallback(mut self, fallback: Duration) -> Self {
        self.rate_limit_fallback = fallback;
        self
    }

    /// Enable or disable retries for 5xx responses
    pub fn with_server_error_retries(mut self, enabled: bool) -> Self {
        self.retry_server_errors = enabled;
        self
    }

    /// Whether the error is worth another attempt at all
    pub fn is_retryable(&self, error: &Error) -> bool {
        match error {
            Error::RateLimit { .. } => true,
            Error::Platform { .. } if self.retry_server_errors => {
                ErrorClassification::of(error) == Some(ErrorClassification::ServerError)
            }
            _ => false,
        }
    }

    /// Decide whether to retry after `attempt` attempts (1-based) failed with `error`
    pub fn should_retry(&self, error: &Error, attempt: u32) -> bool {
        attempt <= self.max_retries && self.is_retryable(error)
    }

    /// Wait before the next attempt after `attempt` attempts failed with `error`
    pub fn delay_for(&self, error: &Error, attempt: u32) -> Duration {
        match error {
            Error::RateLimit { retry_after, .. } => *retry_after,
            _ => {
                let mut backoff = self.server_error_backoff();
                let mut delay = self.server_error_base_delay;
                for _ in 0..attempt.max(1) {
                    match backoff.next_backoff() {
                        Some(next) => delay = next,
                        None => break,
                    }
                    if delay >= self.server_error_max_delay {
                        break;
                    }
                }
                delay.min(self.server_error_max_delay)
            }
        }
    }

    /// Fresh, jitter-free exponential backoff for 5xx retries
    pub fn server_error_backoff(&self) -> ExponentialBackoff {
        let mut backoff = ExponentialBackoff {
            initial_interval: self.server_error_base_delay,
            max_interval: self.server_error_max_delay,
            multiplier: 2.0,
            randomization_factor: 0.0,
            max_elapsed_time: None,
            ..Default::default()
        };
        backoff.reset();
        backoff
    }

    /// Combined decision for one failed attempt
    pub fn decide(&self, error: &Error, attempt: u32) -> RetryDecision {
        if self.should_retry(error, attempt) {
            RetryDecision::Retry {
                delay: self.delay_for(error, attempt),
            }
        } else {
            RetryDecision::NoRetry
        }
    }
}

/// Decision on whether to retry a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry the request after the specified delay
    Retry { delay: Duration },
    /// Do not retry the request
    NoRetry,
}

/// Suspends the current logical operation between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Sleeper backed by the tokio timer; only the calling task waits
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Execute a request with retry logic
pub async fn execute_with_retry<F, Fut, T>(
    mut request_fn: F,
    policy: &RetryPolicy,
    sleeper: &dyn Sleeper,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let error = match request_fn().await {
            Ok(response) => return Ok(response),
            Err(error) => error,
        };

        match policy.decide(&error, attempt) {
            RetryDecision::Retry { delay } => {
                warn!(
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    code = error.code(),
                    "Request failed, retrying"
                );
                sleeper.sleep(delay).await;
            }
            RetryDecision::NoRetry => {
                debug!(attempt, code = error.code(), "Request failed, not retrying");
                return Err(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    fn rate_limited(secs: u64) -> Error {
        Error::RateLimit {
            message: "Rate limited".to_string(),
            retry_after: Duration::from_secs(secs),
        }
    }

    fn server_error() -> Error {
        Error::Platform {
            message: "Server error".to_string(),
            error_code: None,
            http_status: Some(500),
            details: None,
        }
    }

    #[test]
    fn test_default_retry_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_retries, 3);
        assert_eq!(policy.rate_limit_fallback, Duration::from_secs(1));
        assert!(!policy.retry_server_errors);
    }

    #[test]
    fn test_should_retry_respects_ceiling() {
        let policy = RetryPolicy::default();
        let error = rate_limited(2);

        assert!(policy.should_retry(&error, 1));
        assert!(policy.should_retry(&error, 3));
        assert!(!policy.should_retry(&error, 4));
    }

    #[test]
    fn test_non_retryable_errors() {
        let policy = RetryPolicy::default();

        let auth = Error::Authentication {
            message: "Unauthorized".to_string(),
            http_status: 401,
        };
        let not_found = Error::NotFound {
            resource: "/instances/1".to_string(),
            message: "missing".to_string(),
        };
        let timeout = Error::Timeout {
            path: "/llm/models".to_string(),
            timeout: Duration::from_secs(60),
        };

        assert_eq!(policy.decide(&auth, 1), RetryDecision::NoRetry);
        assert_eq!(policy.decide(&not_found, 1), RetryDecision::NoRetry);
        assert_eq!(policy.decide(&timeout, 1), RetryDecision::NoRetry);
        assert_eq!(policy.decide(&server_error(), 1), RetryDecision::NoRetry);
    }

    #[test]
    fn test_retry_after_is_the_delay() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.decide(&rate_limited(10), 1),
            RetryDecision::Retry {
                delay: Duration::from_secs(10)
            }
        );
    }

    #[test]
    fn test_server_error_opt_in_backoff() {
        let policy = RetryPolicy::default().with_server_error_retries(true);
        let error = server_error();

        assert_eq!(policy.delay_for(&error, 1), Duration::from_secs(1));
        assert_eq!(policy.delay_for(&error, 2), Duration::from_secs(2));
        assert_eq!(policy.delay_for(&error, 3), Duration::from_secs(4));
        assert_eq!(policy.delay_for(&error, 40), Duration::from_secs(30));
        // Each call starts from a fresh backoff
        assert_eq!(policy.delay_for(&error, 2), Duration::from_secs(2));

        let mut backoff = policy.server_error_backoff();
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(1)));
        assert_eq!(backoff.next_backoff(), Some(Duration::from_secs(2)));
        assert!(policy.should_retry(&error, 3));
        assert!(!policy.should_retry(&error, 4));

        // 4xx stays non-retryable even when 5xx retries are on
        let bad_request = Error::Platform {
            message: "bad".to_string(),
            error_code: None,
            http_status: Some(400),
            details: None,
        };
        assert!(!policy.should_retry(&bad_request, 1));
    }

    #[tokio::test]
    async fn test_execute_with_retry_recovers() {
        let sleeper = RecordingSleeper::default();
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result = execute_with_retry(
            move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(rate_limited(2))
                } else {
                    Ok("done")
                }
            },
            &RetryPolicy::default(),
            &sleeper,
        )
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
        assert_eq!(
            *sleeper.sleeps.lock().unwrap(),
            vec![Duration::from_secs(2), Duration::from_secs(2)]
        );
    }

    #[tokio::test]
    async fn test_execute_with_retry_surfaces_rate_limit_after_ceiling() {
        let sleeper = RecordingSleeper::default();
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<()> = execute_with_retry(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(rate_limited(1))
            },
            &RetryPolicy::default(),
            &sleeper,
        )
        .await;

        assert!(matches!(result, Err(Error::RateLimit { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 4);
        assert_eq!(sleeper.sleeps.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_execute_with_retry_fails_fast_on_auth() {
        let sleeper = RecordingSleeper::default();
        let counter = AtomicU32::new(0);
        let calls = &counter;

        let result: Result<()> = execute_with_retry(
            move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Error::Authentication {
                    message: "expired".to_string(),
                    http_status: 401,
                })
            },
            &RetryPolicy::default(),
            &sleeper,
        )
        .await;

        assert!(matches!(result, Err(Error::Authentication { .. })));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(sleeper.sleeps.lock().unwrap().is_empty());
    }
}
