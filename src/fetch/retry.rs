//! Bounded retries with exponential backoff around a [`Fetcher`].
//!
//! # Retry Strategy
//!
//! Each attempt runs under a hard timeout that drops the in-flight request.
//! The classified [`FetchOutcome`] decides what happens next:
//!
//! - success, or a failure that will not clear up by itself (4xx, HTML with a
//!   non-5xx status, malformed JSON): return immediately
//! - timeout, transport failure, 5xx: back off and try again
//!
//! ```text
//! delay(n) = base * 2^(n-1) + random_jitter(0..=jitter)
//! ```
//!
//! When attempts run out, the last outcome is returned as-is; callers treat it
//! as one page's failure, never the run's.

use rand::{Rng, rng};
use std::time::{Duration, Instant};
use tokio::time::{sleep, timeout};
use tracing::{debug, instrument, warn};

use super::{FetchOutcome, Fetcher};
use crate::config::FeedConfig;

/// Longest delay a single backoff may reach, whatever the attempt count.
const MAX_DELAY: Duration = Duration::from_secs(30);

#[derive(Debug)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub max_attempts: u32,
    /// Hard limit on a single attempt.
    pub timeout: Duration,
    /// Delay before the second attempt; doubles after that.
    pub base_delay: Duration,
    /// Upper bound of random jitter added to each delay.
    pub max_jitter: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, timeout: Duration, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            timeout,
            base_delay,
            max_jitter: Duration::ZERO,
        }
    }

    pub fn from_config(config: &FeedConfig) -> Self {
        Self {
            max_jitter: Duration::from_millis(config.backoff_jitter_ms),
            ..Self::new(
                config.max_attempts,
                config.timeout(),
                Duration::from_millis(config.backoff_base_ms),
            )
        }
    }

    /// Delay to wait after failed attempt `attempt` (1-based), without jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(1 << exp).min(MAX_DELAY)
    }

    fn jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rng().random_range(0..=max_ms))
        }
    }

    /// Fetch `url`, retrying retryable failures up to `max_attempts` times in total.
    #[instrument(level = "info", skip(self, fetcher), fields(max_attempts = self.max_attempts))]
    pub async fn fetch_resilient<F: Fetcher>(&self, fetcher: &F, url: &str) -> FetchOutcome {
        let total_t0 = Instant::now();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let attempt_t0 = Instant::now();
            let outcome = match timeout(self.timeout, fetcher.get(url, self.timeout)).await {
                Ok(Ok(response)) => FetchOutcome::from_response(response),
                Ok(Err(err)) => FetchOutcome::from_transport(err),
                Err(_elapsed) => FetchOutcome::Timeout,
            };

            let Some(failure) = outcome.failure() else {
                debug!(attempt, elapsed_ms = total_t0.elapsed().as_millis() as u64, "Fetch succeeded");
                return outcome;
            };

            if !failure.is_retryable() {
                warn!(attempt, error = %failure, "Terminal fetch failure; not retrying");
                return outcome;
            }
            if attempt >= self.max_attempts {
                warn!(
                    attempt,
                    max = self.max_attempts,
                    elapsed_ms_total = total_t0.elapsed().as_millis() as u64,
                    error = %failure,
                    "Fetch exhausted retries"
                );
                return outcome;
            }

            let delay = self.backoff(attempt) + self.jitter();
            warn!(
                attempt,
                max = self.max_attempts,
                elapsed_ms_attempt = attempt_t0.elapsed().as_millis() as u64,
                ?delay,
                error = %failure,
                "Fetch attempt failed; backing off"
            );
            sleep(delay).await;
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::fetch::{RawResponse, TransportError};
    use std::cell::RefCell;
    use std::collections::VecDeque;

    /// Replays a fixed sequence of results and counts calls.
    /// Once the script runs out, the last entry repeats.
    pub(crate) struct ScriptedFetcher {
        script: RefCell<VecDeque<Result<RawResponse, TransportError>>>,
        last: RefCell<Option<Result<RawResponse, TransportError>>>,
        pub calls: RefCell<Vec<String>>,
    }

    impl ScriptedFetcher {
        pub(crate) fn new(script: Vec<Result<RawResponse, TransportError>>) -> Self {
            Self {
                script: RefCell::new(script.into()),
                last: RefCell::new(None),
                calls: RefCell::new(Vec::new()),
            }
        }

        pub(crate) fn call_count(&self) -> usize {
            self.calls.borrow().len()
        }
    }

    impl Fetcher for ScriptedFetcher {
        async fn get(&self, url: &str, _timeout: Duration) -> Result<RawResponse, TransportError> {
            self.calls.borrow_mut().push(url.to_string());
            let next = self.script.borrow_mut().pop_front();
            match next {
                Some(result) => {
                    *self.last.borrow_mut() = Some(result.clone());
                    result
                }
                None => self
                    .last
                    .borrow()
                    .clone()
                    .unwrap_or(Err(TransportError::Network("empty script".into()))),
            }
        }
    }

    pub(crate) fn ok_json(body: &str) -> Result<RawResponse, TransportError> {
        Ok(RawResponse {
            status: 200,
            content_type: Some("application/json".to_string()),
            body: body.to_string(),
        })
    }

    pub(crate) fn with_status(status: u16, body: &str) -> Result<RawResponse, TransportError> {
        Ok(RawResponse {
            status,
            content_type: None,
            body: body.to_string(),
        })
    }

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_secs(1), Duration::ZERO)
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let fetcher = ScriptedFetcher::new(vec![ok_json(r#"{"posts":[]}"#)]);
        let outcome = policy(3).fetch_resilient(&fetcher, "http://x/1").await;
        assert!(matches!(outcome, FetchOutcome::Success { status: 200, .. }));
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let fetcher = ScriptedFetcher::new(vec![
            Err(TransportError::Network("connection reset".into())),
            with_status(503, "<html>busy</html>"),
            ok_json("[]"),
        ]);
        let outcome = policy(3).fetch_resilient(&fetcher, "http://x/1").await;
        assert!(matches!(outcome, FetchOutcome::Success { .. }));
        assert_eq!(fetcher.call_count(), 3);
    }

    #[tokio::test]
    async fn test_client_error_is_not_retried() {
        let fetcher = ScriptedFetcher::new(vec![with_status(404, r#"{"message":"gone"}"#)]);
        let outcome = policy(5).fetch_resilient(&fetcher, "http://x/1").await;
        assert!(matches!(outcome, FetchOutcome::HttpStatus { status: 404, .. }));
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_html_block_page_is_not_retried() {
        let fetcher = ScriptedFetcher::new(vec![with_status(200, "<html>blocked</html>")]);
        let outcome = policy(5).fetch_resilient(&fetcher, "http://x/1").await;
        assert!(matches!(outcome, FetchOutcome::HtmlDetected { status: 200, .. }));
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_malformed_json_is_not_retried() {
        let fetcher = ScriptedFetcher::new(vec![ok_json("{\"posts\": [")]);
        let outcome = policy(5).fetch_resilient(&fetcher, "http://x/1").await;
        assert!(matches!(outcome, FetchOutcome::InvalidJson { .. }));
        assert_eq!(fetcher.call_count(), 1);
    }

    #[tokio::test]
    async fn test_attempts_are_bounded_and_last_outcome_returned() {
        for max_attempts in 1..=4 {
            let fetcher = ScriptedFetcher::new(vec![with_status(500, "oops")]);
            let outcome = policy(max_attempts)
                .fetch_resilient(&fetcher, "http://x/1")
                .await;
            assert!(matches!(outcome, FetchOutcome::HttpStatus { status: 500, .. }));
            assert_eq!(fetcher.call_count(), max_attempts as usize);
        }
    }

    #[tokio::test]
    async fn test_zero_attempts_still_tries_once() {
        let fetcher = ScriptedFetcher::new(vec![with_status(500, "oops")]);
        RetryPolicy::new(0, Duration::from_secs(1), Duration::ZERO)
            .fetch_resilient(&fetcher, "http://x/1")
            .await;
        assert_eq!(fetcher.call_count(), 1);
    }

    struct HangingFetcher {
        calls: RefCell<u32>,
    }

    impl Fetcher for HangingFetcher {
        async fn get(&self, _url: &str, _timeout: Duration) -> Result<RawResponse, TransportError> {
            *self.calls.borrow_mut() += 1;
            sleep(Duration::from_secs(60)).await;
            ok_json("[]")
        }
    }

    #[tokio::test]
    async fn test_hung_request_is_cut_off_and_retried() {
        let fetcher = HangingFetcher {
            calls: RefCell::new(0),
        };
        let policy = RetryPolicy::new(2, Duration::from_millis(20), Duration::ZERO);
        let outcome = policy.fetch_resilient(&fetcher, "http://x/1").await;
        assert_eq!(outcome, FetchOutcome::Timeout);
        assert_eq!(*fetcher.calls.borrow(), 2);
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(10, Duration::from_secs(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1_000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2_000));
        assert_eq!(policy.backoff(40), MAX_DELAY);
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let mut policy = RetryPolicy::new(3, Duration::from_secs(1), Duration::ZERO);
        assert_eq!(policy.jitter(), Duration::ZERO);
        policy.max_jitter = Duration::from_millis(250);
        for _ in 0..100 {
            assert!(policy.jitter() <= Duration::from_millis(250));
        }
    }

    #[test]
    fn test_from_config() {
        let config = FeedConfig::default();
        let policy = RetryPolicy::from_config(&config);
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.timeout, Duration::from_millis(12_000));
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.max_jitter, Duration::ZERO);
    }
}
