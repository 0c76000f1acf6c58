//! Exponential backoff with jitter for throttled upstreams.

use super::FetchError;
use core::future::Future;
use core::time::Duration;
use rand::Rng;

/// Log target for retry decisions
const LOG_TARGET: &str = "retry";

/// Decides whether an error is worth another attempt.
pub type RetryClassifier = fn(&FetchError) -> bool;

/// One retry policy shared by every source that needs rate-limit backoff.
///
/// Before attempt `n + 1` (with `n` counting from zero) the policy waits
/// `initial_delay * 2^n` plus a random jitter in `0..=max_jitter`. When the server supplied a
/// `Retry-After` delay, the wait is at least that long.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_jitter: Duration,
    pub classifier: RetryClassifier,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::rate_limited(5, Duration::from_secs(1), Duration::from_millis(500))
    }
}

impl RetryPolicy {
    /// A policy that retries only rate-limit failures.
    #[must_use]
    pub const fn rate_limited(max_attempts: u32, initial_delay: Duration, max_jitter: Duration) -> Self {
        Self {
            max_attempts,
            initial_delay,
            max_jitter,
            classifier: FetchError::is_rate_limited,
        }
    }

    #[must_use]
    pub const fn with_classifier(mut self, classifier: RetryClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Deterministic part of the wait before retrying after the zero-based `attempt`.
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        self.initial_delay.saturating_mul(2u32.saturating_pow(attempt))
    }

    fn delay_for(&self, attempt: u32, error: &FetchError) -> Duration {
        let jitter_ms = u64::try_from(self.max_jitter.as_millis()).unwrap_or(u64::MAX);
        let jitter = Duration::from_millis(rand::rng().random_range(0..=jitter_ms));
        let delay = self.base_delay(attempt).saturating_add(jitter);
        error.retry_after().map_or(delay, |requested| delay.max(requested))
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or runs out of attempts.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, FetchError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, FetchError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0;
        let mut requests_sent = 0u32;

        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if attempt + 1 < max_attempts && (self.classifier)(&e) => {
                    requests_sent = requests_sent.saturating_add(e.attempts());
                    let delay = self.delay_for(attempt, &e);
                    log::warn!(
                        target: LOG_TARGET,
                        "'{label}' was throttled (attempt {}/{max_attempts}), backing off for {}ms",
                        attempt + 1,
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => {
                    if attempt == 0 {
                        return Err(e);
                    }

                    let total = requests_sent.saturating_add(e.attempts());
                    let e = e.with_attempts(total);
                    if (self.classifier)(&e) {
                        log::warn!(target: LOG_TARGET, "Giving up on '{label}' after {max_attempts} attempts: {e}");
                    }
                    return Err(e);
                }
            }
        }
    }
}
