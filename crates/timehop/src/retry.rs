//! Bounded retry for rate-limited requests.
//!
//! Both vendors answer throttled calls with HTTP 429. The engine reacts by
//! sleeping a fixed cooldown and trying again, up to a fixed number of
//! attempts. Exhausting the attempts is reported separately from ordinary
//! failures so sustained throttling can be told apart from a hard error.

use std::future::Future;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use backon::{ConstantBuilder, Retryable};

/// Total attempts (first try included) before giving up on a throttled call.
pub const MAX_ATTEMPTS: usize = 5;

/// Pause between attempts after a 429.
pub const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(5);

/// Configuration for retry operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryConfig {
    /// Fixed delay slept after every rate-limited attempt.
    pub cooldown: Duration,
    /// Attempts in total, including the first one.
    pub max_attempts: usize,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            cooldown: RATE_LIMIT_COOLDOWN,
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new(cooldown: Duration, max_attempts: usize) -> Self {
        Self {
            cooldown,
            max_attempts: max_attempts.max(1),
        }
    }

    /// Build the constant backoff strategy. backon counts retries, not
    /// attempts, hence the `- 1`.
    #[must_use]
    pub fn into_backoff(self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.cooldown)
            .with_max_times(self.max_attempts.saturating_sub(1))
    }
}

/// Outcome of a failed [`with_retry`] call.
#[derive(Debug)]
pub enum RetryError<E> {
    /// Every attempt was rate limited.
    Exhausted { last: E, attempts: u32 },
    /// A non-retryable error ended the call.
    Failed(E),
}

/// Run `operation`, retrying while `is_rate_limit` holds.
///
/// `on_backoff` is invoked before each cooldown with the attempt number that
/// was just throttled and the delay about to be slept.
pub async fn with_retry<T, E, F, Fut, IsRateLimit, OnBackoff>(
    mut operation: F,
    config: RetryConfig,
    is_rate_limit: IsRateLimit,
    on_backoff: OnBackoff,
) -> Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    IsRateLimit: Fn(&E) -> bool,
    OnBackoff: Fn(u32, Duration),
{
    let attempt = AtomicU32::new(0);

    let retry_op = || {
        attempt.fetch_add(1, Ordering::SeqCst);
        operation()
    };

    let result = retry_op
        .retry(config.into_backoff())
        .when(|e| is_rate_limit(e))
        .notify(|_err, dur| on_backoff(attempt.load(Ordering::SeqCst), dur))
        .await;

    result.map_err(|err| {
        if is_rate_limit(&err) {
            RetryError::Exhausted {
                last: err,
                attempts: attempt.load(Ordering::SeqCst),
            }
        } else {
            RetryError::Failed(err)
        }
    })
}
