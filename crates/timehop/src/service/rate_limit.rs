use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};

use super::types::ServiceKind;

type GovernorRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Default spacing between requests per service.
pub mod rate_limits {
    /// Clockify allows 50 requests/second per workspace; 10/sec keeps well clear.
    pub const CLOCKIFY_REQUEST_DELAY_MS: u64 = 100;
    /// Toggl Track asks integrations to stay at about one request per second.
    pub const TOGGL_REQUEST_DELAY_MS: u64 = 1_000;
}

pub fn default_delay_for_service(kind: ServiceKind) -> Duration {
    match kind {
        ServiceKind::Clockify => Duration::from_millis(rate_limits::CLOCKIFY_REQUEST_DELAY_MS),
        ServiceKind::Toggl => Duration::from_millis(rate_limits::TOGGL_REQUEST_DELAY_MS),
    }
}

/// Spaces requests to one service at least `delay` apart.
///
/// Backed by a single-cell governor quota: the first call passes at once,
/// each later call waits until `delay` has elapsed since the previous one.
/// A zero delay disables pacing entirely.
#[derive(Clone)]
pub struct RequestPacer {
    inner: Option<Arc<GovernorRateLimiter>>,
    delay: Duration,
}

impl RequestPacer {
    pub fn new(delay: Duration) -> Self {
        let inner = Quota::with_period(delay).map(|quota| {
            let quota = quota.allow_burst(NonZeroU32::MIN);
            Arc::new(RateLimiter::direct(quota))
        });
        Self { inner, delay }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    #[must_use]
    pub fn delay(&self) -> Duration {
        self.delay
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.is_some()
    }

    /// Wait until the next request slot opens.
    pub async fn wait(&self) {
        if let Some(ref limiter) = self.inner {
            limiter.until_ready().await;
        }
    }
}

impl std::fmt::Debug for RequestPacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestPacer")
            .field("delay", &self.delay)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_delay_disables_pacing() {
        let pacer = RequestPacer::disabled();
        assert!(!pacer.is_enabled());
        assert_eq!(pacer.delay(), Duration::ZERO);
    }

    #[test]
    fn test_toggl_is_paced_slower_than_clockify() {
        let clockify = default_delay_for_service(ServiceKind::Clockify);
        let toggl = default_delay_for_service(ServiceKind::Toggl);
        assert_eq!(clockify, Duration::from_millis(100));
        assert_eq!(toggl, Duration::from_secs(1));
        assert!(RequestPacer::new(toggl).is_enabled());
    }

    #[tokio::test]
    async fn test_second_request_waits_for_delay() {
        let pacer = RequestPacer::new(Duration::from_millis(50));
        let start = std::time::Instant::now();
        pacer.wait().await;
        pacer.wait().await;
        assert!(start.elapsed() >= Duration::from_millis(40));
    }
}
