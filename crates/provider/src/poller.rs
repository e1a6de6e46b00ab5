//! Bounded polling
//!
//! Evaluates a probe immediately, then again after each backoff period until
//! it succeeds or the stage's total wait budget is spent. Periods start at
//! the policy's base and grow by half each round up to its cap. A probe error
//! aborts the wait at once.

use std::future::Future;
use std::time::Duration;

use provisioner_common::{Result, StagePolicy};
use tokio::time::Instant;
use tracing::trace;

/// Backoff periods for one bounded wait
#[derive(Debug, Clone)]
pub struct Backoff {
    current: Duration,
    cap: Duration,
}

impl Backoff {
    pub fn new(base: Duration, cap: Duration) -> Self {
        let base = base.max(Duration::from_millis(1));
        Self {
            current: base,
            cap: cap.max(base),
        }
    }

    pub fn from_policy(policy: &StagePolicy) -> Self {
        Self::new(policy.base_period(), policy.cap_period())
    }
}

impl Iterator for Backoff {
    type Item = Duration;

    fn next(&mut self) -> Option<Duration> {
        let period = self.current;
        let millis = period.as_millis() as u64;
        self.current = Duration::from_millis(millis + millis / 2).min(self.cap);
        Some(period)
    }
}

/// Poll `attempt` until it yields a value or `policy.max_wait` elapses.
///
/// Returns `Ok(None)` on timeout.
pub async fn poll_until<T, F, Fut>(policy: &StagePolicy, mut attempt: F) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    let max_wait = policy.max_wait();
    let started = Instant::now();
    let mut backoff = Backoff::from_policy(policy);
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        if let Some(value) = attempt().await? {
            trace!("poll succeeded after {} attempt(s)", attempts);
            return Ok(Some(value));
        }

        let elapsed = started.elapsed();
        if elapsed >= max_wait {
            trace!("poll gave up after {} attempt(s) in {:?}", attempts, elapsed);
            return Ok(None);
        }

        let period = backoff.next().unwrap_or(policy.cap_period());
        tokio::time::sleep(period.min(max_wait - elapsed)).await;
    }
}

/// Poll a boolean probe until it holds or `policy.max_wait` elapses
pub async fn await_condition<F, Fut>(policy: &StagePolicy, mut test: F) -> Result<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let outcome = poll_until(policy, || {
        let probe = test();
        async move { Ok(probe.await?.then_some(())) }
    })
    .await?;
    Ok(outcome.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use provisioner_common::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn policy(max_wait_ms: u64) -> StagePolicy {
        StagePolicy::new(max_wait_ms, 100, 1_000)
    }

    #[test]
    fn test_backoff_grows_to_cap() {
        let periods: Vec<u64> = Backoff::new(Duration::from_millis(100), Duration::from_millis(300))
            .take(5)
            .map(|d| d.as_millis() as u64)
            .collect();
        assert_eq!(periods, vec![100, 150, 225, 300, 300]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_success_does_not_wait() {
        let start = Instant::now();
        let ok = await_condition(&policy(10_000), || async { Ok(true) }).await.unwrap();
        assert!(ok);
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_once_condition_holds() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let calls_ref = &calls;
        let ok = await_condition(&policy(60_000), move || async move {
            Ok(calls_ref.fetch_add(1, Ordering::SeqCst) + 1 >= 3)
        })
        .await
        .unwrap();

        assert!(ok);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        // 100ms + 150ms of backoff before the third probe
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(250));
        assert!(elapsed < Duration::from_millis(260));
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_at_max_wait() {
        let calls = AtomicU32::new(0);
        let start = Instant::now();

        let calls_ref = &calls;
        let ok = await_condition(&policy(5_000), move || async move {
            calls_ref.fetch_add(1, Ordering::SeqCst);
            Ok(false)
        })
        .await
        .unwrap();

        assert!(!ok);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(5_000));
        assert!(elapsed < Duration::from_millis(5_010));
        assert!(calls.load(Ordering::SeqCst) > 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_error_aborts_wait() {
        let start = Instant::now();
        let result = await_condition(&policy(60_000), || async {
            Err(Error::Unauthorized("expired key".into()))
        })
        .await;

        assert!(matches!(result, Err(Error::Unauthorized(_))));
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_until_yields_value() {
        let calls = AtomicU32::new(0);
        let calls_ref = &calls;
        let value = poll_until(&policy(60_000), move || async move {
            let n = calls_ref.fetch_add(1, Ordering::SeqCst);
            Ok((n == 1).then_some("found"))
        })
        .await
        .unwrap();

        assert_eq!(value, Some("found"));
    }
}
