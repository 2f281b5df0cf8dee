use std::future::Future;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Exponential backoff with jitter, the shape used throughout the pipeline
/// for retrying transient infrastructure failures (§7): `max_retries=3`,
/// `base_delay=1.0s`, `backoff_factor=2.0`, capped at `max_delay=10*base`,
/// with 10% jitter.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
    pub max_delay: Duration,
    pub jitter_fraction: f64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, base_delay_secs: f64, backoff_factor: f64) -> Self {
        let base_delay = Duration::from_secs_f64(base_delay_secs.max(0.0));
        Self {
            max_retries,
            base_delay,
            backoff_factor,
            max_delay: base_delay * 10,
            jitter_fraction: 0.10,
        }
    }

    fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let raw = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = raw.min(self.max_delay.as_secs_f64());
        let jitter = jitter_fraction(capped, self.jitter_fraction);
        Duration::from_secs_f64((capped + jitter).max(0.0))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, 1.0, 2.0)
    }
}

/// Deterministic-ish jitter in `[-fraction*base, +fraction*base]`, derived
/// from the current time's nanosecond fraction rather than the `rand` crate
/// — matching the pattern used for outbound polling backoff elsewhere in the
/// ambient stack.
fn jitter_fraction(base: f64, fraction: f64) -> f64 {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let unit = (nanos as f64 / 1_000_000_000.0) * 2.0 - 1.0; // in [-1, 1]
    base * fraction * unit
}

/// Retry `f` until it succeeds or `policy.max_retries` attempts have been
/// made (the initial call plus `max_retries - 1` retries), sleeping with
/// exponential backoff + jitter between attempts.
pub async fn with_backoff<T, E, F, Fut>(policy: &RetryPolicy, mut f: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        match f().await {
            Ok(v) => return Ok(v),
            Err(e) => {
                attempt += 1;
                if attempt >= policy.max_retries {
                    return Err(e);
                }
                let delay = policy.delay_for_attempt(attempt - 1);
                tracing::warn!(attempt, ?delay, "retrying after transient failure");
                tokio::time::sleep(delay).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_without_retry() {
        let policy = RetryPolicy::default();
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_backoff(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(42) }
        })
        .await;
        assert_eq!(result, Ok(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_then_succeeds() {
        let policy = RetryPolicy::new(3, 0.001, 2.0);
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_backoff(&policy, || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err("transient")
                } else {
                    Ok(7)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhausts_and_returns_last_error() {
        let policy = RetryPolicy::new(2, 0.001, 2.0);
        let calls = AtomicU32::new(0);
        let result: Result<u32, &str> = with_backoff(&policy, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err("permanent") }
        })
        .await;
        assert_eq!(result, Err("permanent"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
