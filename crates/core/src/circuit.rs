use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::error::CoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Closed,
    Open,
    HalfOpen,
}

/// Closed/open/half-open circuit breaker for outbound calls (§7). Applied by
/// callers around a single external dependency (LLM, knowledge-base API);
/// not shared globally across dependencies.
///
/// Threshold 5 consecutive failures trips the breaker; it stays open for
/// `recovery` before allowing one half-open probe through.
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    recovery: Duration,
    consecutive_failures: AtomicU32,
    opened_at_epoch_ms: AtomicU64,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            failure_threshold: 5,
            recovery: Duration::from_secs(60),
            consecutive_failures: AtomicU32::new(0),
            opened_at_epoch_ms: AtomicU64::new(0),
        }
    }

    fn state(&self) -> State {
        let opened_at = self.opened_at_epoch_ms.load(Ordering::SeqCst);
        if opened_at == 0 {
            return State::Closed;
        }
        let elapsed = now_epoch_ms().saturating_sub(opened_at);
        if elapsed >= self.recovery.as_millis() as u64 {
            State::HalfOpen
        } else {
            State::Open
        }
    }

    /// Call `f` if the breaker permits it; records success/failure and trips
    /// or resets the breaker accordingly.
    pub async fn call<T, E, F, Fut>(&self, f: F) -> Result<T, CoreError>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        if self.state() == State::Open {
            return Err(CoreError::CircuitOpen(self.name.clone()));
        }
        match f().await {
            Ok(v) => {
                self.consecutive_failures.store(0, Ordering::SeqCst);
                self.opened_at_epoch_ms.store(0, Ordering::SeqCst);
                Ok(v)
            }
            Err(e) => {
                let failures = self.consecutive_failures.fetch_add(1, Ordering::SeqCst) + 1;
                if failures >= self.failure_threshold {
                    self.opened_at_epoch_ms.store(now_epoch_ms(), Ordering::SeqCst);
                    tracing::warn!(breaker = %self.name, failures, "circuit breaker tripped open");
                }
                Err(CoreError::External(format!("{}: {}", self.name, e)))
            }
        }
    }
}

fn now_epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn trips_after_threshold_failures() {
        let breaker = CircuitBreaker::new("test");
        for _ in 0..5 {
            let result: Result<(), CoreError> = breaker.call(|| async { Err::<(), _>("boom") }).await;
            assert!(result.is_err());
        }
        let result: Result<(), CoreError> = breaker.call(|| async { Ok::<(), &str>(()) }).await;
        assert!(matches!(result, Err(CoreError::CircuitOpen(_))));
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        let breaker = CircuitBreaker::new("test");
        for _ in 0..4 {
            let _: Result<(), CoreError> = breaker.call(|| async { Err::<(), _>("boom") }).await;
        }
        let _: Result<(), CoreError> = breaker.call(|| async { Ok::<(), &str>(()) }).await;
        // failure count reset, so one more failure shouldn't trip it
        let result: Result<(), CoreError> = breaker.call(|| async { Err::<(), _>("boom") }).await;
        assert!(matches!(result, Err(CoreError::External(_))));
    }
}
