//! Retry policy for external model calls.
//!
//! One policy object is built from config and injected into every call
//! site that talks to a collaborator, instead of each stage hand-rolling
//! its own loop. Exponential backoff, transient errors only, and an
//! explicit per-attempt timeout.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::RetryConfig;
use crate::error::ModelError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    timeout: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, timeout: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            timeout,
        }
    }

    pub fn from_config(cfg: &RetryConfig) -> Self {
        Self::new(
            cfg.max_attempts,
            Duration::from_millis(cfg.base_delay_ms),
            Duration::from_millis(cfg.timeout_ms),
        )
    }

    /// A policy that tries exactly once. Used by call sites where the
    /// fallback path is cheaper than a retry.
    pub fn once(timeout: Duration) -> Self {
        Self::new(1, Duration::ZERO, timeout)
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `op` until it succeeds, fails non-transiently, or attempts
    /// are exhausted. Each attempt is bounded by the policy timeout.
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, ModelError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ModelError>>,
    {
        let mut attempt = 0u32;
        loop {
            if attempt > 0 {
                let delay = self.base_delay * 2u32.saturating_pow(attempt - 1);
                debug!(label, attempt, delay_ms = delay.as_millis() as u64, "backing off");
                tokio::time::sleep(delay).await;
            }

            let result = match tokio::time::timeout(self.timeout, op()).await {
                Ok(r) => r,
                Err(_) => Err(ModelError::Timeout(self.timeout)),
            };

            match result {
                Ok(v) => return Ok(v),
                Err(e) => {
                    attempt += 1;
                    if !e.is_transient() || attempt >= self.max_attempts {
                        return Err(e);
                    }
                    warn!(label, attempt, error = %e, "transient failure, will retry");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::ZERO, Duration::from_secs(1));
        let out = policy
            .run("test", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(ModelError::Transport("flaky".into()))
                    } else {
                        Ok(42)
                    }
                }
            })
            .await;
        assert_eq!(out.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_transient_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(5, Duration::ZERO, Duration::from_secs(1));
        let out: Result<u32, _> = policy
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ModelError::Malformed("bad json".into())) }
            })
            .await;
        assert!(matches!(out, Err(ModelError::Malformed(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stops_at_max_attempts() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy::new(3, Duration::ZERO, Duration::from_secs(1));
        let out: Result<u32, _> = policy
            .run("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(ModelError::RateLimited("slow down".into())) }
            })
            .await;
        assert!(matches!(out, Err(ModelError::RateLimited(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn slow_call_times_out() {
        let policy = RetryPolicy::new(1, Duration::ZERO, Duration::from_millis(10));
        let out: Result<u32, _> = policy
            .run("test", || async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok(1)
            })
            .await;
        assert!(matches!(out, Err(ModelError::Timeout(_))));
    }
}
