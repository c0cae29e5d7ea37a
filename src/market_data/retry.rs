use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tokio::time::sleep;
use tracing::{error, warn};

/// Bounded retries with a uniformly random pause between attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub min_wait: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5, Duration::from_secs(2), Duration::from_secs(5))
    }
}

impl RetryPolicy {
    pub fn new(attempts: u32, min_wait: Duration, max_wait: Duration) -> Self {
        Self {
            attempts: attempts.max(1),
            min_wait,
            max_wait: max_wait.max(min_wait),
        }
    }

    /// Retries until the operation returns `Ok`.
    pub async fn run<T, E, F, Fut>(&self, name: &str, op: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::fmt::Display,
    {
        self.run_until(name, op, Result::is_ok).await
    }

    /// Retries until `is_success` accepts the output, returning the last
    /// output either way.
    pub async fn run_until<T, F, Fut, P>(&self, name: &str, mut op: F, is_success: P) -> T
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = T>,
        P: Fn(&T) -> bool,
    {
        let mut attempt = 1;
        loop {
            let output = op().await;
            if is_success(&output) {
                return output;
            }
            if attempt >= self.attempts {
                error!(operation = name, attempts = self.attempts, "all attempts failed");
                return output;
            }

            let wait = self.jitter();
            warn!(
                operation = name,
                attempt,
                wait_ms = wait.as_millis() as u64,
                "attempt failed, retrying"
            );
            sleep(wait).await;
            attempt += 1;
        }
    }

    fn jitter(&self) -> Duration {
        if self.max_wait <= self.min_wait {
            return self.min_wait;
        }
        rand::thread_rng().gen_range(self.min_wait..=self.max_wait)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn instant() -> RetryPolicy {
        RetryPolicy::new(3, Duration::ZERO, Duration::ZERO)
    }

    #[tokio::test]
    async fn test_stops_on_first_success() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let out: Result<u32, String> = instant()
            .run("op", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                if n < 2 { Err(format!("fail {n}")) } else { Ok(n) }
            })
            .await;

        assert_eq!(out, Ok(2));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_returns_last_failure_after_bound() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let out: Result<(), String> = instant()
            .run("op", move || async move {
                let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
                Err(format!("fail {n}"))
            })
            .await;

        assert_eq!(out, Err("fail 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_custom_predicate() {
        let counter = AtomicU32::new(0);
        let calls = &counter;
        let out = instant()
            .run_until(
                "op",
                move || async move { calls.fetch_add(1, Ordering::SeqCst) + 1 },
                |n| *n >= 3,
            )
            .await;
        assert_eq!(out, 3);
    }

    #[test]
    fn test_jitter_within_bounds() {
        let policy = RetryPolicy::new(1, Duration::from_millis(10), Duration::from_millis(20));
        for _ in 0..50 {
            let wait = policy.jitter();
            assert!(wait >= Duration::from_millis(10) && wait <= Duration::from_millis(20));
        }
    }
}
