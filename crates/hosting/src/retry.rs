//! Bounded retries for transport-level failures.
//!
//! Only failures that happened before any response was received are retried.
//! Application-level rejections are returned to the caller immediately.

use std::{future::Future, time::Duration};

use tracing::warn;

/// Retry policy with exponential backoff.
#[derive(Copy, Clone, Debug)]
pub struct RetryPolicy {
    /// Total count of attempts, including the first one.
    pub attempts: u32,

    /// Delay before the second attempt, doubled for each subsequent one.
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(200),
        }
    }
}

impl RetryPolicy {
    /// Delay before the provided attempt, starting from the second attempt.
    fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(2).min(10))
    }

    /// Run the `operation` until it succeeds, fails with a non-transient error
    /// or runs out of attempts.
    pub async fn run<T, E, F, Fut, P>(&self, is_transient: P, mut operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: std::fmt::Display,
    {
        let mut attempt = 1;

        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if attempt < self.attempts && is_transient(&err) => {
                    attempt += 1;

                    let delay = self.delay(attempt);
                    warn!(%err, attempt, ?delay, "retrying after transport error");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::{cell::Cell, time::Duration};

    use tokio::time::Instant;

    use super::RetryPolicy;

    #[derive(Debug, PartialEq)]
    enum TestError {
        Transport,
        Rejected,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{self:?}")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn retries_transport_errors_with_backoff() {
        let calls = Cell::new(0);
        let started = Instant::now();

        let result: Result<(), _> = RetryPolicy::default()
            .run(
                |err| *err == TestError::Transport,
                || {
                    calls.set(calls.get() + 1);
                    async { Err(TestError::Transport) }
                },
            )
            .await;

        assert_eq!(result, Err(TestError::Transport));
        assert_eq!(calls.get(), 3);
        assert!(started.elapsed() >= Duration::from_millis(200 + 400));
        assert!(started.elapsed() < Duration::from_millis(700));
    }

    #[tokio::test(start_paused = true)]
    async fn does_not_retry_rejections() {
        let calls = Cell::new(0);

        let result: Result<(), _> = RetryPolicy::default()
            .run(
                |err| *err == TestError::Transport,
                || {
                    calls.set(calls.get() + 1);
                    async { Err(TestError::Rejected) }
                },
            )
            .await;

        assert_eq!(result, Err(TestError::Rejected));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failure() {
        let calls = Cell::new(0);

        let result = RetryPolicy::default()
            .run(
                |err| *err == TestError::Transport,
                || {
                    calls.set(calls.get() + 1);
                    let call = calls.get();
                    async move {
                        if call == 1 {
                            Err(TestError::Transport)
                        } else {
                            Ok(call)
                        }
                    }
                },
            )
            .await;

        assert_eq!(result, Ok(2));
    }
}
